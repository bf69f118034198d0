use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

// --- Upstream Schemas ---
//
// Field names are dictated by the upstream demo API (camelCase) and are not renegotiable.
// Every field is optional, identifiers and lists included, so partial or unexpected shapes
// still render instead of failing the whole page.

/// Decodes an explicit `null` the same way as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Post
///
/// A single entry of `GET /posts`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub user_id: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub reactions: Option<Reactions>,
    pub views: Option<u64>,
}

/// Reactions
///
/// Older revisions of the API return a bare count, newer ones split likes and dislikes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(untagged)]
pub enum Reactions {
    Count(u64),
    Split {
        #[serde(default)]
        likes: u64,
        #[serde(default)]
        dislikes: u64,
    },
}

impl Reactions {
    /// Number shown next to the heart icon.
    pub fn likes(&self) -> u64 {
        match self {
            Reactions::Count(count) => *count,
            Reactions::Split { likes, .. } => *likes,
        }
    }
}

/// Product
///
/// A single entry of `GET /products`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub discount_percentage: f64,
    pub rating: Option<f64>,
    pub stock: Option<u64>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub thumbnail: Option<String>,
}

/// Recipe
///
/// A single entry of `GET /recipes`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub cuisine: Option<String>,
    pub difficulty: Option<String>,
    pub prep_time_minutes: Option<u32>,
    pub cook_time_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub calories_per_serving: Option<u32>,
    pub rating: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image: Option<String>,
}

impl Recipe {
    /// Prep plus cook time, when at least one of them is known.
    pub fn total_minutes(&self) -> Option<u32> {
        match (self.prep_time_minutes, self.cook_time_minutes) {
            (None, None) => None,
            (prep, cook) => Some(prep.unwrap_or(0).saturating_add(cook.unwrap_or(0))),
        }
    }
}

/// User
///
/// The externally defined user record. Returned by `GET /users` entries and by
/// `POST /auth/login`, in which case the token fields are populated as well.
/// The application never mutates a `User` in place.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub maiden_name: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub image: Option<String>,
    pub age: Option<u32>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub blood_group: Option<String>,
    pub address: Option<Address>,
    pub company: Option<Company>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl User {
    /// "First Maiden Last", skipping an absent or empty maiden name.
    pub fn full_name(&self) -> String {
        [
            self.first_name.as_str(),
            self.maiden_name.as_deref().unwrap_or(""),
            self.last_name.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
}

// --- List Envelopes ---

/// PostsResponse
///
/// Envelope of `GET /posts`. A missing or null array decodes as empty.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct PostsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub posts: Vec<Post>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ProductsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub products: Vec<Product>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UsersResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<User>,
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct RecipesResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub recipes: Vec<Recipe>,
    pub total: Option<u64>,
}

// --- Request Payloads ---

/// LoginRequest
///
/// Credentials forwarded verbatim to `POST /auth/login`. Accepted as JSON by the session
/// API and as a urlencoded form by the login page. Never logged.
#[derive(Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// UpstreamMessage
///
/// Error body of the upstream API, e.g. `{"message": "Invalid credentials"}`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpstreamMessage {
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reactions_accept_both_wire_shapes() {
        let old: Post = serde_json::from_str(r#"{"id":1,"reactions":7}"#).unwrap();
        let new: Post =
            serde_json::from_str(r#"{"id":2,"reactions":{"likes":3,"dislikes":1}}"#).unwrap();

        assert_eq!(old.reactions.map(|r| r.likes()), Some(7));
        assert_eq!(new.reactions.map(|r| r.likes()), Some(3));
    }

    #[test]
    fn full_name_skips_empty_maiden_name() {
        let user = User {
            first_name: "Emily".to_string(),
            maiden_name: Some(String::new()),
            last_name: "Johnson".to_string(),
            ..User::default()
        };
        assert_eq!(user.full_name(), "Emily Johnson");
    }

    #[test]
    fn total_minutes_needs_at_least_one_part() {
        let mut recipe = Recipe::default();
        assert_eq!(recipe.total_minutes(), None);
        recipe.cook_time_minutes = Some(15);
        assert_eq!(recipe.total_minutes(), Some(15));
    }

    #[test]
    fn total_minutes_saturates_on_huge_values() {
        let recipe = Recipe {
            prep_time_minutes: Some(u32::MAX),
            cook_time_minutes: Some(10),
            ..Recipe::default()
        };
        assert_eq!(recipe.total_minutes(), Some(u32::MAX));
    }

    #[test]
    fn envelopes_tolerate_null_lists_and_missing_ids() {
        let empty: PostsResponse = serde_json::from_str(r#"{"posts":null}"#).unwrap();
        assert!(empty.posts.is_empty());

        let partial: RecipesResponse =
            serde_json::from_str(r#"{"recipes":[{"id":3,"name":"Pizza"},{"name":"Soup"},{"id":null}]}"#)
                .unwrap();
        let ids: Vec<u64> = partial.recipes.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 0, 0]);
        assert_eq!(partial.recipes[1].name, "Soup");
    }
}

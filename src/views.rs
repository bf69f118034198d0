//! Server-side rendering of the portal pages.
//!
//! Every list page is in exactly one of three view states, derived from a single query
//! snapshot: loading (skeleton cards), error (generic message) or ready (one card per
//! entry). Markup is intentionally plain; all upstream text is escaped.

use serde::de::DeserializeOwned;
use std::fmt::Write;

use crate::{
    cache::QuerySnapshot,
    models::{
        Post, PostsResponse, Product, ProductsResponse, Recipe, RecipesResponse, User,
        UsersResponse,
    },
    queries::Listing,
};

/// ViewState
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading { skeletons: usize },
    Error { heading: String },
    Ready(Vec<T>),
}

/// Upstream list envelopes that a list page knows how to unwrap.
pub trait Envelope: DeserializeOwned {
    type Item: Card;

    fn into_items(self) -> Vec<Self::Item>;
}

/// A list entry renderable as a card.
pub trait Card {
    fn render(&self, out: &mut String);
}

impl Envelope for PostsResponse {
    type Item = Post;
    fn into_items(self) -> Vec<Post> {
        self.posts
    }
}

impl Envelope for ProductsResponse {
    type Item = Product;
    fn into_items(self) -> Vec<Product> {
        self.products
    }
}

impl Envelope for UsersResponse {
    type Item = User;
    fn into_items(self) -> Vec<User> {
        self.users
    }
}

impl Envelope for RecipesResponse {
    type Item = Recipe;
    fn into_items(self) -> Vec<Recipe> {
        self.recipes
    }
}

/// view_state
///
/// Maps a query snapshot (or its absence when the render budget ran out) onto the page's
/// view state. A payload that does not even decode into the envelope counts as an error.
pub fn view_state<E: Envelope>(
    listing: Listing,
    snapshot: Option<&QuerySnapshot>,
) -> ViewState<E::Item> {
    let error = || ViewState::Error {
        heading: format!("Error loading {}", listing.key()),
    };

    let Some(snapshot) = snapshot else {
        return ViewState::Loading {
            skeletons: listing.skeletons(),
        };
    };

    if snapshot.is_error() {
        return error();
    }

    match &snapshot.data {
        Some(data) => match serde_json::from_value::<E>(data.as_ref().clone()) {
            Ok(envelope) => ViewState::Ready(envelope.into_items()),
            Err(err) => {
                tracing::warn!(key = listing.key(), error = %err, "payload does not match the expected shape");
                error()
            }
        },
        None => ViewState::Loading {
            skeletons: listing.skeletons(),
        },
    }
}

/// Escapes text for use in HTML element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

// --- Layout ---

/// Wraps a page body with the document shell and the navigation header. Loading pages
/// ask the browser to come back shortly, by which time the cache has usually settled.
pub fn layout(title: &str, user: Option<&User>, body: &str, refresh: bool) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n",
        escape(title)
    );
    if refresh {
        out.push_str("<meta http-equiv=\"refresh\" content=\"2\">\n");
    }
    out.push_str("</head>\n<body>\n");
    render_header(&mut out, user);
    out.push_str("<main>\n");
    out.push_str(body);
    out.push_str("</main>\n</body>\n</html>\n");
    out
}

fn render_header(out: &mut String, user: Option<&User>) {
    out.push_str("<header>\n<nav>\n<a href=\"/\">Home</a>\n");
    for listing in Listing::ALL {
        let _ = writeln!(
            out,
            "<a href=\"/{}\">{}</a>",
            listing.key(),
            escape(listing_nav_label(listing))
        );
    }
    match user {
        Some(user) => {
            let _ = write!(
                out,
                "<a href=\"/profile\" class=\"current-user\">@{}</a>\n\
                 <form method=\"post\" action=\"/logout\"><button type=\"submit\">Logout</button></form>\n",
                escape(&user.username)
            );
        }
        None => out.push_str("<a href=\"/login\">Login</a>\n"),
    }
    out.push_str("</nav>\n</header>\n");
}

fn listing_nav_label(listing: Listing) -> &'static str {
    match listing {
        Listing::Posts => "Posts",
        other => other.title(),
    }
}

// --- Pages ---

/// Body of a list page in any of its three states.
pub fn render_listing<T: Card>(listing: Listing, state: &ViewState<T>) -> String {
    let mut out = String::new();

    if let ViewState::Error { heading } = state {
        let _ = write!(
            out,
            "<section class=\"error\">\n<h2>{}</h2>\n<p>Please try again later</p>\n</section>\n",
            escape(heading)
        );
        return out;
    }

    let _ = write!(
        out,
        "<section class=\"listing {}\">\n<h1>{}</h1>\n<p>{}</p>\n<div class=\"cards\">\n",
        listing.key(),
        escape(listing.title()),
        escape(listing.tagline())
    );

    match state {
        ViewState::Loading { skeletons } => {
            for _ in 0..*skeletons {
                out.push_str("<div class=\"card skeleton\" aria-busy=\"true\"></div>\n");
            }
        }
        ViewState::Ready(items) => {
            if items.is_empty() {
                out.push_str("<p class=\"empty\">Nothing here yet.</p>\n");
            }
            for item in items {
                item.render(&mut out);
            }
        }
        ViewState::Error { .. } => {}
    }

    out.push_str("</div>\n</section>\n");
    out
}

impl Card for Post {
    fn render(&self, out: &mut String) {
        let _ = write!(
            out,
            "<article class=\"card post\" id=\"post-{}\">\n<h2>{}</h2>\n<p>{}</p>\n<footer>\n",
            self.id,
            escape(&self.title),
            escape(&self.body)
        );
        if let Some(user_id) = self.user_id {
            let _ = writeln!(out, "<span class=\"author\">User {user_id}</span>");
        }
        let likes = self.reactions.as_ref().map_or(0, |r| r.likes());
        let _ = writeln!(out, "<span class=\"reactions\">{likes}</span>");
        out.push_str("<span class=\"comments\">Comments</span>\n</footer>\n");
        if !self.tags.is_empty() {
            out.push_str("<ul class=\"tags\">\n");
            for tag in &self.tags {
                let _ = writeln!(out, "<li>#{}</li>", escape(tag));
            }
            out.push_str("</ul>\n");
        }
        out.push_str("</article>\n");
    }
}

impl Card for Product {
    fn render(&self, out: &mut String) {
        let _ = write!(out, "<div class=\"card product\" id=\"product-{}\">\n", self.id);
        if let Some(thumbnail) = &self.thumbnail {
            let _ = writeln!(
                out,
                "<img src=\"{}\" alt=\"{}\">",
                escape(thumbnail),
                escape(&self.title)
            );
        }
        let _ = write!(
            out,
            "<h3>{}</h3>\n<p>{}</p>\n",
            escape(&self.title),
            escape(&self.description)
        );
        if let Some(rating) = self.rating {
            let _ = writeln!(out, "<span class=\"rating\">{rating}</span>");
        }
        if let Some(category) = &self.category {
            let _ = writeln!(out, "<span class=\"category\">{}</span>", escape(category));
        }
        let _ = writeln!(out, "<span class=\"price\">${}</span>", self.price);
        if self.discount_percentage > 0.0 {
            let _ = writeln!(
                out,
                "<span class=\"discount\">-{}%</span>",
                self.discount_percentage
            );
        }
        out.push_str("<button type=\"button\">Add</button>\n</div>\n");
    }
}

impl Card for User {
    fn render(&self, out: &mut String) {
        let _ = write!(out, "<div class=\"card user\" id=\"user-{}\">\n", self.id);
        if let Some(image) = &self.image {
            let _ = writeln!(
                out,
                "<img src=\"{}\" alt=\"{}\">",
                escape(image),
                escape(&self.full_name())
            );
        }
        let _ = write!(
            out,
            "<h3>{}</h3>\n<p>@{}</p>\n<p>{}</p>\n</div>\n",
            escape(&self.full_name()),
            escape(&self.username),
            escape(&self.email)
        );
    }
}

impl Card for Recipe {
    fn render(&self, out: &mut String) {
        let _ = write!(
            out,
            "<div class=\"card recipe\" id=\"recipe-{}\">\n<h3>{}</h3>\n",
            self.id,
            escape(&self.name)
        );
        if let Some(cuisine) = &self.cuisine {
            let _ = writeln!(out, "<span class=\"cuisine\">{}</span>", escape(cuisine));
        }
        if let Some(difficulty) = &self.difficulty {
            let _ = writeln!(out, "<span class=\"difficulty\">{}</span>", escape(difficulty));
        }
        if let Some(minutes) = self.total_minutes() {
            let _ = writeln!(out, "<span class=\"time\">{minutes} min</span>");
        }
        out.push_str("</div>\n");
    }
}

pub fn render_index(user: Option<&User>) -> String {
    let mut out = String::from("<section class=\"hero\">\n<h1>Welcome</h1>\n");
    match user {
        Some(user) => {
            let _ = writeln!(out, "<p>Good to see you again, {}.</p>", escape(&user.first_name));
        }
        None => out.push_str("<p><a href=\"/login\">Log in</a> to see your profile.</p>\n"),
    }
    out.push_str("<ul class=\"sections\">\n");
    for listing in Listing::ALL {
        let _ = writeln!(
            out,
            "<li><a href=\"/{}\">{}</a> <span>{}</span></li>",
            listing.key(),
            escape(listing.title()),
            escape(listing.tagline())
        );
    }
    out.push_str("</ul>\n</section>\n");
    out
}

/// render_profile
///
/// Full profile of the Current User. Optional sections and tiles appear only when the
/// upstream record carries them.
pub fn render_profile(user: &User) -> String {
    let mut out = String::from("<section class=\"profile\">\n<header>\n");
    if let Some(image) = &user.image {
        let _ = writeln!(
            out,
            "<img src=\"{}\" alt=\"{} {}\">",
            escape(image),
            escape(&user.first_name),
            escape(&user.last_name)
        );
    }
    let _ = write!(
        out,
        "<h1>{} {}</h1>\n<p>@{}</p>\n<p>{}</p>\n</header>\n",
        escape(&user.first_name),
        escape(&user.last_name),
        escape(&user.username),
        escape(&user.email)
    );

    out.push_str("<div class=\"personal\">\n<h2>Personal Information</h2>\n<dl>\n");
    let _ = writeln!(out, "<dt>Full Name:</dt><dd>{}</dd>", escape(&user.full_name()));
    let _ = writeln!(out, "<dt>Email:</dt><dd>{}</dd>", escape(&user.email));
    let phone = user.phone.as_deref().filter(|p| !p.is_empty()).unwrap_or("Not provided");
    let _ = writeln!(out, "<dt>Phone:</dt><dd>{}</dd>", escape(phone));
    if let Some(birth_date) = user.birth_date.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "<dt>Birth Date:</dt><dd>{}</dd>", escape(&format_birth_date(birth_date)));
    }
    out.push_str("</dl>\n</div>\n");

    out.push_str("<div class=\"location\">\n<h2>Location &amp; Work</h2>\n");
    if let Some(address) = &user.address {
        let city_line = [
            address.city.as_deref(),
            address.state.as_deref(),
            address.postal_code.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        let _ = write!(
            out,
            "<div class=\"address\">\n<h3>Address:</h3>\n<p>{}</p>\n<p>{}</p>\n<p>{}</p>\n</div>\n",
            escape(address.address.as_deref().unwrap_or("")),
            escape(&city_line),
            escape(address.country.as_deref().unwrap_or(""))
        );
    }
    if let Some(company) = &user.company {
        let _ = write!(
            out,
            "<div class=\"company\">\n<h3>Company:</h3>\n<p>{}</p>\n<p>{}</p>\n<p>{}</p>\n</div>\n",
            escape(company.name.as_deref().unwrap_or("")),
            escape(company.title.as_deref().unwrap_or("")),
            escape(company.department.as_deref().unwrap_or(""))
        );
    }
    out.push_str("</div>\n");

    let tiles: Vec<(String, &str)> = [
        user.age.map(|age| (age.to_string(), "Years Old")),
        user.height.map(|height| (height.to_string(), "Height (cm)")),
        user.weight.map(|weight| (weight.to_string(), "Weight (kg)")),
        user.blood_group
            .as_ref()
            .filter(|group| !group.is_empty())
            .map(|group| (group.clone(), "Blood Type")),
    ]
    .into_iter()
    .flatten()
    .collect();

    if !tiles.is_empty() {
        out.push_str("<div class=\"additional\">\n<h2>Additional Information</h2>\n");
        for (value, label) in tiles {
            let _ = writeln!(
                out,
                "<div class=\"tile\"><strong>{}</strong><span>{}</span></div>",
                escape(&value),
                label
            );
        }
        out.push_str("</div>\n");
    }

    out.push_str("</section>\n");
    out
}

/// Upstream birth dates look like "1996-5-30"; shown as-is when they do not parse.
fn format_birth_date(raw: &str) -> String {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|date| date.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

pub fn render_login(error: Option<&str>, username: &str) -> String {
    let mut out = String::from("<section class=\"login\">\n<h1>Login</h1>\n");
    if let Some(error) = error {
        let _ = writeln!(out, "<p class=\"error\" role=\"alert\">{}</p>", escape(error));
    }
    let _ = write!(
        out,
        "<form method=\"post\" action=\"/login\">\n\
         <label>Username <input name=\"username\" value=\"{}\" autocomplete=\"username\"></label>\n\
         <label>Password <input name=\"password\" type=\"password\" autocomplete=\"current-password\"></label>\n\
         <button type=\"submit\">Sign in</button>\n</form>\n</section>\n",
        escape(username)
    );
    out
}

pub fn render_not_found() -> String {
    String::from(
        "<section class=\"not-found\">\n<h1>404</h1>\n<p>Page not found</p>\n<a href=\"/\">Return to Home</a>\n</section>\n",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;

    #[test]
    fn escape_neutralises_markup() {
        assert_eq!(
            escape(r#"<script>alert("x")</script> & 'y'"#),
            "&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; &#39;y&#39;"
        );
    }

    #[test]
    fn loading_state_renders_skeletons() {
        let state: ViewState<Product> = view_state::<ProductsResponse>(Listing::Products, None);
        let html = render_listing(Listing::Products, &state);
        assert_eq!(html.matches("card skeleton").count(), 12);
    }

    #[test]
    fn discount_badge_only_when_positive() {
        let mut html = String::new();
        Product {
            id: 1,
            price: 9.99,
            ..Product::default()
        }
        .render(&mut html);
        assert!(html.contains("$9.99"));
        assert!(!html.contains("discount"));

        html.clear();
        Product {
            id: 2,
            price: 5.0,
            discount_percentage: 7.17,
            ..Product::default()
        }
        .render(&mut html);
        assert!(html.contains("-7.17%"));
    }

    #[test]
    fn profile_shows_placeholders_and_optional_tiles() {
        let user = User {
            first_name: "Emily".to_string(),
            last_name: "Johnson".to_string(),
            username: "emilys".to_string(),
            birth_date: Some("1996-5-30".to_string()),
            age: Some(28),
            address: Some(Address {
                city: Some("Phoenix".to_string()),
                state: Some("Mississippi".to_string()),
                ..Address::default()
            }),
            ..User::default()
        };

        let html = render_profile(&user);

        assert!(html.contains("Not provided"));
        assert!(html.contains("May 30, 1996"));
        assert!(html.contains("Years Old"));
        assert!(!html.contains("Blood Type"));
        assert!(html.contains("Phoenix Mississippi"));
        assert!(!html.contains("Company:"));
    }

    #[test]
    fn post_renders_author_and_tags() {
        let mut html = String::new();
        Post {
            id: 3,
            title: "Hello".to_string(),
            user_id: Some(121),
            tags: vec!["history".to_string()],
            ..Post::default()
        }
        .render(&mut html);

        assert!(html.contains("User 121"));
        assert!(html.contains("#history"));
    }
}

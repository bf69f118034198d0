use std::future::Future;

use crate::{cache::FetchResult, remote::RemoteApiState};

/// Listing
///
/// The list pages of the portal. Each one depends on exactly one query key, backed by one
/// upstream GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Posts,
    Products,
    Users,
    Recipes,
}

impl Listing {
    pub const ALL: [Listing; 4] = [
        Listing::Posts,
        Listing::Products,
        Listing::Users,
        Listing::Recipes,
    ];

    /// Query key in the remote data cache.
    pub fn key(self) -> &'static str {
        match self {
            Listing::Posts => "posts",
            Listing::Products => "products",
            Listing::Users => "users",
            Listing::Recipes => "recipes",
        }
    }

    /// Upstream resource path.
    pub fn upstream_path(self) -> &'static str {
        match self {
            Listing::Posts => "/posts",
            Listing::Products => "/products",
            Listing::Users => "/users",
            Listing::Recipes => "/recipes",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Listing::Posts => "Latest Posts",
            Listing::Products => "Products",
            Listing::Users => "Users",
            Listing::Recipes => "Recipes",
        }
    }

    pub fn tagline(self) -> &'static str {
        match self {
            Listing::Posts => "Discover engaging articles and stories from our community",
            Listing::Products => "Discover amazing products and great deals",
            Listing::Users => "Meet the people behind the community",
            Listing::Recipes => "Find something good to cook tonight",
        }
    }

    /// Placeholder cards shown while the query is still loading.
    pub fn skeletons(self) -> usize {
        match self {
            Listing::Posts => 6,
            Listing::Products => 12,
            Listing::Users => 8,
            Listing::Recipes => 6,
        }
    }
}

/// Builds the fetch future for `listing`; handed to the cache, which decides whether to run it.
pub fn fetch_listing(
    api: RemoteApiState,
    listing: Listing,
) -> impl Future<Output = FetchResult> + Send + 'static {
    async move { api.get_json(listing.upstream_path()).await }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemoteApi;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn fetch_listing_hits_the_listing_path() {
        let api = Arc::new(MockRemoteApi::new().with_response("/recipes", json!({"recipes": []})));

        let fetched = fetch_listing(api.clone(), Listing::Recipes).await;

        assert_eq!(fetched, Ok(json!({"recipes": []})));
        assert_eq!(api.calls("/recipes"), 1);
        assert_eq!(api.calls("/posts"), 0);
    }
}

//! Direct-fetch Tier-1 strategy.

use super::AuthorResolver;
use crate::detail::DetailLayout;
use crate::error::Result;
use crate::http::Fetcher;
use futures::future::BoxFuture;
use url::Url;

/// Fetches the detail page and reads the author field from it.
pub struct DirectFetchResolver {
    fetcher: Fetcher,
    layout: DetailLayout,
}

impl DirectFetchResolver {
    pub fn new(fetcher: Fetcher) -> Result<Self> {
        Ok(Self {
            fetcher,
            layout: DetailLayout::scholar()?,
        })
    }
}

impl AuthorResolver for DirectFetchResolver {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn resolve<'a>(&'a self, reference: &'a Url) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let html = self.fetcher.fetch_document(reference).await?;
            Ok(self.layout.authors(&html))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScholarError;
    use crate::http::FetchOptions;

    #[tokio::test]
    async fn test_resolves_from_detail_page() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _detail = server
            .mock("GET", "/citations")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"<div class="gsc_oci_value">A. Smith, B. Lee</div>"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let resolver = DirectFetchResolver::new(Fetcher::new(&FetchOptions::default())?)?;
        let url = Url::parse(&format!("{}/citations?view_op=view_citation", server.url()))
            .map_err(|e| ScholarError::Config(e.to_string()))?;
        assert_eq!(resolver.resolve(&url).await?, "A. Smith, B. Lee");

        let missing = Url::parse(&format!("{}/missing", server.url()))
            .map_err(|e| ScholarError::Config(e.to_string()))?;
        assert!(resolver.resolve(&missing).await.is_err());
        Ok(())
    }
}

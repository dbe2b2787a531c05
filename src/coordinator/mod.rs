//! Coordinator: the privileged broker the Extractor talks to.
//!
//! It loads the listing page, announces it with `pageLoaded`, and answers
//! `getAuthorDetails` requests through an [`AuthorResolver`] strategy.
//! Resolution never fails from the requester's point of view: every error
//! is logged and turned into an empty author string, so the Extractor's
//! fallback is the only place that decides what happens next.

mod fetch;
mod view;

pub use fetch::DirectFetchResolver;
pub use view::{FetchViewHost, HiddenViewResolver, ViewEvent, ViewHost, ViewId, ViewState};

use crate::bus::{Envelope, Mailbox, Port};
use crate::error::Result;
use crate::http::Fetcher;
use crate::listing::ListingPage;
use crate::protocol::{Message, Reply};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Capability to turn a detail reference into a full author string.
pub trait AuthorResolver: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Resolve the author list behind `reference`; `Ok("")` when the page
    /// has none.
    fn resolve<'a>(&'a self, reference: &'a Url) -> BoxFuture<'a, Result<String>>;
}

/// Tier-1 strategy selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Direct document fetch of the detail page
    #[default]
    Fetch,
    /// Load the detail page in an auxiliary hidden view
    View,
}

impl Strategy {
    /// Build the resolver for this strategy
    pub fn resolver(self, fetcher: &Fetcher, load_timeout: Option<Duration>) -> Result<Arc<dyn AuthorResolver>> {
        Ok(match self {
            Strategy::Fetch => Arc::new(DirectFetchResolver::new(fetcher.clone())?),
            Strategy::View => Arc::new(
                HiddenViewResolver::new(FetchViewHost::new(fetcher.clone()))?
                    .with_load_timeout(load_timeout),
            ),
        })
    }
}

/// Load the listing page over HTTP
pub async fn load_listing(fetcher: &Fetcher, url: &Url) -> Result<ListingPage> {
    info!(url = %url, "Loading listing page");
    let html = fetcher.fetch_document(url).await?;
    Ok(ListingPage::new(url.clone(), html))
}

/// The resolution broker.
#[derive(Clone)]
pub struct Coordinator {
    resolver: Arc<dyn AuthorResolver>,
}

impl Coordinator {
    pub fn new(resolver: Arc<dyn AuthorResolver>) -> Self {
        Self { resolver }
    }

    /// Tell the Extractor context its page is ready
    pub async fn announce_page_loaded(&self, extractor: &Port) -> Result<()> {
        debug!(to = extractor.name(), "Sending pageLoaded");
        extractor.post(Message::PageLoaded).await
    }

    /// Resolve a reference, absorbing every failure into `""`
    pub async fn resolve(&self, reference: &str) -> String {
        let url = match Url::parse(reference) {
            Ok(url) => url,
            Err(e) => {
                warn!(reference, error = %e, "Invalid detail reference");
                return String::new();
            }
        };

        match self.resolver.resolve(&url).await {
            Ok(authors) => {
                debug!(
                    url = %url,
                    strategy = self.resolver.name(),
                    found = !authors.is_empty(),
                    "Resolved authors"
                );
                authors
            }
            Err(e) => {
                warn!(url = %url, strategy = self.resolver.name(), error = %e, "Author resolution failed");
                String::new()
            }
        }
    }

    /// Serve requests from `inbox` until every port to it is dropped.
    pub fn spawn(self, inbox: Mailbox) -> JoinHandle<()> {
        tokio::spawn(self.serve(inbox))
    }

    async fn serve(self, mut inbox: Mailbox) {
        debug!(strategy = self.resolver.name(), "Coordinator started");

        while let Some(Envelope { message, reply }) = inbox.recv().await {
            match message {
                Message::GetAuthorDetails { url } => {
                    // finishes (and cleans up) even if the requester is gone
                    let authors = self.resolve(&url).await;
                    reply.respond(Reply::Authors { authors });
                }
                other => debug!(kind = other.kind(), "Coordinator ignoring message"),
            }
        }

        debug!("Coordinator stopped");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::mailbox;
    use crate::error::ScholarError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Deterministic resolver keyed by URL; unknown URLs resolve to `""`.
    #[derive(Default)]
    pub(crate) struct StubResolver {
        answers: HashMap<String, std::result::Result<String, String>>,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl StubResolver {
        pub(crate) fn answer(mut self, url: &str, authors: &str) -> Self {
            self.answers.insert(url.to_string(), Ok(authors.to_string()));
            self
        }

        pub(crate) fn fail(mut self, url: &str, error: &str) -> Self {
            self.answers.insert(url.to_string(), Err(error.to_string()));
            self
        }
    }

    impl AuthorResolver for StubResolver {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn resolve<'a>(&'a self, reference: &'a Url) -> BoxFuture<'a, Result<String>> {
            Box::pin(async move {
                if let Ok(mut calls) = self.calls.lock() {
                    calls.push(reference.to_string());
                }
                match self.answers.get(reference.as_str()) {
                    Some(Ok(authors)) => Ok(authors.clone()),
                    Some(Err(e)) => Err(ScholarError::Validation(e.clone())),
                    None => Ok(String::new()),
                }
            })
        }
    }

    #[tokio::test]
    async fn test_errors_become_empty_authors() {
        let stub = StubResolver::default()
            .answer("https://s/a", "A. Smith")
            .fail("https://s/b", "boom");
        let coordinator = Coordinator::new(Arc::new(stub));

        assert_eq!(coordinator.resolve("https://s/a").await, "A. Smith");
        assert_eq!(coordinator.resolve("https://s/b").await, "");
        assert_eq!(coordinator.resolve("not a url").await, "");
    }

    #[tokio::test]
    async fn test_serves_get_author_details() -> Result<()> {
        let stub = StubResolver::default().answer("https://s/a", "A, B");
        let (port, inbox) = mailbox("coordinator");
        let handle = Coordinator::new(Arc::new(stub)).spawn(inbox);

        let reply = port
            .request(Message::GetAuthorDetails {
                url: "https://s/a".to_string(),
            })
            .await?;
        assert_eq!(reply, Reply::Authors { authors: "A, B".to_string() });

        let reply = port
            .request(Message::GetAuthorDetails {
                url: "https://s/missing".to_string(),
            })
            .await?;
        assert_eq!(reply, Reply::Authors { authors: String::new() });

        drop(port);
        handle.await.map_err(|e| ScholarError::ChannelClosed(e.to_string()))?;
        Ok(())
    }

    #[tokio::test]
    async fn test_announce_page_loaded() -> Result<()> {
        let (port, mut inbox) = mailbox("extractor");
        Coordinator::new(Arc::new(StubResolver::default()))
            .announce_page_loaded(&port)
            .await?;
        let envelope = inbox.recv().await;
        assert_eq!(envelope.map(|e| e.message), Some(Message::PageLoaded));
        Ok(())
    }
}

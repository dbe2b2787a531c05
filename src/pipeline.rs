//! Wires the three contexts together for one extraction.

use crate::bus::mailbox;
use crate::coordinator::{load_listing, AuthorResolver, Coordinator, Strategy};
use crate::error::Result;
use crate::extractor::{ExtractorContext, SessionOptions};
use crate::http::{FetchOptions, Fetcher};
use crate::listing::ListingPage;
use crate::presenter::Presenter;
use crate::session::Record;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Where the listing page comes from
#[derive(Debug, Clone)]
pub enum ListingSource {
    /// Fetch a live profile page
    Url(Url),
    /// Read saved HTML; relative links resolve against `base`
    File { path: PathBuf, base: Option<Url> },
}

/// Options for a whole run
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub fetch: FetchOptions,
    pub session: SessionOptions,
    pub strategy: Strategy,
}

/// Load the listing and extract every record from it.
pub async fn run<F>(source: ListingSource, options: &PipelineOptions, on_progress: F) -> Result<Vec<Record>>
where
    F: FnMut(&str),
{
    let fetcher = Fetcher::new(&options.fetch)?;
    let resolver = options
        .strategy
        .resolver(&fetcher, options.session.resolve_timeout)?;

    let page = match source {
        ListingSource::Url(url) => load_listing(&fetcher, &url).await?,
        ListingSource::File { path, base } => ListingPage::from_file(&path, base.as_ref())?,
    };

    info!(strategy = ?options.strategy, url = %page.url(), "Listing ready");
    run_with(page, resolver, options.session.clone(), on_progress).await
}

/// Extract from an already loaded page with the given resolver.
pub async fn run_with<F>(
    page: ListingPage,
    resolver: Arc<dyn AuthorResolver>,
    session: SessionOptions,
    on_progress: F,
) -> Result<Vec<Record>>
where
    F: FnMut(&str),
{
    let (coordinator_port, coordinator_inbox) = mailbox("coordinator");
    let (extractor_port, extractor_inbox) = mailbox("extractor");
    let (presenter_port, presenter_inbox) = mailbox("presenter");

    let coordinator = Coordinator::new(resolver);
    let coordinator_task = coordinator.clone().spawn(coordinator_inbox);
    let extractor_task =
        ExtractorContext::new(page, coordinator_port, presenter_port, session)?.spawn(extractor_inbox);

    coordinator.announce_page_loaded(&extractor_port).await?;

    let mut presenter = Presenter::new(extractor_port, presenter_inbox);
    let result = presenter.request_papers(on_progress).await;

    // closing the presenter lets the extractor, then the coordinator, wind down
    drop(presenter);
    for (name, task) in [("extractor", extractor_task), ("coordinator", coordinator_task)] {
        if let Err(e) = task.await {
            warn!(context = name, error = %e, "Context task ended abnormally");
        }
    }

    result
}

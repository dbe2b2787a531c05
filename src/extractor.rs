//! Extractor: the context living next to the loaded listing page.
//!
//! On `getPapers` it starts one session that walks the listing rows in
//! order, resolves each row's authors (detail page first, listing line as
//! fallback), reports progress after every row and finishes with exactly
//! one `papersReady` or `papersError`.

use crate::bus::{Envelope, Mailbox, Port};
use crate::error::{OptionExt, ScholarError, Result};
use crate::listing::{ListingEntry, ListingLayout, ListingPage};
use crate::protocol::{AckStatus, Message, Reply};
use crate::session::{ExtractionSession, Record};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

/// Per-session knobs
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Fixed delay after each record
    pub pacing: Option<Duration>,
    /// Give up on a detail request after this long
    pub resolve_timeout: Option<Duration>,
}

/// The listing-page context.
pub struct ExtractorContext {
    page: ListingPage,
    layout: Arc<ListingLayout>,
    coordinator: Port,
    presenter: Port,
    options: SessionOptions,
    ready: bool,
    // one session per page context
    active: Arc<AtomicBool>,
}

impl ExtractorContext {
    pub fn new(
        page: ListingPage,
        coordinator: Port,
        presenter: Port,
        options: SessionOptions,
    ) -> Result<Self> {
        Ok(Self {
            page,
            layout: Arc::new(ListingLayout::scholar()?),
            coordinator,
            presenter,
            options,
            ready: false,
            active: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Handle messages from `inbox` until every port to it is dropped.
    pub fn spawn(self, inbox: Mailbox) -> JoinHandle<()> {
        tokio::spawn(self.serve(inbox))
    }

    async fn serve(mut self, mut inbox: Mailbox) {
        while let Some(Envelope { message, reply }) = inbox.recv().await {
            match message {
                Message::PageLoaded => {
                    info!(url = %self.page.url(), "Listing page loaded");
                    self.ready = true;
                }
                Message::GetPapers => {
                    let status = self.start_session();
                    debug!(?status, "getPapers acknowledged");
                    reply.respond(Reply::Ack { status });
                }
                other => debug!(kind = other.kind(), "Extractor ignoring message"),
            }
        }
        debug!("Extractor context closed");
    }

    fn start_session(&self) -> AckStatus {
        if !self.ready {
            warn!("getPapers before pageLoaded");
            return AckStatus::NotReady;
        }

        let Some(guard) = SessionGuard::acquire(&self.active) else {
            warn!("Rejecting getPapers, a session is already running");
            return AckStatus::Busy;
        };

        let run = SessionRun {
            page: self.page.clone(),
            layout: Arc::clone(&self.layout),
            coordinator: self.coordinator.clone(),
            presenter: self.presenter.clone(),
            options: self.options.clone(),
        };

        tokio::spawn(async move {
            run.execute().await;
            drop(guard);
        });

        AckStatus::Processing
    }
}

/// Holds the page context's session flag; released on drop.
struct SessionGuard(Arc<AtomicBool>);

impl SessionGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Everything one session needs, detached from the context loop.
struct SessionRun {
    page: ListingPage,
    layout: Arc<ListingLayout>,
    coordinator: Port,
    presenter: Port,
    options: SessionOptions,
}

impl SessionRun {
    async fn execute(self) {
        let terminal = match self.extract().await {
            Ok(records) => {
                info!(count = records.len(), "Extraction complete");
                Message::PapersReady { data: records }
            }
            Err(e) => {
                error!(error = %e, "Extraction failed");
                Message::PapersError {
                    error: e.to_string(),
                }
            }
        };

        if let Err(e) = self.presenter.post(terminal).await {
            debug!(error = %e, "Presenter gone, result discarded");
        }
    }

    async fn extract(&self) -> Result<Vec<Record>> {
        let entries = self.layout.enumerate(&self.page)?;
        let total = entries.len();
        let mut session = ExtractionSession::new(total);

        info!(total, url = %self.page.url(), "Starting extraction session");
        self.progress(format!("正在获取 {} 篇文献的信息...", total)).await?;

        for entry in entries {
            let title = entry.title.clone();
            let authors = self.resolve_authors(&entry).await;
            let cursor = session.push(entry.into_record(authors));

            self.progress(format!("已处理第 {}/{} 篇文献：{}", cursor, total, title))
                .await?;

            if let Some(delay) = self.options.pacing.filter(|_| cursor < total) {
                tokio::time::sleep(delay).await;
            }
        }

        self.progress(format!("已完成所有 {} 篇文献的信息获取", total)).await?;

        debug_assert_eq!(session.cursor(), session.total());
        session
            .finish()
            .ok_or_parse("session ended before every record was resolved")
    }

    /// Progress lines stop the session once the presenter is gone
    async fn progress(&self, message: String) -> Result<()> {
        debug!(%message, "Progress");
        self.presenter
            .post(Message::ProcessingStatus { message })
            .await
    }

    async fn resolve_authors(&self, entry: &ListingEntry) -> String {
        let detailed = match &entry.detail_reference {
            Some(reference) => Some(self.request_details(reference).await),
            None => None,
        };
        settle_authors(detailed, &entry.inline_authors)
    }

    async fn request_details(&self, reference: &Url) -> Result<String> {
        let request = self.coordinator.request(Message::GetAuthorDetails {
            url: reference.to_string(),
        });

        let reply = match self.options.resolve_timeout {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| ScholarError::Validation(format!("no author reply within {limit:?}")))??,
            None => request.await?,
        };

        match reply {
            Reply::Authors { authors } => Ok(authors),
            other => Err(ScholarError::Validation(format!("unexpected reply: {:?}", other))),
        }
    }
}

/// Pick the author string: the detail-page value when it is usable,
/// otherwise the listing's own first secondary line.
pub fn settle_authors(detailed: Option<Result<String>>, inline: &str) -> String {
    match detailed {
        Some(Ok(authors)) if !authors.trim().is_empty() => authors,
        Some(Ok(_)) => {
            debug!("Detail page had no authors, using listing line");
            inline.to_string()
        }
        Some(Err(e)) => {
            debug!(error = %e, "Detail lookup failed, using listing line");
            inline.to_string()
        }
        None => inline.to_string(),
    }
}

//! Hidden-view Tier-1 strategy.
//!
//! The detail page is loaded in an auxiliary view, the author field is read
//! from the loaded document and the view is discarded:
//!
//! ```text
//! Idle -> ViewOpening -> ViewLoaded -> FieldExtracted -> ViewClosed
//! ```
//!
//! `ViewOpening -> ViewLoaded` only happens on a navigation-complete signal
//! carrying the opened view's id. Once a view is open it is always closed,
//! whatever happened in between.

use super::AuthorResolver;
use crate::detail::DetailLayout;
use crate::error::{ScholarError, Result};
use crate::http::Fetcher;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use url::Url;

/// Identity of an auxiliary view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub u64);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Signals published by a [`ViewHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    NavigationComplete(ViewId),
    NavigationFailed { view: ViewId, error: String },
}

/// Lifecycle of one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Idle,
    ViewOpening(ViewId),
    ViewLoaded(ViewId),
    FieldExtracted(ViewId),
    ViewClosed,
}

/// Something that can render pages in views nobody looks at.
pub trait ViewHost: Send + Sync {
    /// Start loading `url` in a new view
    fn open<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<ViewId>>;

    /// Current document of a loaded view
    fn document(&self, view: ViewId) -> BoxFuture<'_, Result<String>>;

    /// Discard a view
    fn close(&self, view: ViewId) -> BoxFuture<'_, Result<()>>;

    /// Navigation signals for every view of this host
    fn subscribe(&self) -> broadcast::Receiver<ViewEvent>;

    /// The signal a view has already published, `None` while it is loading
    fn settled(&self, view: ViewId) -> Option<ViewEvent>;
}

/// Resolves authors by rendering the detail page in a hidden view.
pub struct HiddenViewResolver<H> {
    host: H,
    layout: DetailLayout,
    load_timeout: Option<Duration>,
}

impl<H: ViewHost> HiddenViewResolver<H> {
    pub fn new(host: H) -> Result<Self> {
        Ok(Self {
            host,
            layout: DetailLayout::scholar()?,
            load_timeout: None,
        })
    }

    /// Give up waiting for navigation after `timeout`
    pub fn with_load_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.load_timeout = timeout;
        self
    }

    #[cfg(test)]
    pub(crate) fn host(&self) -> &H {
        &self.host
    }

    async fn run(&self, reference: &Url) -> Result<String> {
        let mut state = ViewState::Idle;
        // subscribe first so the completion signal cannot be missed
        let mut events = self.host.subscribe();

        let view = self.host.open(reference).await?;
        advance(&mut state, ViewState::ViewOpening(view));

        let outcome = self.load_and_read(view, &mut events, &mut state).await;

        if let Err(e) = self.host.close(view).await {
            warn!(%view, error = %e, "Failed to close hidden view");
        }
        advance(&mut state, ViewState::ViewClosed);

        outcome
    }

    async fn load_and_read(
        &self,
        view: ViewId,
        events: &mut broadcast::Receiver<ViewEvent>,
        state: &mut ViewState,
    ) -> Result<String> {
        match self.load_timeout {
            Some(limit) => tokio::time::timeout(limit, wait_loaded(&self.host, view, events))
                .await
                .map_err(|_| ScholarError::Validation(format!("{view} did not load within {limit:?}")))??,
            None => wait_loaded(&self.host, view, events).await?,
        }
        advance(state, ViewState::ViewLoaded(view));

        let html = self.host.document(view).await?;
        let authors = self.layout.authors(&html);
        advance(state, ViewState::FieldExtracted(view));

        Ok(authors)
    }
}

impl<H: ViewHost> AuthorResolver for HiddenViewResolver<H> {
    fn name(&self) -> &'static str {
        "view"
    }

    fn resolve<'a>(&'a self, reference: &'a Url) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.run(reference))
    }
}

fn advance(state: &mut ViewState, next: ViewState) {
    debug!(from = ?state, to = ?next, "Hidden view transition");
    *state = next;
}

/// Wait for the completion signal of `view`, ignoring every other view's.
///
/// Skipped signals may have carried ours, so after a lag the host is asked
/// for the view's settled state directly.
async fn wait_loaded<H: ViewHost>(
    host: &H,
    view: ViewId,
    events: &mut broadcast::Receiver<ViewEvent>,
) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(event) => match outcome(view, &event) {
                Some(result) => return result,
                None => debug!(%view, ?event, "Ignoring signal for another view"),
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!(%view, skipped, "Navigation signals lagged");
                if let Some(result) = host.settled(view).and_then(|e| outcome(view, &e)) {
                    return result;
                }
            }
            Err(RecvError::Closed) => {
                return Err(ScholarError::ChannelClosed("view host signals".to_string()))
            }
        }
    }
}

fn outcome(view: ViewId, event: &ViewEvent) -> Option<Result<()>> {
    match event {
        ViewEvent::NavigationComplete(id) if *id == view => Some(Ok(())),
        ViewEvent::NavigationFailed { view: id, error } if *id == view => Some(Err(
            ScholarError::Validation(format!("{view} failed to load: {error}")),
        )),
        _ => None,
    }
}

// ============================================================================
// Fetch-backed view host
// ============================================================================

enum ViewSlot {
    Loading,
    Loaded(String),
    Failed(String),
}

/// A [`ViewHost`] whose views load their page with a background fetch.
///
/// Each open view is one task; its result is kept until the view is closed.
pub struct FetchViewHost {
    fetcher: Fetcher,
    next_id: AtomicU64,
    views: Arc<Mutex<HashMap<ViewId, ViewSlot>>>,
    events: broadcast::Sender<ViewEvent>,
}

impl FetchViewHost {
    pub fn new(fetcher: Fetcher) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            fetcher,
            next_id: AtomicU64::new(1),
            views: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Number of views not yet closed
    #[cfg(test)]
    pub(crate) fn open_views(&self) -> usize {
        lock_views(&self.views).map(|v| v.len()).unwrap_or(0)
    }
}

fn lock_views(
    views: &Mutex<HashMap<ViewId, ViewSlot>>,
) -> Result<MutexGuard<'_, HashMap<ViewId, ViewSlot>>> {
    views
        .lock()
        .map_err(|_| ScholarError::Validation("view table lock poisoned".to_string()))
}

impl ViewHost for FetchViewHost {
    fn open<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<ViewId>> {
        Box::pin(async move {
            let view = ViewId(self.next_id.fetch_add(1, Ordering::Relaxed));
            lock_views(&self.views)?.insert(view, ViewSlot::Loading);

            let fetcher = self.fetcher.clone();
            let views = Arc::clone(&self.views);
            let events = self.events.clone();
            let target = url.clone();

            tokio::spawn(async move {
                let (slot, event) = match fetcher.fetch_document(&target).await {
                    Ok(html) => (ViewSlot::Loaded(html), ViewEvent::NavigationComplete(view)),
                    Err(e) => (
                        ViewSlot::Failed(e.to_string()),
                        ViewEvent::NavigationFailed {
                            view,
                            error: e.to_string(),
                        },
                    ),
                };

                match lock_views(&views) {
                    // closed while loading: drop the page
                    Ok(mut table) => match table.get_mut(&view) {
                        Some(existing) => *existing = slot,
                        None => return,
                    },
                    Err(e) => warn!(%view, error = %e, "Cannot store view document"),
                }
                // no subscribers is fine
                let _ = events.send(event);
            });

            debug!(%view, url = %url, "Opened hidden view");
            Ok(view)
        })
    }

    fn document(&self, view: ViewId) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            match lock_views(&self.views)?.get(&view) {
                Some(ViewSlot::Loaded(html)) => Ok(html.clone()),
                Some(ViewSlot::Failed(error)) => Err(ScholarError::Validation(error.clone())),
                Some(ViewSlot::Loading) => {
                    Err(ScholarError::Validation(format!("{view} is still loading")))
                }
                None => Err(ScholarError::Validation(format!("{view} is not open"))),
            }
        })
    }

    fn close(&self, view: ViewId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            lock_views(&self.views)?.remove(&view);
            debug!(%view, "Closed hidden view");
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    fn settled(&self, view: ViewId) -> Option<ViewEvent> {
        match lock_views(&self.views).ok()?.get(&view)? {
            ViewSlot::Loaded(_) => Some(ViewEvent::NavigationComplete(view)),
            ViewSlot::Failed(error) => Some(ViewEvent::NavigationFailed {
                view,
                error: error.clone(),
            }),
            ViewSlot::Loading => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::FetchOptions;
    use std::sync::atomic::AtomicBool;

    const OWN: ViewId = ViewId(7);
    const STALE: ViewId = ViewId(3);

    /// Emits a stale signal on every open, then (optionally) its own,
    /// followed by `trailing` stale ones.
    struct ScriptedHost {
        events: broadcast::Sender<ViewEvent>,
        body: Option<String>,
        signal_own: bool,
        trailing: usize,
        loaded: Arc<AtomicBool>,
        closed: Mutex<Vec<ViewId>>,
    }

    impl ScriptedHost {
        fn new(body: Option<&str>, signal_own: bool) -> Self {
            let (events, _) = broadcast::channel(2);
            Self {
                events,
                body: body.map(str::to_string),
                signal_own,
                trailing: 0,
                loaded: Arc::new(AtomicBool::new(false)),
                closed: Mutex::new(Vec::new()),
            }
        }

        fn with_trailing(mut self, trailing: usize) -> Self {
            self.trailing = trailing;
            self
        }

        fn closed(&self) -> Vec<ViewId> {
            self.closed.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    impl ViewHost for ScriptedHost {
        fn open<'a>(&'a self, _url: &'a Url) -> BoxFuture<'a, Result<ViewId>> {
            Box::pin(async move {
                let _ = self.events.send(ViewEvent::NavigationComplete(STALE));
                if self.signal_own {
                    let events = self.events.clone();
                    let loaded = Arc::clone(&self.loaded);
                    let trailing = self.trailing;
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        loaded.store(true, Ordering::SeqCst);
                        let _ = events.send(ViewEvent::NavigationComplete(OWN));
                        for _ in 0..trailing {
                            let _ = events.send(ViewEvent::NavigationComplete(STALE));
                        }
                    });
                }
                Ok(OWN)
            })
        }

        fn document(&self, view: ViewId) -> BoxFuture<'_, Result<String>> {
            Box::pin(async move {
                assert_eq!(view, OWN);
                if !self.loaded.load(Ordering::SeqCst) {
                    return Err(ScholarError::Validation("read before load".to_string()));
                }
                self.body
                    .clone()
                    .ok_or_else(|| ScholarError::Validation("blank view".to_string()))
            })
        }

        fn close(&self, view: ViewId) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                if let Ok(mut closed) = self.closed.lock() {
                    closed.push(view);
                }
                Ok(())
            })
        }

        fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
            self.events.subscribe()
        }

        fn settled(&self, view: ViewId) -> Option<ViewEvent> {
            (view == OWN && self.loaded.load(Ordering::SeqCst)).then_some(ViewEvent::NavigationComplete(OWN))
        }
    }

    fn reference() -> Url {
        Url::parse("https://scholar.google.com/citations?view_op=view_citation").expect("valid url")
    }

    #[tokio::test]
    async fn test_stale_signal_does_not_complete_load() -> Result<()> {
        let host = ScriptedHost::new(Some(r#"<div class="gsc_oci_value">A, B</div>"#), true);
        let resolver = HiddenViewResolver::new(host)?;

        assert_eq!(resolver.resolve(&reference()).await?, "A, B");
        assert_eq!(resolver.host().closed(), vec![OWN]);
        Ok(())
    }

    #[tokio::test]
    async fn test_view_closed_when_nothing_found() -> Result<()> {
        let resolver = HiddenViewResolver::new(ScriptedHost::new(Some("<p>empty</p>"), true))?;
        assert_eq!(resolver.resolve(&reference()).await?, "");
        assert_eq!(resolver.host().closed(), vec![OWN]);
        Ok(())
    }

    #[tokio::test]
    async fn test_view_closed_on_read_error() -> Result<()> {
        let resolver = HiddenViewResolver::new(ScriptedHost::new(None, true))?;
        assert!(resolver.resolve(&reference()).await.is_err());
        assert_eq!(resolver.host().closed(), vec![OWN]);
        Ok(())
    }

    #[tokio::test]
    async fn test_view_closed_on_load_timeout() -> Result<()> {
        let resolver = HiddenViewResolver::new(ScriptedHost::new(Some("x"), false))?
            .with_load_timeout(Some(Duration::from_millis(50)));
        assert!(resolver.resolve(&reference()).await.is_err());
        assert_eq!(resolver.host().closed(), vec![OWN]);
        Ok(())
    }

    #[tokio::test]
    async fn test_lagged_signals_fall_back_to_settled_state() -> Result<()> {
        // own completion is pushed out of the 2-slot channel by later signals
        let host = ScriptedHost::new(Some(r#"<div class="gsc_oci_value">E, F</div>"#), true).with_trailing(3);
        let resolver = HiddenViewResolver::new(host)?;

        let authors = tokio::time::timeout(Duration::from_secs(2), resolver.resolve(&reference()))
            .await
            .map_err(|_| ScholarError::Validation("resolution hung after lag".to_string()))??;
        assert_eq!(authors, "E, F");
        assert_eq!(resolver.host().closed(), vec![OWN]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_view_host_end_to_end() -> Result<()> {
        let mut server = mockito::Server::new_async().await;
        let _detail = server
            .mock("GET", "/detail")
            .with_status(200)
            .with_body(r#"<div class="gs_gray">C. Wu, D. Ng</div>"#)
            .create_async()
            .await;
        let _gone = server
            .mock("GET", "/gone")
            .with_status(500)
            .create_async()
            .await;

        let host = FetchViewHost::new(Fetcher::new(&FetchOptions::default())?);
        let resolver = HiddenViewResolver::new(host)?;
        let join = |p: &str| {
            Url::parse(&format!("{}{}", server.url(), p)).map_err(|e| ScholarError::Config(e.to_string()))
        };

        assert_eq!(resolver.resolve(&join("/detail")?).await?, "C. Wu, D. Ng");
        assert!(resolver.resolve(&join("/gone")?).await.is_err());
        assert_eq!(resolver.host().open_views(), 0);
        Ok(())
    }
}

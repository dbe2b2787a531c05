//! HTTP access to the source site.
//!
//! A [`Fetcher`] wraps one `reqwest::Client` configured with a browser-like
//! user agent, cookie store and optional proxy. It is shared by the listing
//! loader and the Tier-1 resolution strategies.

use crate::error::{ScholarError, Result};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// HTTP client options
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Interface language sent as `hl` and `Accept-Language`
    pub lang: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            proxy: None,
            timeout: Duration::from_secs(30),
            lang: "en".to_string(),
        }
    }
}

/// Shared document fetcher
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    lang: String,
}

impl Fetcher {
    /// Build a fetcher from options
    pub fn new(options: &FetchOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .cookie_store(true);

        if let Some(proxy_url) = options.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                ScholarError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ScholarError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            lang: options.lang.clone(),
        })
    }

    /// Fetch a document and return its body.
    ///
    /// # Errors
    ///
    /// `RateLimited` on 429, `Http` on any other non-success status,
    /// `Captcha` when the body is an anti-bot interstitial.
    pub async fn fetch_document(&self, url: &Url) -> Result<String> {
        debug!(url = %url, "Fetching document");

        let response = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", format!("{},en;q=0.8", self.lang))
            .header("Cache-Control", "no-cache")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Upgrade-Insecure-Requests", "1")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScholarError::RateLimited(60));
        }

        if !status.is_success() {
            return Err(ScholarError::Http {
                code: status.as_u16(),
                message: status.to_string(),
            });
        }

        let html = response.text().await?;
        if is_captcha(&html) {
            warn!(url = %url, "CAPTCHA detected");
            return Err(ScholarError::Captcha);
        }

        Ok(html)
    }
}

/// Whether a page is Google's anti-bot interstitial
pub fn is_captcha(html: &str) -> bool {
    html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic")
}

/// Build the profile listing URL for a Scholar user id
pub fn build_profile_url(base_url: &str, user: &str, lang: &str) -> Result<Url> {
    let user = user.trim();
    if user.is_empty() {
        return Err(ScholarError::Config("Empty Scholar user id".to_string()));
    }

    let mut url = Url::parse(&format!("{}/citations", base_url.trim_end_matches('/')))
        .map_err(|e| ScholarError::Config(format!("Invalid base URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("user", user)
        .append_pair("hl", lang);

    Ok(url)
}

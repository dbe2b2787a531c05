//! Profile listing page: record enumeration and primary field derivation.
//!
//! Field conventions of the Scholar profile table:
//!
//! - title and detail link come from `a.gsc_a_at`
//! - the first `.gs_gray` line is the (possibly truncated) author list
//! - the second `.gs_gray` line is the venue; with only one line the venue
//!   is empty
//! - `.gsc_a_ac` holds the citation count, `"0"` when the node is missing
//! - `.gsc_a_h` holds the year

use crate::error::{selector, ScholarError, Result};
use crate::http::DEFAULT_SCHOLAR_URL;
use crate::lookup::{LookupChain, Step};
use crate::session::{Record, DEFAULT_CITATIONS};
use regex::Regex;
use scraper::{Html, Selector};
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// A loaded listing page together with the URL it was loaded from.
#[derive(Debug, Clone)]
pub struct ListingPage {
    url: Url,
    html: String,
}

impl ListingPage {
    pub fn new(url: Url, html: String) -> Self {
        Self { url, html }
    }

    /// Read a saved listing page; relative links resolve against `base`
    /// (or the public Scholar host when none is given).
    pub fn from_file(path: &Path, base: Option<&Url>) -> Result<Self> {
        let html = std::fs::read_to_string(path)?;
        let url = match base {
            Some(url) => url.clone(),
            None => Url::parse(DEFAULT_SCHOLAR_URL)
                .map_err(|e| ScholarError::Config(format!("Invalid base URL: {}", e)))?,
        };
        info!(path = %path.display(), bytes = html.len(), "Loaded listing page from file");
        Ok(Self { url, html })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

/// Primary fields of one listing row, before author resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub title: String,
    pub detail_reference: Option<Url>,
    /// First secondary-text line; the Tier-2 author value
    pub inline_authors: String,
    pub venue: String,
    pub citation_count: String,
    pub year: String,
}

impl ListingEntry {
    /// Finish the entry with its resolved author string
    pub fn into_record(self, authors: String) -> Record {
        Record {
            title: self.title,
            detail_reference: self.detail_reference,
            authors,
            venue: self.venue,
            citation_count: self.citation_count,
            year: self.year,
        }
    }
}

/// Compiled selectors and lookup chains for the profile table.
#[derive(Debug, Clone)]
pub struct ListingLayout {
    table: Selector,
    row: Selector,
    title: LookupChain,
    reference: LookupChain,
    inline_authors: LookupChain,
    venue: LookupChain,
    citations: LookupChain,
    year: LookupChain,
}

impl ListingLayout {
    /// Layout of a Google Scholar profile page
    pub fn scholar() -> Result<Self> {
        let title_link = selector("a.gsc_a_at")?;
        let gray = selector(".gs_gray")?;
        let year_cell = selector(".gsc_a_h")?;
        let year_token =
            Regex::new(r"\b(1[5-9]|20)\d{2}\b").map_err(|e| ScholarError::Parse(e.to_string()))?;

        Ok(Self {
            table: selector("#gsc_a_b")?,
            row: selector("tr.gsc_a_tr")?,
            title: LookupChain::new().then(Step::Text(title_link.clone())),
            reference: LookupChain::new()
                .then(Step::Attr(title_link.clone(), "href"))
                .then(Step::Attr(title_link, "data-href")),
            inline_authors: LookupChain::new().then(Step::NthText(gray.clone(), 0)),
            venue: LookupChain::new().then(Step::NthText(gray, 1)),
            citations: LookupChain::new().then(Step::Text(selector(".gsc_a_ac")?)),
            year: LookupChain::new()
                .then(Step::Token(year_cell.clone(), year_token))
                .then(Step::Text(year_cell)),
        })
    }

    /// Enumerate every record row in document order.
    ///
    /// # Errors
    ///
    /// `Parse` when the page has neither the publication table nor any
    /// record row; a table without rows is an empty listing.
    pub fn enumerate(&self, page: &ListingPage) -> Result<Vec<ListingEntry>> {
        let document = Html::parse_document(page.html());

        let has_table = document.select(&self.table).next().is_some();
        let rows: Vec<_> = document.select(&self.row).collect();

        if !has_table && rows.is_empty() {
            return Err(ScholarError::Parse(
                "no publication table on listing page".to_string(),
            ));
        }

        let entries: Vec<ListingEntry> = rows
            .into_iter()
            .map(|row| {
                // an unusable href (e.g. `javascript:`) falls through to data-href
                let detail_reference = self
                    .reference
                    .candidates(row)
                    .find_map(|href| resolve_reference(page.url(), &href));

                ListingEntry {
                    title: self.title.find_or(row, ""),
                    detail_reference,
                    inline_authors: self.inline_authors.find_or(row, ""),
                    venue: self.venue.find_or(row, ""),
                    citation_count: self.citations.find_or(row, DEFAULT_CITATIONS),
                    year: self.year.find_or(row, ""),
                }
            })
            .collect();

        debug!(count = entries.len(), url = %page.url(), "Enumerated listing rows");
        Ok(entries)
    }
}

/// Resolve a link against the page URL, keeping only http(s) targets
fn resolve_reference(base: &Url, href: &str) -> Option<Url> {
    base.join(href)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

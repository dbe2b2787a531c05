//! Records and the per-request extraction session.

use serde::{Deserialize, Serialize};
use url::Url;

/// Default citation count when the listing has no citation node
pub const DEFAULT_CITATIONS: &str = "0";

/// One bibliographic entry of a profile listing.
///
/// Every string field is always present once the record is emitted;
/// consumers only ever check for emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Display text of the record's title link
    pub title: String,
    /// Link to the detail page holding the full author list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_reference: Option<Url>,
    /// Resolved author string
    #[serde(default)]
    pub authors: String,
    /// Journal or conference line
    #[serde(default)]
    pub venue: String,
    /// Citation count as displayed
    #[serde(default = "default_citations")]
    pub citation_count: String,
    /// Publication year
    #[serde(default)]
    pub year: String,
}

fn default_citations() -> String {
    DEFAULT_CITATIONS.to_string()
}

/// Ephemeral state of one extraction request.
///
/// `records` grows in enumeration order and `cursor` always equals its
/// length; the session can only be finished once `cursor == total`.
#[derive(Debug)]
pub struct ExtractionSession {
    records: Vec<Record>,
    total: usize,
    cursor: usize,
}

impl ExtractionSession {
    pub fn new(total: usize) -> Self {
        Self {
            records: Vec::with_capacity(total),
            total,
            cursor: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Index of the record currently being resolved
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    /// Append the next record and advance the cursor; returns the new cursor.
    ///
    /// Records past `total` are dropped.
    pub fn push(&mut self, record: Record) -> usize {
        if self.cursor < self.total {
            self.records.push(record);
            self.cursor += 1;
        }
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor == self.total
    }

    /// Consume the session, yielding its records when complete.
    pub fn finish(self) -> Option<Vec<Record>> {
        (self.is_complete() && self.records.len() == self.total).then_some(self.records)
    }
}

//! Presenter side of the protocol: request a session, follow its progress,
//! and pick the records to export.

use crate::bus::{Envelope, Mailbox, Port};
use crate::error::{ScholarError, Result};
use crate::protocol::{AckStatus, Message, Reply};
use crate::session::Record;
use tracing::{debug, info};

/// Consumer of one Extractor context.
pub struct Presenter {
    extractor: Port,
    inbox: Mailbox,
}

impl Presenter {
    pub fn new(extractor: Port, inbox: Mailbox) -> Self {
        Self { extractor, inbox }
    }

    /// Ask for the listing's records and wait for the session to end.
    ///
    /// `on_progress` sees every `processingStatus` line in order.
    ///
    /// # Errors
    ///
    /// `Busy` when a session is already running, `Extraction` when the
    /// session ended with `papersError`, `ChannelClosed` when the Extractor
    /// context went away without a result.
    pub async fn request_papers<F>(&mut self, mut on_progress: F) -> Result<Vec<Record>>
    where
        F: FnMut(&str),
    {
        match self.extractor.request(Message::GetPapers).await? {
            Reply::Ack {
                status: AckStatus::Processing,
            } => debug!("Extraction accepted"),
            Reply::Ack {
                status: AckStatus::Busy,
            } => return Err(ScholarError::Busy),
            Reply::Ack {
                status: AckStatus::NotReady,
            } => {
                return Err(ScholarError::Validation(
                    "listing page has not finished loading".to_string(),
                ))
            }
            other => {
                return Err(ScholarError::Validation(format!(
                    "unexpected reply to getPapers: {:?}",
                    other
                )))
            }
        }

        while let Some(Envelope { message, .. }) = self.inbox.recv().await {
            match message {
                Message::ProcessingStatus { message } => on_progress(&message),
                Message::PapersReady { data } => {
                    info!(count = data.len(), "Papers ready");
                    return Ok(data);
                }
                Message::PapersError { error } => return Err(ScholarError::Extraction(error)),
                other => debug!(kind = other.kind(), "Presenter ignoring message"),
            }
        }

        Err(ScholarError::ChannelClosed(
            "extractor ended without a result".to_string(),
        ))
    }
}

/// Parse a 1-based selection such as `"1,3-5"` into 0-based indices.
///
/// Indices are returned sorted and deduplicated.
pub fn parse_selection(selection: &str, len: usize) -> Result<Vec<usize>> {
    let mut indices = Vec::new();

    for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a)?, parse_index(b)?),
            None => {
                let n = parse_index(part)?;
                (n, n)
            }
        };

        if start == 0 || start > end || end > len {
            return Err(ScholarError::Validation(format!(
                "selection '{}' is outside 1-{}",
                part, len
            )));
        }
        indices.extend(start - 1..end);
    }

    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}

fn parse_index(s: &str) -> Result<usize> {
    s.trim()
        .parse()
        .map_err(|_| ScholarError::Validation(format!("invalid record number '{}'", s.trim())))
}

/// Records at the given 0-based indices, in index order.
pub fn select(records: &[Record], indices: &[usize]) -> Result<Vec<Record>> {
    indices
        .iter()
        .map(|&i| {
            records.get(i).cloned().ok_or_else(|| {
                ScholarError::Validation(format!("record {} out of range (have {})", i, records.len()))
            })
        })
        .collect()
}

/// Plain-text listing of records for the terminal
pub fn render(records: &[Record]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] {}\n    作者: {}\n    期刊: {}\n    发表年份: {}\n    引用次数: {}\n",
                i + 1,
                r.title,
                r.authors,
                r.venue,
                r.year,
                r.citation_count
            )
        })
        .collect()
}

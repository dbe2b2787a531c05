//! Messages exchanged between the Coordinator, Extractor and Presenter.
//!
//! Every message carries its kind in the `action` field on the wire.

use crate::session::Record;
use serde::{Deserialize, Serialize};

/// A message posted to some context's mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Coordinator → Extractor: the listing page finished loading
    PageLoaded,
    /// Presenter → Extractor: start a session
    GetPapers,
    /// Extractor → Presenter: progress line
    ProcessingStatus { message: String },
    /// Extractor → Presenter: terminal success
    PapersReady { data: Vec<Record> },
    /// Extractor → Presenter: terminal failure
    PapersError { error: String },
    /// Extractor → Coordinator: resolve the full author list of a record.
    /// `fetchAuthors` is the legacy name of the same request.
    #[serde(alias = "fetchAuthors")]
    GetAuthorDetails { url: String },
}

impl Message {
    /// Wire name of the message kind
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PageLoaded => "pageLoaded",
            Message::GetPapers => "getPapers",
            Message::ProcessingStatus { .. } => "processingStatus",
            Message::PapersReady { .. } => "papersReady",
            Message::PapersError { .. } => "papersError",
            Message::GetAuthorDetails { .. } => "getAuthorDetails",
        }
    }

    /// Whether this message ends a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, Message::PapersReady { .. } | Message::PapersError { .. })
    }
}

/// Outcome of a `getPapers` request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AckStatus {
    /// Session started; results follow as events
    Processing,
    /// Another session is active in this page context
    Busy,
    /// No listing page has been announced yet
    NotReady,
}

/// Direct reply to a request-style message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Ack { status: AckStatus },
    Authors { authors: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Result;

    #[test]
    fn test_wire_names() -> Result<()> {
        let json = serde_json::to_string(&Message::GetAuthorDetails {
            url: "https://x/y".to_string(),
        })?;
        assert_eq!(json, r#"{"action":"getAuthorDetails","url":"https://x/y"}"#);

        let json = serde_json::to_string(&Message::PageLoaded)?;
        assert_eq!(json, r#"{"action":"pageLoaded"}"#);
        Ok(())
    }

    #[test]
    fn test_legacy_fetch_authors_alias() -> Result<()> {
        let msg: Message = serde_json::from_str(r#"{"action":"fetchAuthors","url":"u"}"#)?;
        assert_eq!(msg, Message::GetAuthorDetails { url: "u".to_string() });
        assert_eq!(msg.kind(), "getAuthorDetails");
        Ok(())
    }

    #[test]
    fn test_reply_shapes() -> Result<()> {
        let ack = serde_json::to_string(&Reply::Ack { status: AckStatus::Processing })?;
        assert_eq!(ack, r#"{"status":"processing"}"#);

        let reply: Reply = serde_json::from_str(r#"{"authors":"A, B"}"#)?;
        assert_eq!(reply, Reply::Authors { authors: "A, B".to_string() });
        Ok(())
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(Message::PapersError { error: String::new() }.is_terminal());
        assert!(Message::PapersReady { data: vec![] }.is_terminal());
        assert!(!Message::ProcessingStatus { message: String::new() }.is_terminal());
    }
}

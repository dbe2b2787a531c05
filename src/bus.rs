//! Typed asynchronous mailboxes between execution contexts.
//!
//! Each context owns a [`Mailbox`]; others hold cloned [`Port`]s to it.
//! Messages either travel fire-and-forget ([`Port::post`]) or carry a
//! one-shot reply slot ([`Port::request`]). A reply is bounded by the
//! lifetime of the receiving context: if it drops the envelope without
//! answering, the requester sees [`ScholarError::ChannelClosed`].

use crate::error::{ScholarError, Result};
use crate::protocol::{Message, Reply};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Default mailbox depth
pub const MAILBOX_CAPACITY: usize = 64;

/// A message plus its reply slot.
#[derive(Debug)]
pub struct Envelope {
    pub message: Message,
    pub reply: Responder,
}

/// One-shot reply slot; empty for fire-and-forget messages.
#[derive(Debug)]
pub struct Responder(Option<oneshot::Sender<Reply>>);

impl Responder {
    /// Answer the sender; ignored for fire-and-forget messages or when the
    /// sender is gone.
    pub fn respond(self, reply: Reply) {
        if let Some(tx) = self.0 {
            if tx.send(reply).is_err() {
                debug!("Reply dropped, requester gone");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn expects_reply(&self) -> bool {
        self.0.is_some()
    }
}

/// Sending half of a context's mailbox.
#[derive(Debug, Clone)]
pub struct Port {
    name: &'static str,
    tx: mpsc::Sender<Envelope>,
}

impl Port {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Post without waiting for a reply
    pub async fn post(&self, message: Message) -> Result<()> {
        self.tx
            .send(Envelope {
                message,
                reply: Responder(None),
            })
            .await
            .map_err(|_| ScholarError::ChannelClosed(self.name.to_string()))
    }

    /// Post and wait for the receiver's reply
    pub async fn request(&self, message: Message) -> Result<Reply> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: Responder(Some(reply_tx)),
            })
            .await
            .map_err(|_| ScholarError::ChannelClosed(self.name.to_string()))?;

        reply_rx
            .await
            .map_err(|_| ScholarError::ChannelClosed(format!("{} (no reply)", self.name)))
    }

    /// Whether the owning context has gone away
    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half owned by one context.
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::Receiver<Envelope>,
}

impl Mailbox {
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }
}

/// Create a named mailbox
pub fn mailbox(name: &'static str) -> (Port, Mailbox) {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    (Port { name, tx }, Mailbox { rx })
}

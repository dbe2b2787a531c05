//! # rustgsprofile
//!
//! Google Scholar profile extractor: enumerates every record of a profile
//! listing, recovers the full author list of truncated records from their
//! detail pages, and exports the result as CSV.
//!
//! ## Modules
//!
//! - [`coordinator`] - Listing loader and detail-page resolution broker
//! - [`extractor`] - Per-page session: enumeration and two-tier author resolution
//! - [`presenter`] - Session consumer, selection and rendering
//! - [`bus`] / [`protocol`] - Typed mailboxes and the messages they carry
//! - [`listing`] / [`detail`] / [`lookup`] - Structural lookups on Scholar pages
//! - [`export`] - CSV output
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustgsprofile::pipeline::{self, ListingSource, PipelineOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let url = "https://scholar.google.com/citations?user=XXXX&hl=en".parse()?;
//!     let records = pipeline::run(ListingSource::Url(url), &PipelineOptions::default(), |line| {
//!         println!("{line}");
//!     })
//!     .await?;
//!     rustgsprofile::export::export_to_dir(&records, std::path::Path::new("."))?;
//!     Ok(())
//! }
//! ```

pub mod bus;
pub mod coordinator;
pub mod detail;
pub mod error;
pub mod export;
pub mod extractor;
pub mod http;
pub mod listing;
pub mod lookup;
pub mod pipeline;
pub mod presenter;
pub mod protocol;
pub mod session;

pub use error::{Result, ScholarError};
pub use session::Record;

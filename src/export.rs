//! CSV export of selected records.
//!
//! Output is UTF-8 with a byte-order mark so spreadsheet tools pick the
//! right encoding; every data field is quoted.

use crate::error::{ScholarError, Result};
use crate::session::Record;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Exported file name
pub const EXPORT_FILENAME: &str = "scholar_papers.csv";

/// Header row: title, authors, venue, year, citations
pub const HEADER: [&str; 5] = ["标题", "作者", "期刊", "发表年份", "引用次数"];

const BOM: &str = "\u{feff}";

/// Write `records` as CSV to `out`.
///
/// # Errors
///
/// `NothingSelected` when `records` is empty; nothing is written then.
pub fn write_csv<W: Write>(records: &[Record], mut out: W) -> Result<()> {
    if records.is_empty() {
        return Err(ScholarError::NothingSelected);
    }

    out.write_all(BOM.as_bytes())?;
    out.write_all(HEADER.join(",").as_bytes())?;
    out.write_all(b"\n")?;

    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(out);

    for r in records {
        wtr.write_record([&r.title, &r.authors, &r.venue, &r.year, &r.citation_count])?;
    }

    wtr.flush()?;
    Ok(())
}

/// CSV bytes for `records`
pub fn to_csv_bytes(records: &[Record]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(records, &mut buf)?;
    Ok(buf)
}

/// Write `scholar_papers.csv` into `dir` and return its path.
///
/// The file is only created once the content has been produced.
pub fn export_to_dir(records: &[Record], dir: &Path) -> Result<PathBuf> {
    let bytes = to_csv_bytes(records)?;

    std::fs::create_dir_all(dir)?;
    let path = dir.join(EXPORT_FILENAME);
    std::fs::write(&path, bytes)?;

    info!(path = %path.display(), count = records.len(), "Exported CSV");
    Ok(path)
}

/// Where exports go when no directory is given
pub fn default_export_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}

//! Author lookup on a record's detail page.

use crate::error::{selector, Result};
use crate::lookup::{LookupChain, Step};
use scraper::Html;

/// Lookup chain for the full author list: the first `.gsc_oci_value`
/// (the "Authors" row), then the first `.gs_gray`; empty matches are
/// skipped.
#[derive(Debug, Clone)]
pub struct DetailLayout {
    authors: LookupChain,
}

impl DetailLayout {
    pub fn scholar() -> Result<Self> {
        Ok(Self {
            authors: LookupChain::new()
                .then(Step::Text(selector(".gsc_oci_value")?))
                .then(Step::Text(selector(".gs_gray")?))
                .non_empty(),
        })
    }

    /// Full author string of a detail document, empty when not found
    pub fn authors(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        self.authors.find_or(document.root_element(), "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oci_value_preferred() -> Result<()> {
        let html = r#"<div id="gsc_oci_table">
            <div class="gs_scl"><div class="gsc_oci_field">Authors</div>
            <div class="gsc_oci_value">A. Smith, B. Lee, C. Wu</div></div>
            <div class="gs_scl"><div class="gsc_oci_field">Journal</div>
            <div class="gsc_oci_value">Nature</div></div></div>
            <div class="gs_gray">ignored</div>"#;
        assert_eq!(DetailLayout::scholar()?.authors(html), "A. Smith, B. Lee, C. Wu");
        Ok(())
    }

    #[test]
    fn test_falls_back_to_gray() -> Result<()> {
        let html = r#"<div class="gs_gray">X Y, Z W</div>"#;
        assert_eq!(DetailLayout::scholar()?.authors(html), "X Y, Z W");
        Ok(())
    }

    #[test]
    fn test_empty_value_falls_through() -> Result<()> {
        let html = r#"<div class="gsc_oci_value"> </div><div class="gs_gray">Q R</div>"#;
        assert_eq!(DetailLayout::scholar()?.authors(html), "Q R");
        Ok(())
    }

    #[test]
    fn test_nothing_found() -> Result<()> {
        assert_eq!(DetailLayout::scholar()?.authors("<p>removed</p>"), "");
        Ok(())
    }
}

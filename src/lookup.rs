//! Ordered structural lookups.
//!
//! A field is derived by trying a chain of [`Step`]s against a scope element;
//! the first step that matches wins and the caller supplies the documented
//! default for when none does. Keeping the chains as data lets the listing
//! and detail-page conventions be tested without a live page.

use regex::Regex;
use scraper::{ElementRef, Selector};

/// One way of reading a value out of a scope.
#[derive(Debug, Clone)]
pub enum Step {
    /// Trimmed text of the first matching node
    Text(Selector),
    /// Trimmed text of the n-th (0-based) matching node
    NthText(Selector, usize),
    /// Trimmed attribute value of the first matching node
    Attr(Selector, &'static str),
    /// First regex match inside the text of the first matching node
    Token(Selector, Regex),
}

impl Step {
    fn apply(&self, scope: ElementRef<'_>) -> Option<String> {
        match self {
            Step::Text(sel) => scope.select(sel).next().map(text_of),
            Step::NthText(sel, n) => scope.select(sel).nth(*n).map(text_of),
            Step::Attr(sel, name) => scope
                .select(sel)
                .next()
                .and_then(|el| el.value().attr(name))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            Step::Token(sel, re) => scope
                .select(sel)
                .next()
                .map(text_of)
                .and_then(|text| re.find(&text).map(|m| m.as_str().to_string())),
        }
    }
}

/// An ordered list of steps; first success wins.
#[derive(Debug, Clone, Default)]
pub struct LookupChain {
    steps: Vec<Step>,
    non_empty: bool,
}

impl LookupChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step tried after the existing ones
    pub fn then(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Treat a matched node with empty text as no match
    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    /// Every successful step's value, in chain order
    pub fn candidates<'a>(&'a self, scope: ElementRef<'a>) -> impl Iterator<Item = String> + 'a {
        self.steps
            .iter()
            .filter_map(move |step| step.apply(scope))
            .filter(move |value| !self.non_empty || !value.is_empty())
    }

    /// Value of the first successful step, if any
    pub fn find(&self, scope: ElementRef<'_>) -> Option<String> {
        self.candidates(scope).next()
    }

    /// Value of the first successful step, or `default`
    pub fn find_or(&self, scope: ElementRef<'_>, default: &str) -> String {
        self.find(scope).unwrap_or_else(|| default.to_string())
    }
}

/// Rendered text of a node: whitespace runs, line breaks included,
/// collapse to one space and the ends are trimmed.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{selector, Result};
    use scraper::Html;

    fn doc(body: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn test_first_success_wins() -> Result<()> {
        let html = doc(r#"<div class="b">second</div><div class="a">first</div>"#);
        let chain = LookupChain::new()
            .then(Step::Text(selector(".a")?))
            .then(Step::Text(selector(".b")?));
        assert_eq!(chain.find(html.root_element()).as_deref(), Some("first"));
        Ok(())
    }

    #[test]
    fn test_empty_node_counts_unless_non_empty() -> Result<()> {
        let html = doc(r#"<span class="a">  </span><span class="b">x</span>"#);
        let chain = LookupChain::new()
            .then(Step::Text(selector(".a")?))
            .then(Step::Text(selector(".b")?));
        assert_eq!(chain.find(html.root_element()).as_deref(), Some(""));
        assert_eq!(chain.non_empty().find(html.root_element()).as_deref(), Some("x"));
        Ok(())
    }

    #[test]
    fn test_nth_and_default() -> Result<()> {
        let html = doc(r#"<div class="g">one</div>"#);
        let chain = LookupChain::new().then(Step::NthText(selector(".g")?, 1));
        assert_eq!(chain.find(html.root_element()), None);
        assert_eq!(chain.find_or(html.root_element(), "0"), "0");
        Ok(())
    }

    #[test]
    fn test_wrapped_text_is_collapsed() -> Result<()> {
        let html = doc("<a class=\"t\">Deep\n    Things <b>and</b>\tMore </a>");
        let chain = LookupChain::new().then(Step::Text(selector("a.t")?));
        assert_eq!(chain.find(html.root_element()).as_deref(), Some("Deep Things and More"));
        Ok(())
    }

    #[test]
    fn test_candidates_in_chain_order() -> Result<()> {
        let html = doc(r#"<a class="t" href="javascript:void(0)" data-href="/x">T</a>"#);
        let chain = LookupChain::new()
            .then(Step::Attr(selector("a.t")?, "href"))
            .then(Step::Attr(selector("a.t")?, "data-href"));
        let all: Vec<String> = chain.candidates(html.root_element()).collect();
        assert_eq!(all, ["javascript:void(0)", "/x"]);
        Ok(())
    }

    #[test]
    fn test_attr_and_token() -> Result<()> {
        let html = doc(r#"<a class="t" href=" /x?y=1 " data-href="">T</a><span class="h">c. 2019 ed.</span>"#);
        let href = LookupChain::new().then(Step::Attr(selector("a.t")?, "href"));
        assert_eq!(href.find(html.root_element()).as_deref(), Some("/x?y=1"));

        let missing = LookupChain::new().then(Step::Attr(selector("a.t")?, "data-href"));
        assert_eq!(missing.find(html.root_element()), None);

        let year = Regex::new(r"\b(19|20)\d{2}\b").map_err(|e| crate::ScholarError::Parse(e.to_string()))?;
        let token = LookupChain::new().then(Step::Token(selector(".h")?, year));
        assert_eq!(token.find(html.root_element()).as_deref(), Some("2019"));
        Ok(())
    }
}

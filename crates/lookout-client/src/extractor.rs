use std::collections::BTreeSet;

use lookout_core::models::ExtractionResult;
use lookout_core::traits::Extractor;
use scraper::{ElementRef, Html, Selector};

/// CSS selector extractor using scraper.
///
/// Parses the body as an HTML document (with html5ever's error recovery,
/// so any input parses) and collects the text of every element matching
/// each rule. A rule that is not a valid selector matches nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectorExtractor;

impl SelectorExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for SelectorExtractor {
    fn extract(&self, html: &str, rules: &BTreeSet<String>) -> ExtractionResult {
        let document = Html::parse_document(html);

        rules
            .iter()
            .map(|rule| {
                let values = match Selector::parse(rule) {
                    Ok(selector) => document.select(&selector).map(element_text).collect(),
                    Err(e) => {
                        tracing::warn!(%rule, error = %e, "Invalid selector");
                        Vec::new()
                    }
                };
                (rule.clone(), values)
            })
            .collect()
    }
}

/// Text of an element: each text node trimmed, empty nodes dropped, the
/// rest joined with a single space.
fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

use scraper::{ElementRef, Html, Node, Selector};
use once_cell::sync::Lazy;
use thiserror::Error;

/// Extractions shorter than this are treated as failures.
pub const MIN_CONTENT_CHARS: usize = 50;

/// Elements whose whole subtree is dropped before reading the text.
const EXCLUDED_ELEMENTS: &[&str] = &[
    "script", "style", "link", "noscript", "svg", "header", "footer", "nav", "aside",
];

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("extracted content is too short ({length} characters, need at least {minimum})")]
    TooShort { length: usize, minimum: usize },
}

/// Reduces an HTML document to its readable text.
///
/// Text is read in document order from `<body>` (or the whole document when
/// there is none), skipping non-content elements. Whitespace runs collapse to
/// a single space and the result is trimmed.
pub fn extract_text(html: &str) -> Result<String, ExtractError> {
    let document = Html::parse_document(html);

    let root = document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::with_capacity(html.len() / 2);
    collect_text(root, &mut raw);

    let text = collapse_whitespace(&raw);
    let length = text.chars().count();
    if length < MIN_CONTENT_CHARS {
        return Err(ExtractError::TooShort { length, minimum: MIN_CONTENT_CHARS });
    }

    Ok(text)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if EXCLUDED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

//! Text helpers over parsed HTML
//!
//! Entity decoding is left to the HTML parser: attribute values and text nodes
//! come out of `scraper` already decoded.

use scraper::ElementRef;

/// Display text of an element: text nodes concatenated, whitespace runs collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Text nodes of an element joined by spaces, so numbers in sibling nodes stay apart
pub fn spaced_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

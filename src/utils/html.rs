//! Visible-text rendering for parsed HTML elements.
//!
//! Approximates what a browser's `innerText` returns: block-level elements
//! and `<br>` start new lines, runs of whitespace collapse to one space, and
//! script/style content is dropped.

use scraper::{ElementRef, Node};

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tr", "ul",
];

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Collapse whitespace runs to single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Non-empty visible lines of an element, in document order.
pub fn rendered_lines(element: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    walk(element, &mut current, &mut lines);
    flush(&mut current, &mut lines);
    lines
}

/// Visible text of an element with lines joined by `\n`.
pub fn rendered_text(element: ElementRef<'_>) -> String {
    rendered_lines(element).join("\n")
}

fn flush(current: &mut String, lines: &mut Vec<String>) {
    let line = collapse_whitespace(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

fn walk(element: ElementRef<'_>, current: &mut String, lines: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    flush(current, lines);
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    flush(current, lines);
                }
                walk(child_el, current, lines);
                if block {
                    flush(current, lines);
                } else {
                    current.push(' ');
                }
            }
            _ => {}
        }
    }
}

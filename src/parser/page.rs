use scraper::{Html, Node};

use super::coords::normalize;

const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template"];
const CONTENT_KEYS: &[&str] = &["name", "itemprop", "property", "id"];

/// What the extraction passes see of one page.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    /// Visible text, one text node per line, glyphs normalized.
    pub text: String,
    /// Raw bodies of `<script>` blocks.
    pub scripts: Vec<String>,
    /// `(label, value)` pairs from attributes naming a destination or origin.
    pub labelled: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Destination,
    Origin,
}

/// Split a page body into visible text, script bodies and labelled attributes.
/// Plain text goes through the same path and comes out as a single text block.
pub fn read_page(body: &str) -> PageText {
    let document = Html::parse_document(body);
    let mut lines: Vec<&str> = Vec::new();
    let mut scripts = Vec::new();
    let mut labelled = Vec::new();

    for node in document.root_element().descendants() {
        match node.value() {
            Node::Text(text) => {
                let text: &str = text;
                let parent = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|e| e.name()));
                match parent {
                    Some("script") => {
                        if !text.trim().is_empty() {
                            scripts.push(text.to_string());
                        }
                    }
                    Some(tag) if HIDDEN_TAGS.contains(&tag) => {}
                    _ => {
                        let line = text.trim();
                        if !line.is_empty() {
                            lines.push(line);
                        }
                    }
                }
            }
            Node::Element(el) => {
                for (name, value) in el.attrs() {
                    if label_of(name).is_some() && is_label_value(value) {
                        labelled.push((name.to_string(), value.trim().to_string()));
                    }
                }
                // <meta name="destination" content="..."> and itemprop variants
                if let Some(content) = el.attr("content") {
                    let key = CONTENT_KEYS
                        .iter()
                        .filter_map(|k| el.attr(k))
                        .find(|v| label_of(v).is_some());
                    if let Some(key) = key {
                        if is_label_value(content) {
                            labelled.push((key.to_string(), content.trim().to_string()));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    PageText {
        text: normalize(&lines.join("\n")),
        scripts,
        labelled,
    }
}

/// Whether an attribute name or value is a destination/origin label.
/// Only the last whole token counts, so `crossorigin`, `data-original-title`
/// and `data-destination-url` don't.
pub fn label_of(key: &str) -> Option<Label> {
    let last = key
        .rsplit(|c: char| !c.is_ascii_alphanumeric())
        .find(|token| !token.is_empty())?;
    match last.to_ascii_lowercase().as_str() {
        "destination" | "dest" => Some(Label::Destination),
        "origin" | "departure" => Some(Label::Origin),
        _ => None,
    }
}

/// Links and anchors are not place names.
fn is_label_value(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !value.starts_with('/')
        && !value.starts_with('#')
        && !value.contains("://")
}

// ── Tests ──

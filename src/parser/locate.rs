use std::sync::LazyLock;

use regex::Regex;

use super::coords::{find_decimal, find_dms, CoordinatePair};
use super::page::PageText;

static LAT_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:lat|latitude)["']?\s*[:=]\s*["']?([+-]?\d{1,3}(?:\.\d+)?)"#).unwrap()
});
static LON_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:lng|lon|long|longitude)["']?\s*[:=]\s*["']?([+-]?\d{1,3}(?:\.\d+)?)"#)
        .unwrap()
});
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:current\s+position\s+is|current\s+position|position\s+is|last\s+known\s+position|coordinates)\b\s*:?",
    )
    .unwrap()
});

/// How far past an anchor phrase the coordinate may start and end.
const ANCHOR_WINDOW: usize = 96;
/// How far apart a lat key and its lon key may sit in a script.
const KEY_WINDOW: usize = 160;

/// One named coordinate strategy. Pure: page text in, validated pair or nothing out.
pub struct Strategy {
    pub name: &'static str,
    pub run: fn(&PageText) -> Option<CoordinatePair>,
}

/// Most specific first. The first strategy to produce a pair wins.
pub const COORD_STRATEGIES: &[Strategy] = &[
    Strategy { name: "script-data", run: script_data },
    Strategy { name: "anchor-dms", run: anchor_dms },
    Strategy { name: "anchor-decimal", run: anchor_decimal },
    Strategy { name: "dms-anywhere", run: dms_anywhere },
    Strategy { name: "decimal-anywhere", run: decimal_anywhere },
];

/// `lat: 40.71, lng: -74.00` style keys inside script blocks. Not a JSON
/// parser: embedded objects are often JS literals, not valid JSON.
fn script_data(page: &PageText) -> Option<CoordinatePair> {
    page.scripts.iter().find_map(|s| key_pair(s))
}

fn key_pair(script: &str) -> Option<CoordinatePair> {
    LAT_KEY_RE.captures_iter(script).find_map(|lat| {
        let whole = lat.get(0)?;
        let latitude: f64 = lat[1].parse().ok()?;

        let after = slice(script, whole.end(), whole.end() + KEY_WINDOW);
        let before = slice(script, whole.start().saturating_sub(KEY_WINDOW), whole.start());
        let lon = LON_KEY_RE
            .captures(after)
            .or_else(|| LON_KEY_RE.captures_iter(before).last())?;
        let longitude: f64 = lon[1].parse().ok()?;

        CoordinatePair::new(latitude, longitude)
    })
}

fn anchor_dms(page: &PageText) -> Option<CoordinatePair> {
    anchor_windows(&page.text).find_map(find_dms)
}

fn anchor_decimal(page: &PageText) -> Option<CoordinatePair> {
    anchor_windows(&page.text).find_map(find_decimal)
}

fn dms_anywhere(page: &PageText) -> Option<CoordinatePair> {
    find_dms(&page.text)
}

fn decimal_anywhere(page: &PageText) -> Option<CoordinatePair> {
    find_decimal(&page.text)
}

/// The bounded stretch of text right after each anchor phrase.
fn anchor_windows(text: &str) -> impl Iterator<Item = &str> {
    ANCHOR_RE
        .find_iter(text)
        .map(move |m| slice(text, m.end(), m.end() + ANCHOR_WINDOW))
}

/// `text[start..end]` clamped to the string and pulled back to char boundaries.
fn slice(text: &str, start: usize, end: usize) -> &str {
    let mut start = start.min(text.len());
    let mut end = end.min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[start..end.max(start)]
}

// ── Tests ──

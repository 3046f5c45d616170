use std::sync::LazyLock;

use regex::Regex;

use super::page::{label_of, Label, PageText};

// Value on the same line, or exactly the next line (table cells).
static DEST_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdestination(?:[ \t]+port)?[ \t]*(?::[ \t]*|\n|-[ \t]+)([^\n,;|()<>]{2,60})").unwrap()
});
// Place names must be capitalized; "data from AIS to users" is not a route.
static ROUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[Ff]rom\s+([A-Z][^\n,;|()<>]{1,39}?)\s+to\s+([A-Z][^\n,;|()<>]{1,39})").unwrap()
});
static UNDERWAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:\b(?:proceeding|heading|sailing|bound|en\s+route|underway))\s+(?i:to|for)\s+([A-Z][^\n,;|()<>]{1,59})",
    )
    .unwrap()
});
static LOCATION_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:location|area)[ \t]*:[ \t]*([^\n,;|()<>]{2,60})").unwrap()
});
// Row labels of a vessel details table. An empty destination cell leaves the
// next row's label directly after "Destination".
static FIELD_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:eta|ata|etd|atd|flag|status|speed|sog|course|cog|heading|draught|draft|imo|mmsi|call\s*sign|destination|location|area|position|origin|departure|vessel\s+type|type|length|beam|gross\s+tonnage|deadweight|year\s+built|last\s+port|next\s+port|navigation\s+status|last\s+update|updated)\b\s*:?\s*$",
    )
    .unwrap()
});
static LABEL_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}][\p{L} ]{0,24}:").unwrap());
static TRAILER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:eta|ata|at|since|on|with|via|arriving|arrival|speed|course)\b.*$").unwrap()
});

static SCRIPT_SPEED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:speed|sog)["']?\s*[:=]\s*["']?(\d+(?:\.\d+)?)"#).unwrap()
});
static TEXT_SPEED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:speed|sog)\b[:\s]+(\d+(?:\.\d+)?)\s*(?:knots?|kn|kts)?").unwrap()
});
static SCRIPT_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:heading|course|cog)["']?\s*[:=]\s*["']?(\d+(?:\.\d+)?)"#).unwrap()
});
static TEXT_HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:heading|course|cog)\b[:\s]+(\d+(?:\.\d+)?)\s*(?:°|deg|degrees)?").unwrap()
});

const MAX_PLACE_LEN: usize = 60;

/// Non-coordinate facts about the voyage. Plain text, not validated beyond
/// basic shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Details {
    pub destination: Option<String>,
    pub origin: Option<String>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
}

pub fn extract(page: &PageText) -> Details {
    let (route_origin, route_destination) = route(&page.text);

    let destination = labelled(page, Label::Destination)
        .or_else(|| label_value(&DEST_LABEL_RE, &page.text))
        .or(route_destination)
        .or_else(|| first_place(&UNDERWAY_RE, &page.text))
        .or_else(|| label_value(&LOCATION_LABEL_RE, &page.text));

    let origin = labelled(page, Label::Origin).or(route_origin);

    let speed = number(&SCRIPT_SPEED_RE, &page.scripts, is_speed)
        .or_else(|| number(&TEXT_SPEED_RE, std::slice::from_ref(&page.text), is_speed));
    let heading = number(&SCRIPT_HEADING_RE, &page.scripts, is_heading)
        .or_else(|| number(&TEXT_HEADING_RE, std::slice::from_ref(&page.text), is_heading));

    Details {
        destination,
        origin,
        speed,
        heading,
    }
}

fn labelled(page: &PageText, label: Label) -> Option<String> {
    page.labelled
        .iter()
        .filter(|(key, _)| label_of(key) == Some(label))
        .find_map(|(_, value)| clean_place(value))
}

fn first_place(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text).find_map(|caps| clean_place(&caps[1]))
}

/// Like `first_place`, but a value that is itself a field label or a
/// `Label: value` pair means the labelled field was empty.
fn label_value(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text).find_map(|caps| {
        let raw = caps[1].trim();
        if FIELD_LABEL_RE.is_match(raw) || LABEL_PAIR_RE.is_match(raw) {
            return None;
        }
        clean_place(raw)
    })
}

/// `from X to Y` gives both ends at once.
fn route(text: &str) -> (Option<String>, Option<String>) {
    ROUTE_RE
        .captures_iter(text)
        .find_map(|caps| {
            let to = clean_place(&caps[2])?;
            Some((clean_place(&caps[1]), Some(to)))
        })
        .unwrap_or((None, None))
}

/// Trim a captured run of text down to something that reads like a place name.
fn clean_place(raw: &str) -> Option<String> {
    let sentence = raw.split(". ").next().unwrap_or(raw);
    let without_trailer = TRAILER_RE.replace(sentence, "");
    let place = without_trailer
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let place = place.trim_matches(|c: char| c == '.' || c == ':' || c == '-' || c.is_whitespace());

    let plausible = !place.is_empty()
        && place.len() <= MAX_PLACE_LEN
        && place.chars().any(char::is_alphabetic)
        && !place.eq_ignore_ascii_case("unknown")
        && !place.eq_ignore_ascii_case("n/a");
    plausible.then(|| place.to_string())
}

fn number(re: &Regex, haystacks: &[String], accept: fn(f64) -> bool) -> Option<f64> {
    haystacks.iter().find_map(|h| {
        re.captures_iter(h)
            .filter_map(|caps| caps[1].parse::<f64>().ok())
            .find(|v| accept(*v))
    })
}

fn is_speed(knots: f64) -> bool {
    (0.0..100.0).contains(&knots)
}

fn is_heading(degrees: f64) -> bool {
    (0.0..=360.0).contains(&degrees)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::page::read_page;

    fn text_page(text: &str) -> PageText {
        PageText {
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn destination_label_same_line() {
        let d = extract(&text_page("Destination: ROTTERDAM, NL\nETA: Oct 20"));
        assert_eq!(d.destination.as_deref(), Some("ROTTERDAM"));
    }

    #[test]
    fn destination_label_next_cell() {
        let page = read_page("<table><tr><td>Destination</td><td>Port of Spain</td></tr></table>");
        assert_eq!(extract(&page).destination.as_deref(), Some("Port of Spain"));
    }

    #[test]
    fn empty_destination_cell_is_not_the_next_label() {
        for next in [
            "<tr><td>ETA</td><td>Oct 20, 08:00</td></tr><tr><td>Status</td><td>Moored</td></tr>",
            "<tr><td>Flag</td><td>Panama</td></tr>",
            "<tr><td>Navigation status</td><td>At anchor</td></tr>",
        ] {
            let page = read_page(&format!(
                "<table><tr><td>Destination</td><td></td></tr>{}</table>",
                next
            ));
            assert_eq!(extract(&page).destination, None, "{}", page.text);
        }
    }

    #[test]
    fn empty_destination_label_does_not_cross_lines() {
        let d = extract(&text_page("Destination:
ETA: Oct 20 08:00
Flag: Panama"));
        assert_eq!(d.destination, None);
        let d = extract(&text_page("Destination:
Status
Moored"));
        assert_eq!(d.destination, None);
    }

    #[test]
    fn empty_location_label_does_not_cross_lines() {
        let d = extract(&text_page("Area:
Speed: 12.0 kn"));
        assert_eq!(d.destination, None);
        assert_eq!(d.speed, Some(12.0));
    }

    #[test]
    fn destination_prose_is_not_a_label() {
        let d = extract(&text_page("The destination of the vessel is not disclosed"));
        assert_eq!(d.destination, None);
    }

    #[test]
    fn proceeding_to() {
        let d = extract(&text_page("The vessel is proceeding to Rotterdam. Built 2005."));
        assert_eq!(d.destination.as_deref(), Some("Rotterdam"));
    }

    #[test]
    fn underway_trailer_trimmed() {
        let d = extract(&text_page("Currently sailing to Zeebrugge ETA Oct 21 08:00"));
        assert_eq!(d.destination.as_deref(), Some("Zeebrugge"));
    }

    #[test]
    fn route_fills_origin_and_destination() {
        let d = extract(&text_page("Car carrier on voyage from Baltimore to Bremerhaven"));
        assert_eq!(d.origin.as_deref(), Some("Baltimore"));
        assert_eq!(d.destination.as_deref(), Some("Bremerhaven"));
    }

    #[test]
    fn lowercase_from_to_is_not_a_route() {
        let d = extract(&text_page("data from satellites to users"));
        assert_eq!(d.destination, None);
        assert_eq!(d.origin, None);
    }

    #[test]
    fn label_beats_route() {
        let d = extract(&text_page("Destination: Antwerp\nRoute from Baltimore to Bremerhaven"));
        assert_eq!(d.destination.as_deref(), Some("Antwerp"));
        assert_eq!(d.origin.as_deref(), Some("Baltimore"));
    }

    #[test]
    fn attribute_label_wins() {
        let page = read_page(r#"<div data-destination="YOKOHAMA">Destination: Tokyo Bay</div>"#);
        assert_eq!(extract(&page).destination.as_deref(), Some("YOKOHAMA"));
    }

    #[test]
    fn link_attribute_does_not_override_visible_label() {
        let page = read_page(
            r#"<a data-destination-url="/ports/rotterdam">Port page</a><p>Destination: Hamburg</p>"#,
        );
        assert_eq!(extract(&page).destination.as_deref(), Some("Hamburg"));
    }

    #[test]
    fn location_label_fallback() {
        let d = extract(&text_page("Area: North Sea\nLocation: off Dover, UK"));
        assert_eq!(d.destination.as_deref(), Some("North Sea"));
    }

    #[test]
    fn unknown_destination_skipped() {
        let d = extract(&text_page("Destination: unknown"));
        assert_eq!(d.destination, None);
    }

    #[test]
    fn speed_and_heading_from_text() {
        let d = extract(&text_page("Speed: 14.2 knots\nCourse 245°"));
        assert_eq!(d.speed, Some(14.2));
        assert_eq!(d.heading, Some(245.0));
    }

    #[test]
    fn script_values_preferred_and_validated() {
        let page = read_page(
            r#"<script>var v = {"speed": 511, "sog": 12.1, "heading": 511, "cog": 87.5};</script>
               <p>Speed: 3.0 kn</p><p>Heading: 10</p>"#,
        );
        let d = extract(&page);
        assert_eq!(d.speed, Some(12.1));
        assert_eq!(d.heading, Some(87.5));
    }

    #[test]
    fn heading_to_is_not_a_heading_value() {
        let d = extract(&text_page("Heading to Rotterdam"));
        assert_eq!(d.heading, None);
        assert_eq!(d.destination.as_deref(), Some("Rotterdam"));
    }

    #[test]
    fn nothing_recognizable() {
        assert_eq!(extract(&text_page("Welcome to our website")), Details::default());
    }
}

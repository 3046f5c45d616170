use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

/// degrees°, optional minutes', optional seconds", optional hemisphere letter.
const DMS_COMPONENT: &str = r#"([+-]?\d{1,3}(?:\.\d+)?)\s*°\s*(?:(\d{1,2}(?:\.\d+)?)\s*'\s*)?(?:(\d{1,2}(?:\.\d+)?)\s*"\s*)?(?:([NSEW])\b)?"#;
const DECIMAL_COMPONENT: &str = r"([+-]?\d{1,3}\.\d+)\s*°?\s*(?:([NSEW])\b)?";

static DMS_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?:^|[^\d.]){DMS_COMPONENT}\s*[,/;]?\s*{DMS_COMPONENT}")).unwrap()
});
static DECIMAL_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:^|[^\w.]){DECIMAL_COMPONENT}\s*[,/;\s]\s*{DECIMAL_COMPONENT}"
    ))
    .unwrap()
});
static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());
static BLANK_LINES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n(?: ?\n)+").unwrap());

const ENTITIES: &[(&str, &str)] = &[
    ("&deg;", "°"),
    ("&#176;", "°"),
    ("&prime;", "'"),
    ("&Prime;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&quot;", "\""),
    ("&nbsp;", " "),
];

/// A latitude/longitude pair that has passed range validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoordinatePair {
    latitude: f64,
    longitude: f64,
}

impl CoordinatePair {
    /// Out-of-range or non-finite values are rejected, never clamped.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Lat,
    Lon,
}

/// Map degree/minute/second glyph variants and common entities onto `° ' "`,
/// collapse horizontal whitespace. Line breaks are kept.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.to_string();
    for (entity, glyph) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, glyph);
        }
    }

    let mapped: String = text
        .chars()
        .map(|c| match c {
            'º' | '˚' | '∘' => '°',
            '′' | '’' | '‘' | '´' | '`' | 'ʹ' => '\'',
            '″' | '“' | '”' | 'ʺ' | '〃' => '"',
            '−' | '–' | '—' => '-',
            '\r' => '\n',
            c => c,
        })
        .collect();

    let mapped = mapped.replace("''", "\"");
    let collapsed = HSPACE_RE.replace_all(&mapped, " ");
    BLANK_LINES_RE.replace_all(&collapsed, "\n").trim().to_string()
}

/// Parse one coordinate-bearing candidate. DMS is tried before decimal.
pub fn parse_coordinates(candidate: &str) -> Option<CoordinatePair> {
    let text = normalize(candidate);
    find_dms(&text).or_else(|| find_decimal(&text))
}

/// First valid DMS pair in already-normalized text.
pub fn find_dms(text: &str) -> Option<CoordinatePair> {
    DMS_PAIR_RE.captures_iter(text).find_map(|caps| {
        let first = dms_component(&caps, 1)?;
        let second = dms_component(&caps, 5)?;
        assemble(first, second)
    })
}

/// First valid decimal-degree pair in already-normalized text.
pub fn find_decimal(text: &str) -> Option<CoordinatePair> {
    DECIMAL_PAIR_RE.captures_iter(text).find_map(|caps| {
        let first = decimal_component(&caps, 1)?;
        let second = decimal_component(&caps, 3)?;
        assemble(first, second)
    })
}

fn dms_component(caps: &Captures, at: usize) -> Option<(f64, Option<char>)> {
    let degrees_raw = caps.get(at)?.as_str();
    let minutes_raw = caps.get(at + 1).map(|m| m.as_str());
    let seconds_raw = caps.get(at + 2).map(|m| m.as_str());
    let hemisphere = caps.get(at + 3).and_then(|m| m.as_str().chars().next());

    let fractional_degrees = degrees_raw.contains('.');
    // A bare "25°" is more often a temperature or an angle than a coordinate.
    if minutes_raw.is_none() && hemisphere.is_none() && !fractional_degrees {
        return None;
    }
    if fractional_degrees && (minutes_raw.is_some() || seconds_raw.is_some()) {
        return None;
    }

    let degrees: f64 = degrees_raw.parse().ok()?;
    let minutes = match minutes_raw {
        Some(m) => m.parse::<f64>().ok().filter(|m| *m < 60.0)?,
        None => 0.0,
    };
    let seconds = match seconds_raw {
        Some(s) => s.parse::<f64>().ok().filter(|s| *s < 60.0)?,
        None => 0.0,
    };

    let magnitude = degrees.abs() + minutes / 60.0 + seconds / 3600.0;
    Some((apply_sign(magnitude, degrees_raw, hemisphere), hemisphere))
}

fn decimal_component(caps: &Captures, at: usize) -> Option<(f64, Option<char>)> {
    let raw = caps.get(at)?.as_str();
    let hemisphere = caps.get(at + 1).and_then(|m| m.as_str().chars().next());
    let value: f64 = raw.parse().ok()?;
    Some((apply_sign(value.abs(), raw, hemisphere), hemisphere))
}

/// Hemisphere letters win over an explicit sign.
fn apply_sign(magnitude: f64, raw: &str, hemisphere: Option<char>) -> f64 {
    match hemisphere {
        Some('S') | Some('W') => -magnitude,
        Some(_) => magnitude,
        None if raw.starts_with('-') => -magnitude,
        None => magnitude,
    }
}

fn axis(hemisphere: char) -> Axis {
    match hemisphere {
        'N' | 'S' => Axis::Lat,
        _ => Axis::Lon,
    }
}

/// Order the two components as (lat, lon), honoring hemisphere letters when
/// they say the longitude came first.
fn assemble(
    (a, ha): (f64, Option<char>),
    (b, hb): (f64, Option<char>),
) -> Option<CoordinatePair> {
    let (lat, lon) = match (ha.map(axis), hb.map(axis)) {
        (Some(x), Some(y)) if x == y => return None,
        (Some(Axis::Lon), _) | (_, Some(Axis::Lat)) => (b, a),
        _ => (a, b),
    };
    CoordinatePair::new(lat, lon)
}

// ── Formatting ──

pub fn format_decimal(pair: &CoordinatePair) -> String {
    format!("{:.6}, {:.6}", pair.latitude, pair.longitude)
}

/// `40°42'46.08"N, 74°0'21.60"W`
pub fn format_dms(pair: &CoordinatePair) -> String {
    format!(
        "{}, {}",
        dms_part(pair.latitude, 'N', 'S'),
        dms_part(pair.longitude, 'E', 'W')
    )
}

/// `40°42'46.08", -74°0'21.60"`
pub fn format_dms_signed(pair: &CoordinatePair) -> String {
    format!(
        "{}, {}",
        signed_dms_part(pair.latitude),
        signed_dms_part(pair.longitude)
    )
}

fn dms_part(value: f64, positive: char, negative: char) -> String {
    let (d, m, s) = split_dms(value);
    let hemisphere = if value < 0.0 { negative } else { positive };
    format!("{d}°{m}'{s:.2}\"{hemisphere}")
}

fn signed_dms_part(value: f64) -> String {
    let (d, m, s) = split_dms(value);
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{d}°{m}'{s:.2}\"")
}

/// Split into whole degrees, whole minutes and seconds rounded to hundredths,
/// carrying so that seconds never print as 60.
fn split_dms(value: f64) -> (u64, u64, f64) {
    let hundredths = (value.abs() * 360_000.0).round() as u64;
    let degrees = hundredths / 360_000;
    let minutes = (hundredths % 360_000) / 6_000;
    let seconds = (hundredths % 6_000) as f64 / 100.0;
    (degrees, minutes, seconds)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-5;

    fn close(pair: CoordinatePair, lat: f64, lon: f64, tol: f64) -> bool {
        (pair.latitude() - lat).abs() < tol && (pair.longitude() - lon).abs() < tol
    }

    #[test]
    fn dms_with_hemispheres() {
        let p = parse_coordinates(r#"40°42'46"N, 74°00'21"W"#).unwrap();
        assert!(close(p, 40.7128, -74.0058, 0.001));
    }

    #[test]
    fn dms_with_spacing_and_slash() {
        let p = parse_coordinates(r#"40° 42' 46" N / 74° 00' 21" W"#).unwrap();
        assert!(close(p, 40.712777, -74.005833, TOLERANCE));
    }

    #[test]
    fn dms_unicode_glyphs() {
        let p = parse_coordinates("51º55′21″N, 4º28′45″E").unwrap();
        assert!(close(p, 51.9225, 4.479166, TOLERANCE));
    }

    #[test]
    fn dms_from_html_entities() {
        let p = parse_coordinates("33&deg;51&#39;54&quot;S 151&deg;12&#39;34&quot;E").unwrap();
        assert!(close(p, -33.865, 151.209444, TOLERANCE));
    }

    #[test]
    fn dms_longitude_first_is_reordered() {
        let p = parse_coordinates(r#"74°00'21"W, 40°42'46"N"#).unwrap();
        assert!(close(p, 40.712777, -74.005833, TOLERANCE));
    }

    #[test]
    fn dms_same_axis_twice_rejected() {
        assert!(parse_coordinates(r#"40°42'46"N, 41°00'00"N"#).is_none());
    }

    #[test]
    fn dms_minutes_out_of_range_rejected() {
        assert!(find_dms(r#"40°75'46"N, 74°00'21"W"#).is_none());
    }

    #[test]
    fn dms_seconds_out_of_range_rejected() {
        assert!(find_dms(r#"40°42'61"N, 74°00'21"W"#).is_none());
    }

    #[test]
    fn bare_degree_numbers_are_not_coordinates() {
        assert!(parse_coordinates("Air 25°, water 18°").is_none());
    }

    #[test]
    fn decimal_degrees_with_minutes_only() {
        let p = parse_coordinates("12°30.5'S 045°15.25'E").unwrap();
        assert!(close(p, -12.508333, 45.254166, TOLERANCE));
    }

    #[test]
    fn decimal_pair_signed() {
        let p = parse_coordinates("40.7128, -74.0060").unwrap();
        assert!(close(p, 40.7128, -74.006, TOLERANCE));
    }

    #[test]
    fn decimal_pair_whitespace_and_hemispheres() {
        let p = parse_coordinates("51.9225 N 4.47917 E").unwrap();
        assert!(close(p, 51.9225, 4.47917, TOLERANCE));
    }

    #[test]
    fn hemisphere_overrides_sign() {
        let p = parse_coordinates("-33.865 N, 151.2094 W").unwrap();
        assert!(close(p, 33.865, -151.2094, TOLERANCE));
    }

    #[test]
    fn hemisphere_overrides_sign_in_dms() {
        let p = parse_coordinates(r#"-40°42'46"N, 74°00'21"W"#).unwrap();
        assert!(close(p, 40.7128, -74.0058, 1e-4));
        let p = parse_coordinates(r#"33°51'54"S, -151°12'34"E"#).unwrap();
        assert!(close(p, -33.865, 151.2094, 1e-3));
    }

    #[test]
    fn dms_wins_over_decimal_in_same_candidate() {
        // Decimal grammar alone would read 12.5, 13.5.
        let p = parse_coordinates(r#"12.5, 13.5 at 10°30'00"S, 20°15'00"E"#).unwrap();
        assert!(close(p, -10.5, 20.25, TOLERANCE));
    }

    #[test]
    fn out_of_range_latitude_rejected_not_clamped() {
        assert!(parse_coordinates("200.0, 10.0").is_none());
        assert!(parse_coordinates("10.0, 181.5").is_none());
        assert!(CoordinatePair::new(90.0001, 0.0).is_none());
        assert!(CoordinatePair::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn nothing_to_find() {
        assert!(parse_coordinates("").is_none());
        assert!(parse_coordinates("no numbers here").is_none());
        assert!(parse_coordinates("IMO 9283887, MMSI 311000123").is_none());
    }

    #[test]
    fn decimal_round_trip() {
        let samples = [
            (40.7128, -74.006),
            (-33.865143, 151.2099),
            (90.0, 180.0),
            (-90.0, -180.0),
            (0.0, 0.0),
            (51.9225, 4.47917),
        ];
        for (lat, lon) in samples {
            let pair = CoordinatePair::new(lat, lon).unwrap();
            let back = parse_coordinates(&format_decimal(&pair)).unwrap();
            assert!(close(back, lat, lon, TOLERANCE), "{lat}, {lon}");
        }
    }

    #[test]
    fn dms_round_trip_both_notations() {
        let samples = [
            (40.712777, -74.005833),
            (-33.865143, 151.2099),
            (89.999999, -179.999999),
            (-0.000833, 0.000833),
            (0.0, 0.0),
            (59.999999, 10.999999),
        ];
        for (lat, lon) in samples {
            let pair = CoordinatePair::new(lat, lon).unwrap();
            let lettered = parse_coordinates(&format_dms(&pair)).unwrap();
            let signed = parse_coordinates(&format_dms_signed(&pair)).unwrap();
            assert!(close(lettered, lat, lon, TOLERANCE), "{}", format_dms(&pair));
            assert!(close(signed, lat, lon, TOLERANCE), "{}", format_dms_signed(&pair));
        }
    }

    #[test]
    fn seconds_carry_instead_of_printing_sixty() {
        let pair = CoordinatePair::new(10.999999, 20.0).unwrap();
        assert_eq!(format_dms(&pair), "11°0'0.00\"N, 20°0'0.00\"E");
    }

    #[test]
    fn normalize_keeps_line_breaks() {
        assert_eq!(normalize("a \t b\r\n\n\nc"), "a b\nc");
    }
}

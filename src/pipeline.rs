use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::LocationRecord;
use crate::fetch::{FetchError, PageFetcher, RawPage};
use crate::geocode::GeocodeFallback;
use crate::parser;
use crate::parser::coords::CoordinatePair;

/// The only hard failure: the page could not be fetched. Everything after
/// that degrades to a record with empty fields.
#[derive(Debug, Error)]
pub enum ExtractionFailure {
    #[error("could not fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
}

/// Fetch → coordinate search → text search → geocode if needed → record.
/// Holds no state between calls apart from the geocoder's rate limit.
pub struct Tracker {
    fetcher: Box<dyn PageFetcher + Send + Sync>,
    geocoder: GeocodeFallback,
    page_url: String,
}

impl Tracker {
    /// `page_url` is a template; `{ship}` is replaced by the ship identifier.
    pub fn new(
        fetcher: Box<dyn PageFetcher + Send + Sync>,
        geocoder: GeocodeFallback,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            geocoder,
            page_url: page_url.into(),
        }
    }

    pub fn page_url(&self, ship: &str) -> String {
        self.page_url.replace("{ship}", ship)
    }

    pub fn scrape(&self, ship: &str) -> Result<LocationRecord, ExtractionFailure> {
        let url = self.page_url(ship);
        info!(ship, url = %url, "Fetching vessel page");

        let page = match self.fetcher.fetch(&url) {
            Ok(page) => page,
            Err(source) => {
                warn!(url = %url, error = %source, "Fetch failed");
                return Err(ExtractionFailure::Fetch { url, source });
            }
        };
        debug!(url = %page.url, bytes = page.body.len(), fetched_at = %page.fetched_at, "Page fetched");

        Ok(extract(&page, &self.geocoder))
    }
}

/// Run every extraction pass over one fetched page. Never fails.
pub fn extract(page: &RawPage, geocoder: &GeocodeFallback) -> LocationRecord {
    let findings = parser::process_page(&page.body);
    for strategy in &findings.missed {
        debug!(strategy, "No coordinates from strategy");
    }
    let details = findings.details;

    let coordinates = match findings.coordinates {
        Some((method, pair)) => {
            info!(method, lat = pair.latitude(), lon = pair.longitude(), "Coordinates found");
            Some((method, pair))
        }
        None => details
            .destination
            .as_deref()
            .and_then(|place| geocode(geocoder, place))
            .map(|pair| ("geocode", pair)),
    };

    if coordinates.is_none() && details.destination.is_none() {
        info!(url = %page.url, "No recognizable position data on page");
    }

    LocationRecord {
        latitude: coordinates.map(|(_, p)| p.latitude()),
        longitude: coordinates.map(|(_, p)| p.longitude()),
        location_text: details.destination,
        origin_text: details.origin,
        speed: details.speed,
        heading: details.heading,
        method: coordinates.map(|(m, _)| m.to_string()),
        extracted_at: Utc::now(),
    }
}

fn geocode(geocoder: &GeocodeFallback, place: &str) -> Option<CoordinatePair> {
    info!(place, "No coordinates on page, geocoding destination");
    match geocoder.resolve(place) {
        Ok(Some(pair)) => {
            info!(place, lat = pair.latitude(), lon = pair.longitude(), "Geocoded destination");
            Some(pair)
        }
        Ok(None) => {
            warn!(place, "Geocoder found no match");
            None
        }
        Err(e) => {
            warn!(place, error = %e, "Geocoding failed");
            None
        }
    }
}

// ── Tests ──

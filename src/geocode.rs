use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::parser::coords::CoordinatePair;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoder answer not understood: {0}")]
    Decode(String),
}

/// Free-text place name → approximate coordinates. `Ok(None)` means the
/// service answered but knew no such place.
pub trait Geocoder {
    fn geocode(&self, query: &str) -> Result<Option<CoordinatePair>, GeocodeError>;
}

/// OpenStreetMap Nominatim search API.
pub struct Nominatim {
    client: Client,
    base_url: String,
}

impl Nominatim {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Geocoder for Nominatim {
    fn geocode(&self, query: &str) -> Result<Option<CoordinatePair>, GeocodeError> {
        let body = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "jsonv2"), ("limit", "1")])
            .send()?
            .error_for_status()?
            .text()?;
        first_place(&body)
    }
}

#[derive(Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Nominatim returns coordinates as strings inside a JSON array.
fn first_place(body: &str) -> Result<Option<CoordinatePair>, GeocodeError> {
    let places: Vec<Place> =
        serde_json::from_str(body).map_err(|e| GeocodeError::Decode(e.to_string()))?;
    let Some(place) = places.into_iter().next() else {
        return Ok(None);
    };
    let lat = place
        .lat
        .parse::<f64>()
        .map_err(|_| GeocodeError::Decode(format!("latitude {:?}", place.lat)))?;
    let lon = place
        .lon
        .parse::<f64>()
        .map_err(|_| GeocodeError::Decode(format!("longitude {:?}", place.lon)))?;
    Ok(CoordinatePair::new(lat, lon))
}

/// Never looks anything up. Used when extraction must stay off the network.
pub struct Offline;

impl Geocoder for Offline {
    fn geocode(&self, _query: &str) -> Result<Option<CoordinatePair>, GeocodeError> {
        Ok(None)
    }
}

/// Serializes lookups and keeps at least `min_delay` between them,
/// including before the first one.
pub struct GeocodeFallback {
    geocoder: Box<dyn Geocoder + Send + Sync>,
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl GeocodeFallback {
    pub fn new(geocoder: Box<dyn Geocoder + Send + Sync>, min_delay: Duration) -> Self {
        Self {
            geocoder,
            min_delay,
            last_call: Mutex::new(None),
        }
    }

    pub fn offline() -> Self {
        Self::new(Box::new(Offline), Duration::ZERO)
    }

    pub fn resolve(&self, place: &str) -> Result<Option<CoordinatePair>, GeocodeError> {
        let mut last_call = self.last_call.lock().unwrap_or_else(PoisonError::into_inner);
        let wait = match *last_call {
            Some(at) => self.min_delay.saturating_sub(at.elapsed()),
            None => self.min_delay,
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        let result = self.geocoder.geocode(place);
        *last_call = Some(Instant::now());
        result
    }
}

// ── Tests ──

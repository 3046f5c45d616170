use std::time::Duration;

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "ship_tracker";
const MIN_INTERVAL_SECS: u64 = 60;

/// Defaults < `ship_tracker.toml` < `SHIP_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Identifier substituted into `page_url`.
    pub vessel: String,
    /// Name the rows are stored under.
    pub ship_name: String,
    pub page_url: String,
    pub db_path: String,
    pub user_agent: String,
    pub fetch_timeout_secs: u64,
    pub geocoder_url: String,
    pub geocode_timeout_secs: u64,
    pub geocode_delay_ms: u64,
    pub interval_secs: u64,
}

impl Settings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_secs(self.geocode_timeout_secs)
    }

    pub fn geocode_delay(&self) -> Duration {
        Duration::from_millis(self.geocode_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(MIN_INTERVAL_SECS))
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(Config::builder()
        .set_default("vessel", "9283887-sagittarius-leader")?
        .set_default("ship_name", "Sagittarius Leader")?
        .set_default("page_url", "https://shipnext.com/vessel/{ship}")?
        .set_default("db_path", "data/ship_locations.sqlite")?
        .set_default(
            "user_agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
        )?
        .set_default("fetch_timeout_secs", 30)?
        .set_default("geocoder_url", "https://nominatim.openstreetmap.org")?
        .set_default("geocode_timeout_secs", 10)?
        .set_default("geocode_delay_ms", 1000)?
        .set_default("interval_secs", 6 * 60 * 60)?)
}

pub fn load() -> Result<Settings> {
    defaults()?
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(Environment::with_prefix("SHIP").try_parsing(true))
        .build()
        .context("Failed to load settings")?
        .try_deserialize()
        .context("Invalid settings")
}

// ── Tests ──

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

/// One extraction result. Built once by the pipeline, never mutated, and
/// stored as a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationRecord {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_text: Option<String>,
    pub origin_text: Option<String>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    /// Strategy that produced the coordinates, or `geocode`.
    pub method: Option<String>,
    pub extracted_at: DateTime<Utc>,
}

impl LocationRecord {
    /// True when the source page was reachable but nothing on it was recognized.
    pub fn is_empty(&self) -> bool {
        self.latitude.is_none()
            && self.longitude.is_none()
            && self.location_text.is_none()
            && self.origin_text.is_none()
            && self.speed.is_none()
            && self.heading.is_none()
    }

    /// Worth a row: coordinates or a destination.
    pub fn is_storable(&self) -> bool {
        self.latitude.is_some() || self.location_text.is_some()
    }
}

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS ship_locations (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            ship_name     TEXT NOT NULL,
            latitude      REAL,
            longitude     REAL,
            timestamp     TEXT NOT NULL,
            location_text TEXT,
            origin_text   TEXT,
            speed         REAL,
            heading       REAL,
            method        TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_locations_ship_time ON ship_locations(ship_name, timestamp);
        ",
    )?;
    Ok(())
}

/// Append one record. Rows are never updated.
pub fn insert_location(conn: &Connection, ship_name: &str, record: &LocationRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO ship_locations
            (ship_name, latitude, longitude, timestamp, location_text, origin_text, speed, heading, method)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            ship_name,
            record.latitude,
            record.longitude,
            record.extracted_at,
            record.location_text,
            record.origin_text,
            record.speed,
            record.heading,
            record.method,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const SELECT_COLUMNS: &str =
    "SELECT latitude, longitude, timestamp, location_text, origin_text, speed, heading, method
     FROM ship_locations WHERE ship_name = ?1";

pub fn fetch_latest(conn: &Connection, ship_name: &str) -> Result<Option<LocationRecord>> {
    let sql = format!("{} ORDER BY timestamp DESC, id DESC LIMIT 1", SELECT_COLUMNS);
    let record = conn
        .query_row(&sql, [ship_name], read_record)
        .optional()?;
    Ok(record)
}

/// Newest first.
pub fn fetch_history(conn: &Connection, ship_name: &str, limit: usize) -> Result<Vec<LocationRecord>> {
    let sql = format!(
        "{} ORDER BY timestamp DESC, id DESC LIMIT {}",
        SELECT_COLUMNS, limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([ship_name], read_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_record(row: &Row) -> rusqlite::Result<LocationRecord> {
    Ok(LocationRecord {
        latitude: row.get(0)?,
        longitude: row.get(1)?,
        extracted_at: row.get(2)?,
        location_text: row.get(3)?,
        origin_text: row.get(4)?,
        speed: row.get(5)?,
        heading: row.get(6)?,
        method: row.get(7)?,
    })
}

// ── Tests ──

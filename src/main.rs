mod db;
mod fetch;
mod geocode;
mod parser;
mod pipeline;
mod settings;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use db::LocationRecord;
use fetch::{HttpFetcher, RawPage};
use geocode::{GeocodeFallback, Nominatim};
use parser::coords::{format_decimal, format_dms, format_dms_signed, CoordinatePair};
use pipeline::Tracker;
use settings::Settings;

const GEOCODER_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Parser)]
#[command(name = "ship_tracker", about = "Track one cargo vessel from its public tracking page")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the vessel page once, extract a position and store it
    Scrape {
        /// Vessel identifier substituted into the page URL (default: from settings)
        #[arg(short, long)]
        vessel: Option<String>,
        /// Print the record without storing it
        #[arg(long)]
        dry_run: bool,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run extraction on a saved HTML or text file instead of fetching
    Parse {
        file: PathBuf,
        /// Skip the geocoding fallback
        #[arg(long)]
        offline: bool,
        #[arg(long)]
        json: bool,
    },
    /// Scrape now, then again every `interval_secs` until Ctrl-C
    Watch,
    /// Show the newest stored position
    Latest {
        #[arg(long)]
        json: bool,
    },
    /// Stored positions, newest first
    History {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "30")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = settings::load()?;

    let result = match cli.command {
        Commands::Scrape {
            vessel,
            dry_run,
            json,
        } => {
            let vessel = vessel.unwrap_or_else(|| settings.vessel.clone());
            let pb = spinner(format!("Scraping {}...", vessel))?;
            let record = scrape_once(&settings, vessel).await;
            pb.finish_and_clear();
            let record = record?;

            print_record(&record, json)?;
            if dry_run {
                println!("\nDry run: nothing stored.");
            } else {
                match store(&settings, &record)? {
                    Some(id) => println!("\nStored as row {}.", id),
                    None => println!("\nNo coordinates or destination found; nothing stored."),
                }
            }
            Ok(())
        }
        Commands::Parse {
            file,
            offline,
            json,
        } => {
            let body = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let page = RawPage::new(format!("file://{}", file.display()), body);
            let settings = settings.clone();
            let record = tokio::task::spawn_blocking(move || -> Result<LocationRecord> {
                let geocoder = if offline {
                    GeocodeFallback::offline()
                } else {
                    geocode_fallback(&settings)?
                };
                Ok(pipeline::extract(&page, &geocoder))
            })
            .await??;
            print_record(&record, json)
        }
        Commands::Watch => watch(settings).await,
        Commands::Latest { json } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            match db::fetch_latest(&conn, &settings.ship_name)? {
                Some(record) => print_record(&record, json),
                None => {
                    println!("No location stored yet. Run 'scrape' first.");
                    Ok(())
                }
            }
        }
        Commands::History { limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_history(&conn, &settings.ship_name, limit)?;
            if rows.is_empty() {
                println!("No location stored yet. Run 'scrape' first.");
                return Ok(());
            }
            print_history(&rows);
            println!("\n{} rows | {}", rows.len(), settings.ship_name);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_tracker(settings: &Settings) -> Result<Tracker> {
    let fetcher = HttpFetcher::new(&settings.user_agent, settings.fetch_timeout())?;
    Ok(Tracker::new(
        Box::new(fetcher),
        geocode_fallback(settings)?,
        settings.page_url.clone(),
    ))
}

fn geocode_fallback(settings: &Settings) -> Result<GeocodeFallback> {
    let nominatim = Nominatim::new(
        &settings.geocoder_url,
        GEOCODER_USER_AGENT,
        settings.geocode_timeout(),
    )?;
    Ok(GeocodeFallback::new(
        Box::new(nominatim),
        settings.geocode_delay(),
    ))
}

/// Blocking HTTP clients are built, used and dropped on a blocking thread,
/// never on the async runtime.
async fn scrape_once(settings: &Settings, vessel: String) -> Result<LocationRecord> {
    let settings = settings.clone();
    tokio::task::spawn_blocking(move || -> Result<LocationRecord> {
        let tracker = build_tracker(&settings)?;
        Ok(tracker.scrape(&vessel)?)
    })
    .await?
}

/// Append the record unless it carries neither coordinates nor a destination.
fn store(settings: &Settings, record: &LocationRecord) -> Result<Option<i64>> {
    if record.is_empty() {
        warn!("Nothing recognizable on the page, record not stored");
        return Ok(None);
    }
    if !record.is_storable() {
        warn!(speed = ?record.speed, heading = ?record.heading, "No coordinates or destination, record not stored");
        return Ok(None);
    }
    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;
    let id = db::insert_location(&conn, &settings.ship_name, record)?;
    info!(id, ship = %settings.ship_name, "Location stored");
    Ok(Some(id))
}

// ── Scheduler ──

/// The schedule runs in one spawned task owned here; Ctrl-C aborts it.
async fn watch(settings: Settings) -> Result<()> {
    println!(
        "Watching {} every {} (Ctrl-C to stop)",
        settings.vessel,
        format_duration(settings.interval())
    );
    let mut schedule = tokio::spawn(run_schedule(settings));

    tokio::select! {
        joined = &mut schedule => joined?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Stopping scheduler");
            schedule.abort();
            Ok(())
        }
    }
}

async fn run_schedule(settings: Settings) -> Result<()> {
    let period = settings.interval();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // First tick fires immediately.
        ticker.tick().await;
        let started = Instant::now();

        match scrape_once(&settings, settings.vessel.clone()).await {
            Ok(record) => {
                info!(
                    lat = ?record.latitude,
                    lon = ?record.longitude,
                    destination = ?record.location_text,
                    speed = ?record.speed,
                    heading = ?record.heading,
                    method = ?record.method,
                    "Update complete"
                );
                if let Err(e) = store(&settings, &record) {
                    warn!(error = %e, "Failed to store location");
                }
            }
            Err(e) => warn!(error = %e, "Update failed"),
        }

        info!(
            took = %format_duration(started.elapsed()),
            next_in = %format_duration(period),
            "Next update scheduled"
        );
    }
}

// ── Output ──

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

fn print_record(record: &LocationRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    match position(record) {
        Some(p) => {
            println!("Position:    {}", format_dms(&p));
            println!("             {}", format_dms_signed(&p));
            println!("             {}", format_decimal(&p));
        }
        None => println!("Position:    -"),
    }
    println!("Method:      {}", record.method.as_deref().unwrap_or("-"));
    println!("Destination: {}", record.location_text.as_deref().unwrap_or("-"));
    println!("Origin:      {}", record.origin_text.as_deref().unwrap_or("-"));
    println!(
        "Speed:       {}",
        record.speed.map(|s| format!("{:.1} kn", s)).unwrap_or_else(|| "-".into())
    );
    println!(
        "Heading:     {}",
        record.heading.map(|h| format!("{:.0}°", h)).unwrap_or_else(|| "-".into())
    );
    println!("Extracted:   {}", record.extracted_at.format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

fn print_history(rows: &[LocationRecord]) {
    println!(
        "{:>3} | {:<19} | {:>10} | {:>11} | {:<24} | {:>6} | {:>4}",
        "#", "Time (UTC)", "Lat", "Lon", "Destination", "Speed", "Hdg"
    );
    println!("{}", "-".repeat(96));

    for (i, r) in rows.iter().enumerate() {
        let lat = r.latitude.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".into());
        let lon = r.longitude.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".into());
        let dest = truncate(r.location_text.as_deref().unwrap_or("-"), 24);
        let speed = r.speed.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".into());
        let heading = r.heading.map(|v| format!("{:.0}", v)).unwrap_or_else(|| "-".into());

        println!(
            "{:>3} | {:<19} | {:>10} | {:>11} | {:<24} | {:>6} | {:>4}",
            i + 1,
            r.extracted_at.format("%Y-%m-%d %H:%M:%S"),
            lat,
            lon,
            dest,
            speed,
            heading
        );
    }
}

fn position(record: &LocationRecord) -> Option<CoordinatePair> {
    let (lat, lon) = record.latitude.zip(record.longitude)?;
    CoordinatePair::new(lat, lon)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

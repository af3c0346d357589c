mod config;
mod elements;
mod fetch;
mod frames;
mod hub;
mod passes;
mod propagate;
mod query;
#[cfg(test)]
mod test_fixtures;

use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::oneshot;

use crate::config::Config;
use crate::elements::{CacheDir, ElementStore};
use crate::fetch::{HttpSource, SourceFetcher};
use crate::frames::{Frame, Observer};
use crate::hub::BroadcastHub;
use crate::query::Query;

#[derive(Parser)]
#[command(name = "satwatch")]
#[command(about = "Satellite tracking, pass prediction and state streaming")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "satwatch.yaml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh element sets for one collection, or every stale one
    Fetch { collection: Option<String> },
    /// Print the state of a satellite at an instant
    State {
        norad_id: u32,
        /// Output frame (teme, ecef, geodetic, enu, ned)
        #[arg(long, default_value = "geodetic")]
        frame: Frame,
        /// Observer coordinates as "lat, lon", required for enu/ned
        #[arg(long)]
        observer: Option<String>,
        /// RFC 3339 instant, defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Predict passes of a satellite over an observer
    Passes {
        norad_id: u32,
        /// Observer coordinates as "lat, lon"
        #[arg(long)]
        observer: String,
        /// Prediction window length in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
        /// Minimum culmination elevation, overriding the configured value
        #[arg(long)]
        min_elevation: Option<f64>,
    },
    /// Stream live states for a set of satellites until interrupted
    Stream {
        /// Catalog numbers to track
        #[arg(required = true)]
        norad_ids: Vec<u32>,
        /// Observer coordinates as "lat, lon" for local look angles
        #[arg(long)]
        observer: Option<String>,
    },
}

struct App {
    config: Config,
    store: Arc<ElementStore>,
    fetcher: Arc<SourceFetcher>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let app = match setup(&cli.config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Fetch { collection } => fetch_cmd(&app, collection.as_deref()),
        Commands::State {
            norad_id,
            frame,
            observer,
            at,
        } => state_cmd(&app, norad_id, frame, observer.as_deref(), at.as_deref()),
        Commands::Passes {
            norad_id,
            observer,
            hours,
            min_elevation,
        } => passes_cmd(&app, norad_id, &observer, hours, min_elevation),
        Commands::Stream {
            norad_ids,
            observer,
        } => stream_cmd(app, norad_ids, observer.as_deref()),
    }
}

fn setup(config_path: &str) -> Result<App, String> {
    let config = Config::from_file(config_path)
        .map_err(|e| format!("cannot load {}: {}", config_path, e))?;

    let store = Arc::new(ElementStore::new(Duration::hours(1)));
    let mut groups = std::collections::HashMap::new();
    for collection in &config.collections {
        let max_age = Duration::from_std(collection.staleness)
            .map_err(|e| format!("staleness for {} out of range: {}", collection.name, e))?;
        store.create_collection(&collection.name, max_age);
        if let Some(group) = &collection.group {
            groups.insert(collection.name.clone(), group.clone());
        }
    }

    let cache = CacheDir::new(config.cache.dir.clone());
    match cache.load_all(&store) {
        Ok(loaded) => log::info!("Loaded {} cached collections", loaded),
        Err(e) => log::warn!("Cache load failed, starting empty: {}", e),
    }

    let source = HttpSource::new(config.fetch.request_timeout)
        .map_err(|e| format!("cannot build HTTP client: {}", e))?;
    let fetcher = Arc::new(SourceFetcher::new(
        store.clone(),
        cache,
        Arc::new(source),
        config.fetch.base_url.clone(),
        groups,
        config.fetch.max_attempts,
        config.fetch.retry_delay,
    ));

    Ok(App {
        config,
        store,
        fetcher,
    })
}

fn fetch_cmd(app: &App, collection: Option<&str>) -> ExitCode {
    let names: Vec<String> = match collection {
        Some(name) => vec![name.to_string()],
        None => app
            .config
            .collections
            .iter()
            .filter(|c| c.group.is_some())
            .map(|c| c.name.clone())
            .collect(),
    };

    let mut failures = 0;
    for name in &names {
        match app.fetcher.refresh(name) {
            Ok(0) => println!("{}: still fresh", name),
            Ok(count) => println!("{}: {} element sets", name, count),
            Err(e) => {
                eprintln!("{}: {}", name, e);
                failures += 1;
            }
        }
    }

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn state_cmd(
    app: &App,
    norad_id: u32,
    frame: Frame,
    observer: Option<&str>,
    at: Option<&str>,
) -> ExitCode {
    let at = match parse_instant(at) {
        Ok(at) => at,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let observer = match observer {
        Some(coordinates) => match parse_observer(app, coordinates, None) {
            Ok(observer) => Some(observer),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    if let Err(e) = app.fetcher.lookup(norad_id) {
        eprintln!("Error resolving satellite {}: {}", norad_id, e);
        return ExitCode::FAILURE;
    }

    let query = Query::new(app.store.clone());
    match query.get_state(norad_id, at, frame, observer) {
        Ok(state) => {
            print_json(&state);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn passes_cmd(
    app: &App,
    norad_id: u32,
    observer: &str,
    hours: i64,
    min_elevation: Option<f64>,
) -> ExitCode {
    let observer = match parse_observer(app, observer, min_elevation) {
        Ok(observer) => observer,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = app.fetcher.lookup(norad_id) {
        eprintln!("Error resolving satellite {}: {}", norad_id, e);
        return ExitCode::FAILURE;
    }

    let start = Utc::now();
    let end = start + Duration::hours(hours);
    let step = match Duration::from_std(app.config.predict.sample_step) {
        Ok(step) => step,
        Err(e) => {
            eprintln!("Error: sample step out of range: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let query = Query::new(app.store.clone());
    match query.get_passes(norad_id, observer, start, end, step) {
        Ok(events) => {
            print_json(&events);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn stream_cmd(app: App, norad_ids: Vec<u32>, observer: Option<&str>) -> ExitCode {
    let observer = match observer {
        Some(coordinates) => match parse_observer(&app, coordinates, None) {
            Ok(observer) => Some(observer),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    // resolve every id up front so misses fail loudly
    for norad_id in &norad_ids {
        if let Err(e) = app.fetcher.lookup(*norad_id) {
            eprintln!("Error resolving satellite {}: {}", norad_id, e);
            return ExitCode::FAILURE;
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async move {
        let hub = Arc::new(BroadcastHub::new(
            app.store.clone(),
            app.config.hub.tick_period,
            app.config.hub.channel_capacity,
        ));

        let (subscriber_id, mut rx) = hub.connect(None, observer);
        let interest: HashSet<u32> = norad_ids.into_iter().collect();
        if let Err(e) = hub.subscribe(&subscriber_id, interest) {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let hub_task = tokio::spawn(hub.clone().run(stop_rx));

        // keep configured collections fresh while streaming
        let fetcher = app.fetcher.clone();
        let collections: Vec<String> = app
            .config
            .collections
            .iter()
            .filter(|c| c.group.is_some())
            .map(|c| c.name.clone())
            .collect();
        let refresher = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                for name in &collections {
                    let fetcher = fetcher.clone();
                    let name = name.clone();
                    let result = tokio::task::spawn_blocking(move || fetcher.refresh(&name)).await;
                    if let Ok(Err(e)) = result {
                        log::warn!("Background refresh failed: {}", e);
                    }
                }
            }
        });

        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some(message) => match serde_json::to_string(&message) {
                        Ok(line) => println!("{}", line),
                        Err(e) => log::warn!("Cannot serialize update: {}", e),
                    },
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        refresher.abort();
        let _ = stop_tx.send(());
        let _ = hub_task.await;
        ExitCode::SUCCESS
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: cannot serialize output: {}", e),
    }
}

fn parse_instant(at: Option<&str>) -> Result<DateTime<Utc>, String> {
    match at {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| format!("invalid instant {}: {}", s, e)),
        None => Ok(Utc::now()),
    }
}

fn parse_observer(
    app: &App,
    coordinates: &str,
    min_elevation: Option<f64>,
) -> Result<Observer, String> {
    let observer = Observer::from_coordinates(coordinates, None)
        .ok_or_else(|| format!("invalid coordinates: {}", coordinates))?;
    let min_elevation = min_elevation.unwrap_or(app.config.predict.min_elevation_deg);
    Ok(observer.with_min_elevation(min_elevation))
}

//! CLI entry point for the TTC arrival tracker.
//!
//! Provides subcommands for stop and line predictions, route and vehicle
//! lookups, service alerts, GTFS-realtime feed health checks, and a saved
//! bookmark list.

use anyhow::{Result, bail};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use ttc_eta::{
    alerts,
    api::{RouteView, TtcApi},
    bookmarks::{Bookmark, BookmarkKind, BookmarkLine, BookmarkStore},
    config::Config,
    eta::{self, EtaEntry, UnifiedEta},
    output::{append_records, arrival_rows, countdown, print_json, render_groups},
    routes::is_subway_line,
    error::FetchError,
    stats::FeedSummary,
};

#[derive(Parser)]
#[command(name = "ttc_eta")]
#[command(about = "Arrival times and service information for the TTC", long_about = None)]
struct Cli {
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Arrivals for one line at one stop
    Predictions {
        line: u32,
        /// Stop code
        stop: u32,

        /// Use the legacy stop tag for this line instead of the stop code
        #[arg(long)]
        tag: Option<String>,

        /// Read the GTFS-realtime trip update feed instead
        #[arg(long, conflicts_with = "tag")]
        gtfs: bool,

        /// CSV file to append arrivals to
        #[arg(long)]
        csv: Option<String>,
    },
    /// Arrivals for every line serving a stop
    Stop {
        stop_id: u32,

        /// Only keep these lines (e.g. 504, 510)
        #[arg(short, long, value_delimiter = ',')]
        line: Vec<String>,
    },
    /// Next trains at a subway platform
    Subway { line: u32, stop: u32 },
    /// Directions, branches and stops of a route
    Route { line: u32 },
    /// All lines, subway first
    Routes,
    /// Last reported position of a vehicle
    Vehicle { id: u32 },
    /// Active service alerts
    Alerts {
        /// Only alerts touching these lines
        #[arg(short, long, value_delimiter = ',')]
        line: Vec<String>,

        /// Read the TTC alerts account on Bluesky instead of GTFS-realtime
        #[arg(long)]
        social: bool,
    },
    /// Planned subway closures
    Closures {
        /// Service date, YYYY-MM-DD (default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Only closures on this line
        #[arg(short, long)]
        line: Option<u32>,
    },
    /// Check the GTFS-realtime feeds and the bustime API
    Check {
        /// CSV file to append summaries to
        #[arg(short, long)]
        output: Option<String>,

        /// Route whose vehicles are requested from bustime
        #[arg(long, default_value_t = 95)]
        bustime_route: u32,
    },
    /// Saved stops
    Bookmarks {
        #[command(subcommand)]
        command: BookmarkCommands,
    },
}

#[derive(Subcommand)]
enum BookmarkCommands {
    List,
    Add {
        stop_tag: String,
        stop_name: String,
        /// One or more lines, comma separated
        #[arg(value_delimiter = ',', required = true)]
        lines: Vec<String>,

        #[arg(long)]
        subway: bool,

        #[arg(short, long)]
        direction: Option<String>,
    },
    Remove {
        stop_tag: String,
        #[arg(value_delimiter = ',', required = true)]
        lines: Vec<String>,
    },
    /// Arrivals for every bookmark
    Etas,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/ttc_eta.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("ttc_eta.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("warn".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let api = TtcApi::from_config(&config)?;
    let json = cli.json;

    match cli.command {
        Commands::Predictions {
            line,
            stop,
            tag,
            gtfs,
            csv,
        } => {
            let groups = match prediction_source(line, tag, gtfs)? {
                PredictionSource::Gtfs => api.gtfs_stop_predictions(&stop.to_string(), Some(line)).await?,
                PredictionSource::Subway => api.subway_predictions(line, stop).await?,
                PredictionSource::LegacyTag(tag) => api.line_stop_predictions(line, &tag).await?,
                PredictionSource::Bus => api.bus_predictions(line, stop).await?,
            };
            show_groups(&groups, json)?;

            if let Some(path) = csv {
                let rows = arrival_rows(&groups, Utc::now().timestamp());
                append_records(&path, &rows)?;
                info!(path, rows = rows.len(), "Arrivals appended");
            }
        }
        Commands::Stop { stop_id, line } => {
            let groups = api.stop_predictions(stop_id).await?;
            if line.is_empty() {
                show_groups(&groups, json)?;
            } else {
                let lines: Vec<&str> = line.iter().map(String::as_str).collect();
                show_entries(&eta::filter_lines(eta::flatten(&groups), &lines), json)?;
            }
        }
        Commands::Subway { line, stop } => {
            if !is_subway_line(line) {
                bail!("line {line} is not a subway line");
            }
            let groups = api.subway_predictions(line, stop).await?;
            show_groups(&groups, json)?;
        }
        Commands::Route { line } => {
            let route = api.route(line).await?;
            if json {
                print_json(&route)?;
            } else {
                print!("{}", render_route(&route));
            }
        }
        Commands::Routes => {
            let routes = api.route_list().await?;
            if json {
                print_json(&routes)?;
            } else {
                for r in &routes {
                    println!("{:>4}  {}", r.line, r.title);
                }
            }
        }
        Commands::Vehicle { id } => match api.vehicle_location(id).await? {
            Some(v) if json => print_json(&v)?,
            Some(v) => {
                println!(
                    "vehicle {} on {} at {:.5}, {:.5}",
                    v.id,
                    v.route.as_deref().unwrap_or("?"),
                    v.lat,
                    v.lon
                );
                if let Some(secs) = v.secs_since_report {
                    println!("reported {secs}s ago");
                }
            }
            None => println!("No position reported for vehicle {id}"),
        },
        Commands::Alerts { line, social } => {
            let lines: Vec<&str> = line.iter().map(String::as_str).collect();
            if social {
                let all = api.social_alerts().await?;
                let shown: Vec<_> = if lines.is_empty() {
                    all.iter().collect()
                } else {
                    alerts::social_for_lines(&all, &lines)
                };
                if json {
                    print_json(&shown)?;
                } else if shown.is_empty() {
                    println!("No recent alerts");
                } else {
                    for a in shown {
                        println!("{}  {}", a.created_at.as_deref().unwrap_or(""), a.text);
                    }
                }
                return Ok(());
            }

            let feed = api.gtfs_alerts().await?;
            let all = alerts::summaries(&feed);
            let shown: Vec<_> = if lines.is_empty() {
                all.iter().collect()
            } else {
                alerts::for_lines(&all, &lines)
            };

            if json {
                print_json(&shown)?;
            } else if shown.is_empty() {
                println!("No active alerts");
            } else {
                for a in shown {
                    println!("[{}] {}", a.routes.join(","), a.header);
                    if let Some(d) = &a.description {
                        println!("    {d}");
                    }
                }
            }
        }
        Commands::Closures { date, line } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            let (closures, updated) = tokio::join!(
                api.subway_closures(date),
                api.subway_closures_last_updated()
            );
            let mut closures = closures?;
            if let Some(line) = line {
                closures.retain(|c| c.touches_line(line));
            }
            if json {
                print_json(&closures)?;
            } else {
                if closures.is_empty() {
                    println!("No subway closures on {date}");
                }
                for c in &closures {
                    println!("{}", c.headline());
                    if let Some(d) = &c.description {
                        println!("    {d}");
                    }
                }
                match updated {
                    Ok(stamp) => println!("(closure list updated {stamp})"),
                    Err(e) => warn!(error = %e, "Closure update time unavailable"),
                }
            }
        }
        Commands::Check {
            output,
            bustime_route,
        } => {
            let summaries = check_feeds(&api, bustime_route).await;
            for s in &summaries {
                if !s.is_healthy() {
                    warn!(feed = ?s.feed, error = ?s.error_message, "Feed unhealthy");
                }
            }
            if json {
                print_json(&summaries)?;
            } else {
                for s in &summaries {
                    println!("{}", s.describe());
                }
            }

            if let Some(path) = output {
                append_records(&path, &summaries)?;
            }
        }
        Commands::Bookmarks { command } => {
            let mut store = BookmarkStore::open(&config.bookmarks_path);
            run_bookmarks(command, &mut store, &api, json).await?;
        }
    }

    Ok(())
}

fn show_groups(groups: &[UnifiedEta], json: bool) -> Result<()> {
    if json {
        print_json(&groups)
    } else {
        print!("{}", render_groups(groups, Utc::now().timestamp()));
        Ok(())
    }
}

fn show_entries(entries: &[EtaEntry], json: bool) -> Result<()> {
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No predictions available");
    }
    let now = Utc::now().timestamp();
    for e in entries {
        println!("{:>7}  {}", countdown(e.seconds_until(now)), e.branch);
    }
    Ok(())
}

fn render_route(route: &RouteView) -> String {
    let mut out = String::new();
    match route {
        RouteView::Legacy { title, directions } => {
            out.push_str(&format!("{title}\n"));
            for d in directions {
                out.push_str(&format!("  {}\n", d.name));
                for b in &d.branches {
                    out.push_str(&format!("    {} ({} stops)\n", b.title, b.stops.len()));
                }
            }
        }
        RouteView::Basic { branches } => {
            for b in branches {
                out.push_str(&format!("{} {}\n", b.gtfs_id, b.headsign));
                for s in &b.stops {
                    out.push_str(&format!("    {:>6}  {}\n", s.code, s.name));
                }
            }
        }
    }
    out
}

/// Fetches both GTFS-realtime feeds and the bustime vehicle list and
/// summarizes each, recording failures rather than aborting.
#[tracing::instrument(skip(api))]
async fn check_feeds(api: &TtcApi, bustime_route: u32) -> Vec<FeedSummary> {
    let (alerts, trips, bustime) = tokio::join!(
        api.gtfs_alerts(),
        api.gtfs_trip_updates(),
        api.bustime_vehicle_count(bustime_route)
    );
    let mut summaries: Vec<FeedSummary> = [("alerts", alerts), ("trip_updates", trips)]
        .into_iter()
        .map(|(name, result)| summarize(name, result.map(|feed| FeedSummary::from_feed(&feed))))
        .collect();
    summaries.push(summarize("bustime", bustime.map(FeedSummary::reachable)));
    summaries
}

fn summarize(name: &str, result: Result<FeedSummary, FetchError>) -> FeedSummary {
    match result {
        Ok(summary) => summary.with_feed_name(name),
        Err(e) => {
            error!(feed = name, error = %e, "Feed check failed");
            FeedSummary::from_error("fetch_error", &e.to_string()).with_feed_name(name)
        }
    }
}

/// Which upstream answers a `predictions` request.
#[derive(Debug, PartialEq, Eq)]
enum PredictionSource {
    Gtfs,
    Subway,
    LegacyTag(String),
    Bus,
}

fn prediction_source(line: u32, tag: Option<String>, gtfs: bool) -> Result<PredictionSource> {
    if gtfs {
        return Ok(PredictionSource::Gtfs);
    }
    match (is_subway_line(line), tag) {
        (true, Some(_)) => bail!("--tag applies to bus and streetcar lines, not subway line {line}"),
        (true, None) => Ok(PredictionSource::Subway),
        (false, Some(tag)) => Ok(PredictionSource::LegacyTag(tag)),
        (false, None) => Ok(PredictionSource::Bus),
    }
}

async fn run_bookmarks(
    command: BookmarkCommands,
    store: &mut BookmarkStore,
    api: &TtcApi,
    json: bool,
) -> Result<()> {
    match command {
        BookmarkCommands::List => {
            if json {
                println!("{}", store.to_json()?);
            } else if store.list().is_empty() {
                println!("No bookmarks in {}", store.path().display());
            } else {
                for b in store.list() {
                    println!("{:>6}  {}  [{}]", b.stop_tag, b.stop_name, b.line);
                }
            }
        }
        BookmarkCommands::Add {
            stop_tag,
            stop_name,
            lines,
            subway,
            direction,
        } => {
            let bookmark = Bookmark {
                stop_tag,
                stop_name,
                line: BookmarkLine::from_values(lines),
                kind: if subway {
                    BookmarkKind::Subway
                } else {
                    BookmarkKind::Bus
                },
                direction,
            };
            if !store.add(bookmark)? {
                println!("Already bookmarked");
            }
        }
        BookmarkCommands::Remove { stop_tag, lines } => {
            if !store.remove(&stop_tag, &BookmarkLine::from_values(lines))? {
                println!("No such bookmark");
            }
        }
        BookmarkCommands::Etas => {
            let results = join_all(store.list().iter().map(|b| bookmark_etas(api, b))).await;
            let now = Utc::now().timestamp();
            for (b, entries) in store.list().iter().zip(&results) {
                if json {
                    continue;
                }
                println!("{} [{}]", b.stop_name, b.line);
                if entries.is_empty() {
                    println!("  no arrivals");
                }
                for e in entries {
                    println!("  {:>7}  {}", countdown(e.seconds_until(now)), e.branch);
                }
            }
            if json {
                print_json(&results)?;
            }
        }
    }
    Ok(())
}

/// Arrivals for one bookmark; a failed fetch yields none.
async fn bookmark_etas(api: &TtcApi, bookmark: &Bookmark) -> Vec<EtaEntry> {
    let Ok(stop) = bookmark.stop_tag.parse::<u32>() else {
        warn!(stop_tag = %bookmark.stop_tag, "Bookmark stop is not numeric, skipping");
        return Vec::new();
    };
    let lines = bookmark.line.lines();

    let result = match bookmark.kind {
        BookmarkKind::Subway => {
            let Some(line) = lines.first().and_then(|l| l.parse::<u32>().ok()) else {
                warn!(line = %bookmark.line, "Subway bookmark has no numeric line, skipping");
                return Vec::new();
            };
            api.subway_predictions(line, stop).await
        }
        BookmarkKind::Bus => {
            let numbers: Vec<u32> = lines.iter().filter_map(|l| l.parse().ok()).collect();
            api.stop_lines_predictions(stop, &numbers).await
        }
    };

    match result {
        Ok(groups) if bookmark.kind == BookmarkKind::Subway => eta::flatten(&groups),
        Ok(groups) => eta::filter_lines(eta::flatten(&groups), &lines),
        Err(e) => {
            error!(stop_tag = %bookmark.stop_tag, error = %e, "Bookmark fetch failed");
            Vec::new()
        }
    }
}

//! # Dashboard Live Stream Test
//!
//! Connects to a running dashboard aggregator via lib_station and prints
//! the station table as snapshots arrive. Exercises the full consumer
//! lifecycle: subscribe on startup, countdown while waiting for a retry,
//! manual refresh when auto-retry is disabled, unsubscribe on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lib_station::{DashboardService, RetryPolicy, WsConnector};

#[derive(Parser, Debug)]
#[clap(about = "Watches a dashboard aggregator's station stream", version)]
struct Args {
    /// WebSocket base URL of the aggregator.
    #[clap(long, env = "DASH_BASE_URL", default_value = "ws://127.0.0.1:12000")]
    base_url: String,

    /// Base retry delay in milliseconds; omit to disable auto-retry.
    #[clap(long, env = "DASH_RETRY_MS")]
    retry_ms: Option<u64>,

    /// Backoff multiplier applied per consecutive failure.
    #[clap(long, env = "DASH_RETRY_BACKOFF", default_value_t = 2.0)]
    retry_backoff: f64,

    /// Cap on the grown retry delay, in milliseconds.
    #[clap(long, env = "DASH_RETRY_MAX_MS", default_value_t = 30_000)]
    retry_max_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let retry = RetryPolicy {
        retry_ms: args.retry_ms,
        backoff: args.retry_backoff,
        max_delay_ms: args.retry_max_ms,
    };

    let service = DashboardService::new(Arc::new(WsConnector), &args.base_url);
    println!("[*] Subscribing to {}/sub/dashboard ...", args.base_url);
    service.subscribe(retry);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => render(&service),
        }
    }

    println!("\n[*] Unsubscribing.");
    service.unsubscribe();
    Ok(())
}

fn render(service: &DashboardService) {
    if service.is_subscribing() {
        println!("[*] Connecting...");
        return;
    }
    if service.has_error() {
        match service.retry_time_ms() {
            Some(at) => {
                let remaining = at - chrono::Utc::now().timestamp_millis();
                println!("[WARN] Stream down; retrying in {}ms", remaining.max(0));
            }
            None => {
                // No auto-retry configured; a manual refresh is the only way back.
                println!("[WARN] Stream down; refreshing manually.");
                if let Err(e) = service.refresh() {
                    eprintln!("[ERROR] Refresh rejected: {}", e);
                    std::process::exit(1);
                }
            }
        }
        return;
    }

    let stations = service.stations();
    println!("[INFO] {} station(s):", stations.len());
    for (key, station) in stations {
        let station = station.lock().unwrap();
        println!(
            "    {:<21} {:?}  id={} cell={}",
            key,
            station.status,
            station.station_id,
            station.cell.as_deref().unwrap_or("-"),
        );
    }
}

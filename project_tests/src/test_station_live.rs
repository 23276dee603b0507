//! # Station Live Stream Test
//!
//! Connects to one station backend via lib_station and prints per-test
//! phase and measurement progress as update frames arrive. Phase
//! descriptors come from the station's HTTP API, so not-yet-run phases
//! show up as pending.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use lib_station::{RetryPolicy, StationApiClient, StationService, WsConnector};

#[derive(Parser, Debug)]
#[clap(about = "Watches one test station's update stream", version)]
struct Args {
    /// Station host.
    #[clap(long, env = "STATION_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Station port.
    #[clap(long, env = "STATION_PORT", default_value_t = 8888)]
    port: u16,

    /// Base retry delay in milliseconds.
    #[clap(long, env = "STATION_RETRY_MS", default_value_t = 500)]
    retry_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let service = StationService::new(
        Arc::new(WsConnector),
        Some(Arc::new(StationApiClient::new())),
    );
    println!("[*] Subscribing to ws://{}:{}/sub/station ...", args.host, args.port);
    service.subscribe(
        &args.host,
        args.port,
        RetryPolicy::every(args.retry_ms)
            .with_backoff(2.0)
            .with_max_delay(30_000),
    );

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

fn render(service: &StationService) {
    if service.is_subscribing() {
        println!("[*] Connecting...");
        return;
    }
    if service.has_error() {
        if let Some(at) = service.retry_time_ms() {
            let remaining = at - chrono::Utc::now().timestamp_millis();
            println!("[WARN] Stream down; retrying in {}ms", remaining.max(0));
        }
        return;
    }

    for (test_id, test) in service.tests() {
        let test = test.lock().unwrap();
        println!("[INFO] test {} -> {:?}", test_id, test.status);
        for phase in &test.phases {
            println!("    {:<28} {:?}", phase.name, phase.status);
            for m in &phase.measurements {
                println!(
                        "        {:<24} {:?} {}",
                        m.name,
                        m.outcome,
                        m.measured_value
                            .as_ref()
                            .map(|v| v.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                );
            }
        }
        if !test.attachments.is_empty() {
            println!("    {} attachment(s)", test.attachments.len());
        }
    }
}

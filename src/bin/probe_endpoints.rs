use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use urban_density::config::default_endpoints;
use urban_density::core::fetcher::ResilientFetcher;
use urban_density::core::{geometry, query};
use urban_density::utils::logger;
use urban_density::{Coordinate, EstimatorSettings, Result, TagCategory, TomlConfig};

#[derive(Parser)]
#[command(name = "probe-endpoints")]
#[command(about = "Send a minimal query to each Overpass endpoint and report latency")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint to probe, repeatable
    #[arg(long = "endpoint")]
    endpoints: Vec<String>,

    /// Per-endpoint timeout in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let endpoints = if !args.endpoints.is_empty() {
        args.endpoints.clone()
    } else if let Some(path) = &args.config {
        TomlConfig::from_file(path)?.settings().endpoints
    } else {
        default_endpoints()
    };

    // 十公尺的小圓，只查 shop，回應應該很小
    let center = Coordinate::new(139.7671, 35.6812)?;
    let area = geometry::build_circle(center, 10.0, 8)?;
    let probe = query::build_query(&area, &[TagCategory::Shop], 5)?;
    let backoff = EstimatorSettings::default().backoff;

    println!("🚀 Probing {} endpoints", endpoints.len());

    let mut healthy = 0;
    for endpoint in &endpoints {
        let fetcher = ResilientFetcher::new(
            vec![endpoint.clone()],
            Duration::from_millis(args.timeout_ms),
            backoff,
        )?;

        let started = Instant::now();
        match fetcher.fetch(&probe).await {
            Ok(elements) => {
                healthy += 1;
                println!(
                    "  ✅ {} ({} ms, {} elements)",
                    endpoint,
                    started.elapsed().as_millis(),
                    elements.len()
                );
            }
            Err(e) => {
                println!(
                    "  ❌ {} ({} ms): {}",
                    endpoint,
                    started.elapsed().as_millis(),
                    e.user_friendly_message()
                );
            }
        }
    }

    println!("📊 {}/{} endpoints healthy", healthy, endpoints.len());
    if healthy == 0 {
        std::process::exit(2);
    }
    Ok(())
}

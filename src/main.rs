use clap::Parser;
use serde::Serialize;
use urban_density::core::fetcher::ResilientFetcher;
use urban_density::utils::{logger, validation::Validate};
use urban_density::{
    AreaGeometry, CliConfig, DensityError, DensityEstimator, DensityResult, EstimatorSettings,
    TomlConfig,
};

#[derive(Serialize)]
struct JsonOutput<'a> {
    vertices: usize,
    #[serde(flatten)]
    result: &'a DensityResult,
    description: &'static str,
}

fn fail(e: &DensityError, json: bool) -> ! {
    tracing::error!("❌ {}", e);

    if json {
        if let Ok(report) = serde_json::to_string_pretty(&e.to_report()) {
            println!("{}", report);
        }
    }
    eprintln!("{}", e.console_report());
    std::process::exit(e.exit_code());
}

fn load_settings(cli: &CliConfig) -> Result<(EstimatorSettings, bool, bool), DensityError> {
    match &cli.config {
        Some(path) => {
            let toml = TomlConfig::from_file(path)?;
            let mut settings = toml.settings();
            cli.apply_overrides(&mut settings);
            Ok((
                settings,
                cli.verbose || toml.verbose_logging(),
                cli.json_logs || toml.json_logging(),
            ))
        }
        None => Ok((
            EstimatorSettings::from_provider(cli),
            cli.verbose,
            cli.json_logs,
        )),
    }
}

fn display_summary(area: &AreaGeometry, settings: &EstimatorSettings) {
    let bbox = area.bounding_box();
    println!("📐 Area");
    println!("  Vertices: {}", area.vertex_count());
    println!("  Area: {:.4} km²", area.area_km2());
    println!(
        "  Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat
    );
    println!("📡 Endpoints");
    for (i, endpoint) in settings.endpoints.iter().enumerate() {
        println!("  {}. {}", i + 1, endpoint);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let (settings, verbose, json_logs) = match load_settings(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(e.exit_code());
        }
    };

    // 初始化日誌
    if json_logs {
        logger::init_json_logger(verbose);
    } else {
        logger::init_cli_logger(verbose);
    }

    tracing::info!("🚀 Starting urban-density");
    tracing::debug!("Settings: {:?}", settings);

    // 驗證配置
    if let Err(e) = settings.validate() {
        fail(&e, cli.json);
    }

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let mode = cli.command.to_mode().unwrap_or_else(|e| fail(&e, cli.json));
    let fetcher = ResilientFetcher::new(
        settings.endpoints.clone(),
        settings.attempt_timeout,
        settings.backoff,
    )
    .unwrap_or_else(|e| fail(&e, cli.json));
    let estimator = DensityEstimator::new_with_monitoring(fetcher, &settings, cli.monitor);

    let area = estimator.geometry(&mode).unwrap_or_else(|e| fail(&e, cli.json));

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - Overpass will not be contacted");
        display_summary(&area, &settings);
        let query = estimator.query(&area).unwrap_or_else(|e| fail(&e, cli.json));
        println!("📝 Query\n{}", query);
        return Ok(());
    }

    let result = match estimator.estimate(&area).await {
        Ok(result) => result,
        Err(e) => fail(&e, cli.json),
    };

    if cli.json {
        let output = JsonOutput {
            vertices: area.vertex_count(),
            result: &result,
            description: result.level.description(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("🏙️  {}", result.level.label());
        println!("   {}", result.level.description());
        println!("   POIs: {}", result.poi_count);
        println!("   Area: {:.3} km²", result.area_km2);
        println!("   Density: {:.2} POIs/km²", result.poi_density);
    }

    Ok(())
}

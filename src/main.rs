//! Momentum Factor Engine - Main Entry Point
//!
//! Validates configuration, replays historical closes, or streams them through
//! the live engine in dry-run mode.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use momentum_factor_engine::backtest::{BacktestRunner, BarLoader, CsvBarLoader};
use momentum_factor_engine::config::Config;
use momentum_factor_engine::engine::{spawn_engine, MomentumEngine};
use momentum_factor_engine::portfolio::{LoggingOrderSink, PortfolioSnapshot};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Momentum Factor Engine CLI
#[derive(Parser)]
#[command(name = "momentum-factor-engine")]
#[command(version, about = "Cross-sectional momentum long/short rebalancing")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, global = true, default_value = "config")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration, then print it
    Validate,

    /// Replay historical closes through a paper portfolio
    Backtest {
        /// Path to CSV data file (date,symbol,close)
        #[arg(short, long)]
        data: PathBuf,

        /// Initial equity, overrides backtest.initial_equity
        #[arg(short, long)]
        equity: Option<Decimal>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Stream closes through the engine and log the order intents
    DryRun {
        /// Path to CSV data file (date,symbol,close)
        #[arg(short, long)]
        data: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Commands::Validate => run_validate(&cli.config),
        Commands::Backtest {
            data,
            equity,
            output,
        } => run_backtest(&cli.config, &data, equity, output.as_deref()).await,
        Commands::DryRun { data } => run_dry_run(&cli.config, &data).await,
    }
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "momentum-engine.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the writer flushing for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("momentum_factor_engine=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Universe: {} securities", config.universe.securities.len());
    info!(
        "   Lookback / Skip: {} / {} days",
        config.momentum.lookback_period, config.momentum.skip_period
    );
    info!("   Quintiles: {}", config.momentum.quintile_count);
    info!("   Formula: {:?}", config.momentum.formula);
    info!("   Schedule: {:?}", config.rebalance.schedule);
    info!(
        "   Min Trade Notional: ${}",
        config.rebalance.minimum_trade_notional
    );
    if !config.rebalance.quantity_step.is_zero() {
        info!("   Quantity Step: {}", config.rebalance.quantity_step);
    }
}

/// Load the configuration, taking the universe from the data when none is set.
fn load_config(path: &str, loader: Option<&CsvBarLoader>) -> Result<Config> {
    let mut config = Config::load_from(path)?;

    if config.universe.securities.is_empty() {
        if let Some(loader) = loader {
            warn!("No universe configured, using every symbol in the data");
            config.universe.securities = loader.available_symbols();
        }
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run_validate(config_path: &str) -> Result<()> {
    let config = load_config(config_path, None)?;
    log_config(&config);

    println!("{}", serde_json::to_string_pretty(&config)?);
    info!("✅ Configuration is valid");
    Ok(())
}

async fn run_backtest(
    config_path: &str,
    data_path: &std::path::Path,
    equity: Option<Decimal>,
    output_dir: Option<&std::path::Path>,
) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║              BACKTEST MODE                                 ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    info!("📊 Loading data from: {}", data_path.display());
    let loader = CsvBarLoader::new(data_path)?;

    if let Some((data_start, data_end)) = loader.available_range() {
        info!("   Data range: {} to {}", data_start, data_end);
    }
    info!("   Symbols: {}", loader.available_symbols().len());
    info!("   Bars: {}", loader.len());

    let mut config = load_config(config_path, Some(&loader))?;
    if let Some(equity) = equity {
        config.backtest.initial_equity = equity;
        config.validate().context("Invalid initial equity")?;
    }
    log_config(&config);
    info!("💰 Initial equity: ${:.2}", config.backtest.initial_equity);

    let runner = BacktestRunner::new(loader, config);
    let result = runner.run().await?;

    println!("\n{}", result.summary());

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)?;

        let equity_path = dir.join("equity_curve.csv");
        result.equity_to_csv(&equity_path)?;
        info!("📁 Equity curve saved to: {}", equity_path.display());

        let metrics_path = dir.join("metrics.json");
        std::fs::write(&metrics_path, serde_json::to_string_pretty(&result.metrics)?)?;
        info!("📁 Metrics saved to: {}", metrics_path.display());
    }

    Ok(())
}

async fn run_dry_run(config_path: &str, data_path: &std::path::Path) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!("║              DRY RUN MODE                                  ║");
    info!("╚════════════════════════════════════════════════════════════╝");

    let loader = CsvBarLoader::new(data_path)?;
    let config = load_config(config_path, Some(&loader))?;
    log_config(&config);

    // Intents are logged, never filled, so the account stays flat.
    let portfolio = Arc::new(PortfolioSnapshot::new(config.backtest.initial_equity));
    let engine = MomentumEngine::new(&config)?;
    let (handle, task) = spawn_engine(engine, portfolio, Arc::new(LoggingOrderSink), 1024);

    let (start, end) = loader
        .available_range()
        .context("No data available for dry run")?;
    for bar in loader.load_bars(start, end)? {
        if handle.submit_bar(bar).await.is_err() {
            break;
        }
    }
    drop(handle);

    let stats = task.await.context("Engine task panicked")??;
    info!(
        bars = stats.bars_processed,
        rebalances = stats.rebalances,
        skipped = stats.rebalances_skipped,
        intents = stats.intents_emitted,
        "Dry run complete"
    );

    Ok(())
}

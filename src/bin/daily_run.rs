use anyhow::Context;
use clap::Parser;
use contract_ai::app::daily_agent::DailyAgent;
use contract_ai::app::runtime;
use contract_ai::utils::{logger, validation::Validate};
use contract_ai::AppConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 排程用的每日監控，成功回傳 0，失敗回傳 1
#[derive(Parser)]
#[command(name = "daily_run")]
#[command(about = "Daily contract expiration and conflict check for cron / Task Scheduler")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "contract-ai.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    println!(
        "Contract Management Daily Run - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", "=".repeat(60));

    match run_daily_check(&args).await {
        Ok(()) => {
            println!("Daily run completed successfully!");
            std::process::exit(0);
        }
        Err(e) => {
            tracing::error!("❌ Error during daily run: {:#}", e);
            eprintln!("❌ {:#}", e);
            println!("Daily run failed! Check logs for details.");
            std::process::exit(1);
        }
    }
}

async fn run_daily_check(args: &Args) -> anyhow::Result<()> {
    let config = AppConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    // 日誌同時寫入 logs/daily_run.log
    logger::init_daily_run_logger(Path::new(&config.storage.logs_directory), args.verbose)
        .with_context(|| format!("Failed to open log directory {}", config.storage.logs_directory))?;

    config.validate()?;
    tracing::info!("Starting daily contract monitoring run...");

    let client = runtime::openai_client(&config);
    let store = runtime::load_vector_store(&config, client)
        .await
        .context("Vector store not found. Please process documents first.")?;

    let mut agent = DailyAgent::new(
        Arc::new(store),
        runtime::report_storage(&config),
        config.email.clone(),
    )
    .with_window_days(config.monitor.expiration_window_days);
    if config.email.enabled {
        agent = agent.with_mailer(runtime::mailer(&config));
    }

    let outcome = agent
        .run_daily_check(chrono::Local::now().naive_local())
        .await?;

    tracing::info!(
        "Daily contract monitoring completed successfully ({} expirations, {} conflicts, emailed: {})",
        outcome.report.expirations.len(),
        outcome.report.conflicts.len(),
        outcome.emailed
    );
    Ok(())
}

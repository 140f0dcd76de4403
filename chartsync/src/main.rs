use std::io::{self, IsTerminal};

use anyhow::Context;
use chartsync::cli::{Cli, resolve_inputs};
use chartsync::config::SyncConfig;
use chartsync::sync::engine::{ItemReport, RunMode, RunReport, SyncEngine};
use chartsync::sync::state::UploadStateStore;
use chartsync::sync::transfer::CatalogUploader;
use chartsync_core::CatalogClient;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_LOG_FILTER: &str = "chartsync=info,chartsync_core=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let inputs = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        resolve_inputs(&cli, &mut input, &mut output).context("failed to read answers")?
    };
    let config = SyncConfig::from_env(inputs, cli.state_file.clone());

    let client = CatalogClient::with_basedir(&config.site_url, &config.basedir, config.proxy.as_ref())
        .context("failed to build HTTP client")?;
    tracing::info!(
        base_url = %client.base_url(),
        proxy = config.proxy.as_ref().map(|p| p.url.as_str()).unwrap_or("off"),
        root = %config.root.display(),
        state_file = %config.state_file.display(),
        mode = ?config.mode,
        "starting"
    );
    let engine = SyncEngine::new(
        CatalogUploader::new(client, config.retry),
        UploadStateStore::new(&config.state_file),
        config.root.clone(),
    );

    tokio::select! {
        result = engine.run(config.mode) => {
            let report = result.context("run aborted")?;
            print_summary(&report);
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, upload state kept for completed songs");
            anyhow::bail!("interrupted")
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal())
                .with_target(false),
        )
        .init();
}

fn print_summary(report: &RunReport) {
    match report.mode {
        RunMode::Upload => {
            for item in &report.items {
                if let ItemReport::Failed { key, detail } = item {
                    println!("failed: {key} ({detail})");
                }
            }
            println!(
                "uploaded {}, skipped {}, failed {}",
                report.uploaded().len(),
                report.skipped_count(),
                report.failed_count()
            );
        }
        RunMode::Scan => {
            for key in report.missing() {
                println!("missing: {key}");
            }
            println!(
                "{} songs missing on server ({} listed there)",
                report.missing().len(),
                report.server_total.unwrap_or_default()
            );
        }
    }
}

//! supply-dash: command-line front end for the supply-chain analytics backend.
//!
//! Uploads CSV batches, warms the local cache, and prints any dashboard
//! resource from the cache-first client.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::Error;
use dashboard_client::{DashboardClient, Endpoint, FileStatus, UploadPhase};

/// Supply-chain analytics dashboard client
#[derive(Parser)]
#[command(name = "supply-dash", about = "Cache-first client for the supply-chain analytics backend")]
struct Cli {
    /// Path to an optional TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload CSV files, then warm every endpoint cache.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print one resource (slug, cache key, or path).
    Fetch {
        endpoint: Endpoint,
        #[arg(long)]
        pretty: bool,
    },
    /// Warm every endpoint cache and mark the data ready.
    Preload,
    /// List the files of the last successful upload.
    Files,
    /// Clear every cached resource and upload record.
    Reset,
    /// Download the optimization recommendations spreadsheet.
    Download {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// List known endpoints.
    Endpoints,
}

fn print_json(value: &impl serde::Serialize, pretty: bool) -> Result<(), Error> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

async fn run(client: DashboardClient, command: Command, cancel: CancellationToken) -> Result<(), Error> {
    match command {
        Command::Upload { files } => {
            let report = client.upload_batch(&files, &cancel).await?;
            for f in &report.files {
                match &f.status {
                    FileStatus::Uploaded { stored_as } => {
                        println!("ok      {} -> {}", f.name, stored_as.as_deref().unwrap_or(&f.name))
                    }
                    FileStatus::Failed { reason } => println!("failed  {}: {}", f.name, reason),
                }
            }
            match report.phase {
                UploadPhase::Ready if report.data_ready => {
                    info!("Upload complete, dashboard data is ready");
                    Ok(())
                }
                UploadPhase::Ready => {
                    warn!("Upload complete but preload did not finish");
                    Ok(())
                }
                _ => Err(Error::Other(format!(
                    "{} of {} file(s) failed to upload",
                    report.failed().count(),
                    report.files.len()
                ))),
            }
        }
        Command::Fetch { endpoint, pretty } => {
            if endpoint.is_forecast() {
                let forecasts = client.demand_forecast(&cancel).await?;
                print_json(&forecasts, pretty)
            } else {
                let envelope = client.fetch(endpoint, &cancel).await?;
                print_json(&envelope.data, pretty)
            }
        }
        Command::Preload => {
            let summary = client.try_preload(&cancel).await?;
            for (endpoint, e) in &summary.failed {
                println!("failed  {}: {}", endpoint, e.user_message());
            }
            println!(
                "{} warmed, {} failed in {:.1}s",
                summary.warmed.len(),
                summary.failed.len(),
                summary.elapsed.as_secs_f64()
            );
            Ok(())
        }
        Command::Files => {
            let records = client.get_uploaded_files();
            if records.is_empty() {
                println!("No uploaded files recorded.");
            }
            for r in records {
                println!(
                    "{:<32} {:>10} B  {:<10} uploaded {}",
                    r.name,
                    r.size,
                    r.mime_type,
                    format_millis(r.uploaded_at_millis)
                );
            }
            println!("data ready: {}", client.is_data_ready());
            Ok(())
        }
        Command::Reset => {
            client.clear_all_cache()?;
            println!("Local cache cleared.");
            Ok(())
        }
        Command::Download { out } => {
            let path = client.download_recommendations(&out, &cancel).await?;
            println!("{}", path.display());
            Ok(())
        }
        Command::Endpoints => {
            for e in Endpoint::ALL {
                println!("{:<26} {:<22} {}", e.slug(), e.cache_key(), e.path());
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "supply_dash=info,dashboard_client=info,local_store=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("Backend: {} (store: {})", cfg.api_url, cfg.store_dir);

    let client = match DashboardClient::from_config(&cfg) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to initialize client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling in-flight requests");
            on_signal.cancel();
        }
    });

    match run(client, cli.command, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

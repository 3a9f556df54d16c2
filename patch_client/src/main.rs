//! Standalone boot client.
//!
//! Usage:
//!   cargo run -p patch_client -- --config boot.json [--strategy host|offline|simulate]
//!
//! Runs one boot sequence and exits 0 when it reaches the application
//! handoff, 1 when it aborts.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use patch_client::boot::{BootDeps, BootOutcome, BootstrapOrchestrator, SceneLoader};
use patch_client::loader::{ImageMetadataPatcher, StagedCodeHost};
use patch_client::transport::FramedTransport;
use patch_shared::config::{BootConfig, PlayStrategy};
use patch_shared::progress::{DownloadProgress, ProgressSink};
use patch_shared::storage::StorageLayout;
use tracing::info;

struct Args {
    config: PathBuf,
    strategy: Option<PlayStrategy>,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();
    let mut config = PathBuf::from("boot.json");
    let mut strategy = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "--strategy" if i + 1 < args.len() => {
                strategy = Some(args[i + 1].parse()?);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(Args { config, strategy })
}

/// Prints download progress to stdout.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn on_progress(&mut self, progress: DownloadProgress) {
        println!(
            "Downloading {} ({}) {}/{} files",
            progress.percent_text(),
            progress.bytes_text(),
            progress.done_count,
            progress.total_count
        );
    }

    fn on_nothing_to_download(&mut self) {
        println!("No update needed, 100%");
    }
}

/// Logs the handoff; the real application takes over from here.
struct LoggingSceneLoader;

#[async_trait]
impl SceneLoader for LoggingSceneLoader {
    async fn load_scene(&mut self, scene: &str) -> anyhow::Result<()> {
        info!(scene, "Loading application scene");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = parse_args()?;
    let mut cfg = BootConfig::load(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;
    if let Some(strategy) = args.strategy {
        cfg.strategy = strategy;
    }

    let level = cfg.log_level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()),
        )
        .init();

    info!(
        strategy = %cfg.strategy,
        host = %cfg.host_server_url(),
        package = %cfg.package_name,
        "Starting boot"
    );

    let layout = StorageLayout::new(&cfg.local_cache_root);
    let mut boot = BootstrapOrchestrator::new(
        cfg,
        BootDeps {
            transport: Arc::new(FramedTransport::new()),
            patcher: Arc::new(ImageMetadataPatcher::new()),
            code_host: Arc::new(StagedCodeHost::new(layout.modules_dir())),
            scene_loader: Box::new(LoggingSceneLoader),
            progress: Box::new(ConsoleProgress),
        },
    );

    match boot.run().await {
        BootOutcome::Done(report) => {
            println!(
                "Boot complete: {} strategy, version {}, module {} ({} bytes)",
                report.strategy, report.version, report.module.name, report.module.len
            );
            for failure in report.patch_report.failures() {
                if let Err(e) = &failure.outcome {
                    println!("  warning: {e}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        BootOutcome::Aborted(reason) => {
            eprintln!("Boot aborted: {reason}");
            Ok(ExitCode::from(1))
        }
    }
}

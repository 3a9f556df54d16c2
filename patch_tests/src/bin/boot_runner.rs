//! End-to-end boot runner.
//!
//! Publishes a generated package into a scratch content root, starts a
//! content host on an ephemeral port and boots a client against it twice:
//! once from an empty cache, once after a new version changes a single file.
//!
//! Usage:
//!   cargo run -p patch_tests --bin boot_runner -- [file-count] [file-size]

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use patch_client::boot::{BootDeps, BootOutcome, BootstrapOrchestrator, SceneLoader};
use patch_client::loader::{ImageMetadataPatcher, StagedCodeHost};
use patch_client::transport::FramedTransport;
use patch_server::publish_package;
use patch_server::server::bind_ephemeral;
use patch_shared::config::BootConfig;
use patch_shared::progress::{format_bytes, DownloadProgress, ProgressSink};
use patch_shared::storage::StorageLayout;
use tracing::info;

struct PrintProgress;

impl ProgressSink for PrintProgress {
    fn on_progress(&mut self, p: DownloadProgress) {
        println!("  {:>8} {}", p.percent_text(), p.bytes_text());
    }

    fn on_nothing_to_download(&mut self) {
        println!("  no update needed");
    }
}

struct NoScene;

#[async_trait]
impl SceneLoader for NoScene {
    async fn load_scene(&mut self, scene: &str) -> anyhow::Result<()> {
        info!(scene, "Handoff");
        Ok(())
    }
}

fn generate(dir: &Path, count: usize, size: usize, seed: u8) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join("HotUpdate.dll"), vec![seed; 4096])?;
    std::fs::write(dir.join("mscorlib.dll"), vec![0xAA; 2048])?;
    for i in 0..count {
        let body: Vec<u8> = (0..size).map(|b| (b + i) as u8).collect();
        std::fs::write(dir.join(format!("asset_{i:03}.bundle")), body)?;
    }
    Ok(())
}

async fn boot_once(cfg: BootConfig) -> anyhow::Result<()> {
    let layout = StorageLayout::new(&cfg.local_cache_root);
    let mut boot = BootstrapOrchestrator::new(
        cfg,
        BootDeps {
            transport: Arc::new(FramedTransport::new()),
            patcher: Arc::new(ImageMetadataPatcher::new()),
            code_host: Arc::new(StagedCodeHost::new(layout.modules_dir())),
            scene_loader: Box::new(NoScene),
            progress: Box::new(PrintProgress),
        },
    );
    let started = Instant::now();
    match boot.run().await {
        BootOutcome::Done(report) => {
            println!(
                "  done: version {} / {} files / {} in {:?}",
                report.version,
                report.download.total_count,
                format_bytes(report.download.total_bytes),
                started.elapsed()
            );
            Ok(())
        }
        BootOutcome::Aborted(reason) => anyhow::bail!("boot aborted: {reason}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let count = args.get(1).map(|s| s.parse::<usize>()).transpose()?.unwrap_or(40);
    let size = args.get(2).map(|s| s.parse::<usize>()).transpose()?.unwrap_or(64 * 1024);

    let scratch = tempfile::tempdir().context("scratch dir")?;
    let src = scratch.path().join("src");
    let root = scratch.path().join("content");
    let cache = scratch.path().join("client");

    generate(&src, count, size, 1)?;
    publish_package(&src, &root, "PC", "DefaultPackage", "v1").await?;

    let server = bind_ephemeral(&root).await?;
    let base_url = server.base_url()?;
    tokio::spawn(server.run());
    println!("Content host at {base_url}");

    let mut cfg = BootConfig::new("HotUpdate.dll", base_url, "PC", cache.to_string_lossy());
    cfg.aot_modules = vec!["mscorlib.dll".into()];

    println!("Boot 1 (empty cache)");
    boot_once(cfg.clone()).await?;

    generate(&src, count, size, 2)?;
    publish_package(&src, &root, "PC", "DefaultPackage", "v2").await?;
    println!("Boot 2 (one changed module)");
    boot_once(cfg.clone()).await?;

    println!("Boot 3 (up to date)");
    boot_once(cfg).await
}

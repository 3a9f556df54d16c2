//! Standalone content host binary.
//!
//! Usage:
//!   cargo run -p patch_server -- [--addr 127.0.0.1:9000] [--root content]
//!   cargo run -p patch_server -- [--root content] [--platform PC] [--package DefaultPackage] publish <src> <version>
//!
//! Without a subcommand the host serves `--root` until killed.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use patch_server::{publish_package, ContentServer};
use tracing::info;

struct Args {
    addr: String,
    root: PathBuf,
    platform: String,
    package: String,
    /// `publish <src> <version>` when given.
    publish: Option<(PathBuf, String)>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut cfg = Args {
        addr: "127.0.0.1:9000".into(),
        root: PathBuf::from("content"),
        platform: "PC".into(),
        package: "DefaultPackage".into(),
        publish: None,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.addr = args[i + 1].clone();
                i += 2;
            }
            "--root" if i + 1 < args.len() => {
                cfg.root = PathBuf::from(&args[i + 1]);
                i += 2;
            }
            "--platform" if i + 1 < args.len() => {
                cfg.platform = args[i + 1].clone();
                i += 2;
            }
            "--package" if i + 1 < args.len() => {
                cfg.package = args[i + 1].clone();
                i += 2;
            }
            "publish" => {
                let (Some(src), Some(version)) = (args.get(i + 1), args.get(i + 2)) else {
                    anyhow::bail!("usage: publish <src> <version>");
                };
                cfg.publish = Some((PathBuf::from(src), version.clone()));
                i += 3;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;

    if let Some((src, version)) = &cfg.publish {
        let manifest = publish_package(src, &cfg.root, &cfg.platform, &cfg.package, version)
            .await
            .context("publish")?;
        println!(
            "Published {} {} ({} files) to {}",
            manifest.package,
            manifest.version,
            manifest.files.len(),
            cfg.root.join(&cfg.platform).display()
        );
        return Ok(());
    }

    let addr = cfg.addr.parse().with_context(|| format!("parse --addr {}", cfg.addr))?;
    let server = ContentServer::bind(addr, &cfg.root).await.context("bind content host")?;
    info!(url = %server.base_url()?, root = %cfg.root.display(), "Content host ready");
    server.run().await
}

//! `patch_server`
//!
//! Content host for the patch pipeline:
//! - Serves package files over the framed content protocol
//! - Publishes package versions (files, manifest, version pointer)

pub mod publish;
pub mod server;

pub use publish::publish_package;
pub use server::ContentServer;

//! `patch_client`
//!
//! Client-side boot pipeline:
//! - Strategy-selected resource package initialization
//! - Version resolution and manifest synchronization
//! - Bounded concurrent downloads with retries
//! - Two-phase code module loading (AOT metadata, then the dynamic module)
//! - The boot state machine tying it together, with strategy downgrade

pub mod boot;
pub mod downloader;
pub mod loader;
pub mod package;
pub mod resolver;
pub mod transport;

#[cfg(test)]
mod testing;

pub use boot::{BootDeps, BootOutcome, BootstrapOrchestrator};

//! `patch_shared`
//!
//! Shared libraries used by the patch client and the content host.
//!
//! Design goals:
//! - Plain data contracts (config, manifests, progress) that serialize cleanly.
//! - Typed errors per failure domain; the client orchestrator decides policy.
//! - One framed wire protocol for both sides.
//! - No `unsafe`.

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod module;
pub mod net;
pub mod progress;
pub mod storage;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::cache::*;
    pub use crate::config::*;
    pub use crate::error::*;
    pub use crate::manifest::*;
    pub use crate::module::*;
    pub use crate::progress::*;
}

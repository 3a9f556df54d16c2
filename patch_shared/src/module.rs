//! Code module descriptors.

use serde::{Deserialize, Serialize};

/// Kind of code module declared by the boot config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    /// Statically compiled; only its type metadata is patched in.
    AheadOfTime,
    /// Loaded at runtime as executable code.
    Dynamic,
}

/// A declared code module. The name doubles as its asset key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub kind: ModuleKind,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, kind: ModuleKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn aot(name: impl Into<String>) -> Self {
        Self::new(name, ModuleKind::AheadOfTime)
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        Self::new(name, ModuleKind::Dynamic)
    }
}

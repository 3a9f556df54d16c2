//! Local package storage.
//!
//! Layout under the configured cache root:
//!
//! ```text
//! <root>/builtin/<package>/   shipped content
//! <root>/cache/<package>/     downloaded content
//! <root>/simulate/<package>/  raw files for simulated packages
//! <root>/modules/             staged dynamic modules
//! ```

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use bytes::Bytes;
use tokio::fs;

use crate::manifest::{is_manifest_file, version_file_name, ManifestEntry, VersionToken};

/// Resolves directories of the local storage layout.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn builtin_dir(&self, package: &str) -> PathBuf {
        self.root.join("builtin").join(package)
    }

    pub fn cache_dir(&self, package: &str) -> PathBuf {
        self.root.join("cache").join(package)
    }

    pub fn simulate_dir(&self, package: &str) -> PathBuf {
        self.root.join("simulate").join(package)
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("modules")
    }
}

/// Joins a relative, forward-slash path onto `base`, refusing anything that
/// could escape it.
pub fn safe_join(base: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if relative.is_empty() || rel.is_absolute() {
        return None;
    }
    for c in rel.components() {
        match c {
            Component::Normal(_) => {}
            _ => return None,
        }
    }
    Some(base.join(rel))
}

/// A flat directory holding one package's files.
#[derive(Debug, Clone)]
pub struct PackageStore {
    dir: PathBuf,
}

impl PackageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the directory exists and holds at least one entry.
    pub async fn is_populated(&self) -> bool {
        match fs::read_dir(&self.dir).await {
            Ok(mut rd) => matches!(rd.next_entry().await, Ok(Some(_))),
            Err(_) => false,
        }
    }

    fn path_of(&self, name: &str) -> io::Result<PathBuf> {
        safe_join(&self.dir, name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("unsafe file name `{name}`"))
        })
    }

    /// Reads a file; `Ok(None)` when it does not exist.
    pub async fn read(&self, name: &str) -> io::Result<Option<Bytes>> {
        let path = self.path_of(name)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Writes a file atomically (temp file + rename).
    pub async fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path_of(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".part");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &path).await
    }

    /// Whether the stored copy of `entry` is present and intact.
    pub async fn holds(&self, entry: &ManifestEntry) -> bool {
        let Ok(path) = self.path_of(&entry.name) else {
            return false;
        };
        match fs::metadata(&path).await {
            Ok(meta) if meta.len() == entry.size => {}
            _ => return false,
        }
        match fs::read(&path).await {
            Ok(data) => entry.matches(&data),
            Err(_) => false,
        }
    }

    /// Latest version recorded in this store, if any.
    pub async fn read_version(&self, package: &str) -> io::Result<Option<VersionToken>> {
        let raw = self.read(&version_file_name(package)).await?;
        Ok(raw
            .map(|b| String::from_utf8_lossy(&b).trim().to_string())
            .filter(|s| !s.is_empty())
            .map(VersionToken::new))
    }

    /// Content file names (bookkeeping files excluded), sorted.
    pub async fn list_content(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut rd = match fs::read_dir(&self.dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e),
        };
        while let Some(entry) = rd.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if is_manifest_file(&name) || name.ends_with(".part") {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }
}

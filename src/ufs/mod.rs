//! Under file system access.
//!
//! The namespace master never reads file data; it only needs to know what
//! exists in the storage mounted beneath it. [`UnderFileSystem`] is that
//! narrow view, and [`LocalUfs`] implements it over the local disk.

use std::fs;
use std::io;
use std::path::PathBuf;

/// Scheme prefix accepted by [`LocalUfs`].
pub const LOCAL_SCHEME: &str = "file://";

/// Status of one entry in the under file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UfsStatus {
    pub name: String,
    pub is_directory: bool,
    pub length: u64,
}

/// Read-only view of an under file system.
pub trait UnderFileSystem: Send + Sync {
    /// Whether anything exists at `path`.
    fn exists(&self, path: &str) -> io::Result<bool>;

    /// Status of the entry at `path`; `NotFound` if absent.
    fn status(&self, path: &str) -> io::Result<UfsStatus>;

    /// Entries directly under the directory at `path`, sorted by name.
    fn list(&self, path: &str) -> io::Result<Vec<UfsStatus>>;
}

/// Join a relative namespace remainder onto a UFS location.
pub fn join_ufs_path(base: &str, relative: &str) -> String {
    let relative = relative.trim_matches('/');
    if relative.is_empty() {
        return base.to_string();
    }
    if base.ends_with('/') {
        format!("{}{}", base, relative)
    } else {
        format!("{}/{}", base, relative)
    }
}

/// Whether `path` equals `prefix` or lies beneath it, comparing whole
/// components.
pub fn ufs_has_prefix(path: &str, prefix: &str) -> bool {
    let path = path.trim_end_matches('/');
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Under file system backed by the local disk.
///
/// Accepts plain absolute paths and `file://` URIs.
#[derive(Debug, Clone, Default)]
pub struct LocalUfs;

impl LocalUfs {
    pub fn new() -> Self {
        Self
    }

    fn local_path(path: &str) -> io::Result<PathBuf> {
        let stripped = path.strip_prefix(LOCAL_SCHEME).unwrap_or(path);
        if stripped.contains("://") {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported under storage scheme: {}", path),
            ));
        }
        if !stripped.starts_with('/') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("under storage path must be absolute: {}", path),
            ));
        }
        Ok(PathBuf::from(stripped))
    }

    fn to_status(name: String, meta: &fs::Metadata) -> UfsStatus {
        UfsStatus {
            name,
            is_directory: meta.is_dir(),
            length: if meta.is_dir() { 0 } else { meta.len() },
        }
    }
}

impl UnderFileSystem for LocalUfs {
    fn exists(&self, path: &str) -> io::Result<bool> {
        let local = Self::local_path(path)?;
        match fs::metadata(&local) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn status(&self, path: &str) -> io::Result<UfsStatus> {
        let local = Self::local_path(path)?;
        let meta = fs::metadata(&local)?;
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::to_status(name, &meta))
    }

    fn list(&self, path: &str) -> io::Result<Vec<UfsStatus>> {
        let local = Self::local_path(path)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(&local)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            entries.push(Self::to_status(
                entry.file_name().to_string_lossy().into_owned(),
                &meta,
            ));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

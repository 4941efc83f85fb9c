//! Mapping between namespace paths and under file system locations.

use crate::error::{MemspaceError, Result};
use crate::path::NsPath;
use crate::ufs::{join_ufs_path, ufs_has_prefix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of the mount table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInfo {
    pub ns_path: NsPath,
    pub ufs_path: String,
}

/// The mount table.
///
/// The root is always mounted on the configured UFS address. Non-root mount
/// points never nest inside each other and never share a UFS prefix.
pub struct MountTable {
    root_ufs: String,
    mounts: BTreeMap<NsPath, String>,
}

impl MountTable {
    pub fn new(root_ufs: impl Into<String>) -> Self {
        Self {
            root_ufs: root_ufs.into(),
            mounts: BTreeMap::new(),
        }
    }

    pub fn root_ufs(&self) -> &str {
        &self.root_ufs
    }

    /// Check that `(ns_path, ufs_path)` could be added without conflict.
    pub fn check_add(&self, ns_path: &NsPath, ufs_path: &str) -> Result<()> {
        if ns_path.is_root() || self.mounts.contains_key(ns_path) {
            return Err(MemspaceError::MountPointConflict(format!(
                "mount: {} is already a mount point",
                ns_path
            )));
        }
        for (existing, existing_ufs) in &self.mounts {
            if ns_path.has_prefix(existing) || existing.has_prefix(ns_path) {
                return Err(MemspaceError::MountPointConflict(format!(
                    "mount: {} nests with mount point {}",
                    ns_path, existing
                )));
            }
            if ufs_has_prefix(ufs_path, existing_ufs) || ufs_has_prefix(existing_ufs, ufs_path) {
                return Err(MemspaceError::MountPointConflict(format!(
                    "mount: {} overlaps {} mounted at {}",
                    ufs_path, existing_ufs, existing
                )));
            }
        }
        Ok(())
    }

    pub fn add(&mut self, ns_path: NsPath, ufs_path: impl Into<String>) -> Result<()> {
        let ufs_path = ufs_path.into();
        self.check_add(&ns_path, &ufs_path)?;
        self.mounts.insert(ns_path, ufs_path);
        Ok(())
    }

    /// Remove a non-root mount point, returning its UFS path.
    pub fn remove(&mut self, ns_path: &NsPath) -> Result<String> {
        if ns_path.is_root() {
            return Err(MemspaceError::InvalidPath(
                "unmount: the root mount point cannot be removed".to_string(),
            ));
        }
        self.mounts.remove(ns_path).ok_or_else(|| {
            MemspaceError::InvalidPath(format!("unmount: {} is not a mount point", ns_path))
        })
    }

    pub fn is_mount_point(&self, ns_path: &NsPath) -> bool {
        ns_path.is_root() || self.mounts.contains_key(ns_path)
    }

    /// Deepest mount point containing `path`.
    pub fn mount_point_of(&self, path: &NsPath) -> NsPath {
        self.mounts
            .keys()
            .filter(|mount| path.has_prefix(mount))
            .max_by_key(|mount| mount.depth())
            .cloned()
            .unwrap_or_else(NsPath::root)
    }

    /// Under file system location of a namespace path.
    pub fn resolve(&self, path: &NsPath) -> String {
        let mount = self.mount_point_of(path);
        let base = self
            .mounts
            .get(&mount)
            .map(String::as_str)
            .unwrap_or(&self.root_ufs);
        join_ufs_path(base, path.strip_prefix(&mount).unwrap_or(""))
    }

    /// A non-root mount point at or beneath `path`, if any.
    pub fn mount_under(&self, path: &NsPath) -> Option<&NsPath> {
        self.mounts.keys().find(|mount| mount.has_prefix(path))
    }

    /// All mount points, the root first.
    pub fn mounts(&self) -> Vec<MountInfo> {
        std::iter::once(MountInfo {
            ns_path: NsPath::root(),
            ufs_path: self.root_ufs.clone(),
        })
        .chain(self.mounts.iter().map(|(ns_path, ufs_path)| MountInfo {
            ns_path: ns_path.clone(),
            ufs_path: ufs_path.clone(),
        }))
        .collect()
    }
}

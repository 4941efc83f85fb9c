//! The namespace master.

use super::block_master::BlockMaster;
use super::inode::{FileState, Inode};
use super::mount_table::{MountInfo, MountTable};
use super::pinned::PinnedSet;
use super::tree::{InodeTree, NewInode};
use super::ttl::TtlIndex;
use crate::config::MasterConfig;
use crate::error::{MemspaceError, Result};
use crate::path::NsPath;
use crate::types::{
    millis_since_epoch, BlockId, BlockInfo, FileBlockInfo, FileId, FileInfo, Outcome, Refusal,
    ROOT_ID,
};
use crate::ufs::{join_ufs_path, UfsStatus, UnderFileSystem};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Namespace state guarded by one reader-writer lock.
struct Namespace {
    tree: InodeTree,
    mounts: MountTable,
    pinned: PinnedSet,
    ttl: TtlIndex,
}

impl Namespace {
    fn inode(&self, op: &str, id: FileId) -> Result<&Inode> {
        self.tree
            .get(id)
            .ok_or_else(|| MemspaceError::FileDoesNotExist(format!("{}: file id {}", op, id)))
    }

    fn inode_mut(&mut self, op: &str, id: FileId) -> Result<&mut Inode> {
        self.tree
            .get_mut(id)
            .ok_or_else(|| MemspaceError::FileDoesNotExist(format!("{}: file id {}", op, id)))
    }

    fn path(&self, op: &str, id: FileId) -> Result<NsPath> {
        self.tree
            .path_of(id)
            .ok_or_else(|| MemspaceError::FileDoesNotExist(format!("{}: file id {}", op, id)))
    }

    /// Files in the subtree rooted at `id`.
    fn files_under(&self, id: FileId) -> Vec<&Inode> {
        self.tree
            .descendants(id)
            .into_iter()
            .filter_map(|d| self.tree.get(d))
            .filter(|inode| !inode.is_directory())
            .collect()
    }
}

fn not_a_file(op: &str, id: FileId) -> MemspaceError {
    MemspaceError::InvalidPath(format!("{}: file id {} is a directory", op, id))
}

/// One UFS entry to import, with its namespace path.
struct UfsEntry {
    path: NsPath,
    ufs_path: String,
    status: UfsStatus,
}

/// Owner of the namespace: tree, mount table, pinned set and TTL index.
///
/// All operations are synchronous and may be called concurrently. Mutations
/// hold the namespace write lock for their whole duration, reads hold it
/// shared. The block master is only ever locked while the namespace lock is
/// held, never the other way round. UFS I/O happens outside the namespace
/// lock.
pub struct FileSystemMaster {
    namespace: RwLock<Namespace>,
    blocks: Arc<BlockMaster>,
    ufs: Arc<dyn UnderFileSystem>,
    default_block_size: u64,
}

impl FileSystemMaster {
    pub fn new(
        ufs_address: impl Into<String>,
        default_block_size: u64,
        ufs: Arc<dyn UnderFileSystem>,
        blocks: Arc<BlockMaster>,
    ) -> Self {
        let ufs_address = ufs_address.into();
        info!(ufs = %ufs_address, "Namespace master created");
        Self {
            namespace: RwLock::new(Namespace {
                tree: InodeTree::new(SystemTime::now()),
                mounts: MountTable::new(ufs_address),
                pinned: PinnedSet::new(),
                ttl: TtlIndex::new(),
            }),
            blocks,
            ufs,
            default_block_size: default_block_size.max(1),
        }
    }

    pub fn from_config(config: &MasterConfig, ufs: Arc<dyn UnderFileSystem>) -> Self {
        Self::new(
            config.ufs_address.clone(),
            config.default_block_size_bytes,
            ufs,
            Arc::new(BlockMaster::new()),
        )
    }

    pub fn block_master(&self) -> &Arc<BlockMaster> {
        &self.blocks
    }

    pub fn default_block_size(&self) -> u64 {
        self.default_block_size
    }

    /// Number of inodes, the root included.
    pub fn inode_count(&self) -> usize {
        self.namespace.read().tree.len()
    }

    // Lookups

    /// Id of the inode at `path`. Malformed paths are simply not found.
    pub fn get_file_id(&self, path: &str) -> Option<FileId> {
        let path = NsPath::parse(path).ok()?;
        self.namespace.read().tree.resolve(&path)
    }

    pub fn get_file_info(&self, id: FileId) -> Result<FileInfo> {
        let ns = self.namespace.read();
        ns.inode("get_file_info", id)?;
        self.file_info(&ns, id)
    }

    /// A directory's children in name order, or a file's own info.
    pub fn get_file_info_list(&self, id: FileId) -> Result<Vec<FileInfo>> {
        let ns = self.namespace.read();
        let inode = ns.inode("get_file_info_list", id)?;
        if !inode.is_directory() {
            return Ok(vec![self.file_info(&ns, id)?]);
        }
        ns.tree
            .children(id)
            .into_iter()
            .map(|child| self.file_info(&ns, child.id))
            .collect()
    }

    fn file_info(&self, ns: &Namespace, id: FileId) -> Result<FileInfo> {
        let inode = ns.inode("get_file_info", id)?;
        let path = ns.path("get_file_info", id)?;
        let ufs_path = ns.mounts.resolve(&path);

        let info = match inode.as_file() {
            Some(file) => {
                let in_memory_percentage = if file.block_ids.is_empty() {
                    100
                } else {
                    let cached = self.blocks.cached_count(&file.block_ids);
                    (cached * 100 / file.block_ids.len()) as u32
                };
                FileInfo {
                    file_id: id,
                    name: inode.name.clone(),
                    path: path.to_string(),
                    ufs_path,
                    length: file.length,
                    block_size_bytes: file.block_size_bytes,
                    creation_time_ms: millis_since_epoch(inode.creation_time),
                    last_modification_time_ms: millis_since_epoch(inode.last_modified),
                    is_directory: false,
                    is_completed: file.completed,
                    is_persisted: inode.persisted,
                    is_pinned: ns.pinned.contains(id),
                    ttl_ms: file.ttl.map(|ttl| ttl.as_millis() as u64),
                    block_ids: file.block_ids.clone(),
                    in_memory_percentage,
                }
            }
            None => FileInfo {
                file_id: id,
                name: inode.name.clone(),
                path: path.to_string(),
                ufs_path,
                length: 0,
                block_size_bytes: 0,
                creation_time_ms: millis_since_epoch(inode.creation_time),
                last_modification_time_ms: millis_since_epoch(inode.last_modified),
                is_directory: true,
                is_completed: true,
                is_persisted: inode.persisted,
                is_pinned: ns.pinned.contains(id),
                ttl_ms: None,
                block_ids: Vec::new(),
                in_memory_percentage: 0,
            },
        };
        Ok(info)
    }

    // File lifecycle

    /// Create an empty open file.
    pub fn create(
        &self,
        path: &str,
        block_size_bytes: u64,
        recursive: bool,
        ttl: Option<Duration>,
    ) -> Result<FileId> {
        if block_size_bytes == 0 {
            return Err(MemspaceError::InvalidFileSize(format!(
                "create: {}: block size must be positive",
                path
            )));
        }
        let path = NsPath::parse(path)?;
        let now = SystemTime::now();

        let mut ns = self.namespace.write();
        let created = ns.tree.create_path(
            "create",
            &path,
            NewInode::File {
                block_size_bytes,
                ttl,
            },
            recursive,
            false,
            now,
        )?;
        let id = *created
            .last()
            .ok_or_else(|| MemspaceError::Internal(format!("create: {}: nothing created", path)))?;

        if let Some(ttl) = ttl {
            let expiry = millis_since_epoch(now).saturating_add(ttl.as_millis() as u64);
            ns.ttl.insert(id, expiry);
        }

        debug!(file_id = id, path = %path, block_size_bytes, "Created file");
        Ok(id)
    }

    /// Append a new block to an open file.
    pub fn get_new_block_id_for_file(&self, id: FileId) -> Result<BlockId> {
        let op = "get_new_block_id_for_file";
        let mut ns = self.namespace.write();
        let inode = ns.inode_mut(op, id)?;
        let file = inode.as_file_mut().ok_or_else(|| not_a_file(op, id))?;
        if file.completed {
            return Err(MemspaceError::InvalidState(format!(
                "{}: file id {} is already completed",
                op, id
            )));
        }
        let block_id = file.allocate_block(id)?;
        inode.touch(SystemTime::now());

        debug!(file_id = id, block = %block_id, "Allocated block");
        Ok(block_id)
    }

    /// Freeze a file's block list and length.
    pub fn complete_file(&self, id: FileId) -> Result<()> {
        let op = "complete_file";
        let mut ns = self.namespace.write();
        let inode = ns.inode_mut(op, id)?;
        let file = inode.as_file_mut().ok_or_else(|| not_a_file(op, id))?;
        if file.completed {
            return Err(MemspaceError::InvalidState(format!(
                "{}: file id {} is already completed",
                op, id
            )));
        }

        let mut length = 0u64;
        let last = file.block_ids.len().saturating_sub(1);
        for (index, block_id) in file.block_ids.iter().enumerate() {
            let block_length = self.blocks.block_length(*block_id).ok_or_else(|| {
                MemspaceError::BlockInfoUnavailable(format!(
                    "{}: file id {}: block {} was never committed",
                    op, id, block_id
                ))
            })?;
            let valid = if index < last {
                block_length == file.block_size_bytes
            } else {
                block_length <= file.block_size_bytes
            };
            if !valid {
                return Err(MemspaceError::InvalidFileSize(format!(
                    "{}: file id {}: block {} has {} bytes, block size is {}",
                    op, id, block_id, block_length, file.block_size_bytes
                )));
            }
            length += block_length;
        }

        file.completed = true;
        file.length = length;
        inode.touch(SystemTime::now());

        debug!(file_id = id, length, "Completed file");
        Ok(())
    }

    /// Mark a completed file as written to the under file system.
    pub fn persist_file(&self, id: FileId, length: u64) -> Result<()> {
        let op = "persist_file";
        let mut ns = self.namespace.write();
        let inode = ns.inode_mut(op, id)?;
        let recorded = match (inode.file_state(), inode.as_file()) {
            (Some(FileState::Open), _) => {
                return Err(MemspaceError::InvalidState(format!(
                    "{}: file id {} is not completed",
                    op, id
                )))
            }
            (Some(_), Some(file)) => file.length,
            _ => return Err(not_a_file(op, id)),
        };
        if recorded != length {
            return Err(MemspaceError::InvalidFileSize(format!(
                "{}: file id {}: length {} does not match recorded length {}",
                op, id, length, recorded
            )));
        }
        if inode.file_state() == Some(FileState::Persisted) {
            return Ok(());
        }

        inode.persisted = true;
        inode.touch(SystemTime::now());
        ns.tree.persist_ancestors(id);

        debug!(file_id = id, length, "Persisted file");
        Ok(())
    }

    // Namespace mutations

    /// Delete a file or directory.
    pub fn delete_file(&self, id: FileId, recursive: bool) -> Result<Outcome> {
        let mut ns = self.namespace.write();
        self.delete_locked(&mut ns, "delete_file", id, recursive)
    }

    fn delete_locked(
        &self,
        ns: &mut Namespace,
        op: &str,
        id: FileId,
        recursive: bool,
    ) -> Result<Outcome> {
        let inode = ns.inode(op, id)?;
        if id == ROOT_ID {
            warn!(op, "Refusing to delete the root directory");
            return Ok(Outcome::Refused(Refusal::RootDirectory));
        }
        let path = ns.path(op, id)?;
        if let Some(mount) = ns.mounts.mount_under(&path) {
            warn!(op, path = %path, mount = %mount, "Refusing to delete a mount point");
            return Ok(Outcome::Refused(Refusal::MountPoint(mount.to_string())));
        }
        if inode.has_children() && !recursive {
            return Err(MemspaceError::DirectoryNotEmpty(format!("{}: {}", op, path)));
        }

        let removed = ns.tree.remove_subtree(id, SystemTime::now());
        let mut block_ids = Vec::new();
        for inode in &removed {
            ns.pinned.unpin(inode.id);
            ns.ttl.remove(inode.id);
            if let Some(file) = inode.as_file() {
                block_ids.extend_from_slice(&file.block_ids);
            }
        }
        self.blocks.remove_blocks(&block_ids);

        debug!(op, path = %path, removed = removed.len(), "Deleted");
        Ok(Outcome::Applied)
    }

    /// Move `id` to `dst_path`.
    pub fn rename(&self, id: FileId, dst_path: &str) -> Result<Outcome> {
        let op = "rename";
        let dst = NsPath::parse(dst_path)?;
        let mut ns = self.namespace.write();

        ns.inode(op, id)?;
        if id == ROOT_ID {
            warn!(op, "Refusing to rename the root directory");
            return Ok(Outcome::Refused(Refusal::RootDirectory));
        }
        let src = ns.path(op, id)?;
        if src == dst {
            return Ok(Outcome::Applied);
        }
        if dst.is_descendant_of(&src) {
            return Err(MemspaceError::InvalidPath(format!(
                "{}: cannot move {} beneath itself to {}",
                op, src, dst
            )));
        }
        if let Some(mount) = ns.mounts.mount_under(&src) {
            warn!(op, src = %src, mount = %mount, "Refusing to rename a mount point");
            return Ok(Outcome::Refused(Refusal::MountPoint(mount.to_string())));
        }
        let src_mount = ns.mounts.mount_point_of(&src);
        let dst_mount = ns.mounts.mount_point_of(&dst);
        if src_mount != dst_mount {
            warn!(op, src = %src, dst = %dst, "Refusing to rename across mount points");
            return Ok(Outcome::Refused(Refusal::CrossMount(dst_mount.to_string())));
        }
        if ns.tree.resolve(&dst).is_some() {
            return Err(MemspaceError::FileAlreadyExists(format!("{}: {}", op, dst)));
        }

        let dst_parent = dst.parent().ok_or_else(|| {
            MemspaceError::InvalidPath(format!("{}: {} has no parent", op, dst))
        })?;
        let parent_id = ns.tree.resolve(&dst_parent).ok_or_else(|| {
            MemspaceError::InvalidPath(format!(
                "{}: parent directory {} does not exist",
                op, dst_parent
            ))
        })?;
        if !ns.inode(op, parent_id)?.is_directory() {
            return Err(MemspaceError::InvalidPath(format!(
                "{}: {} is not a directory",
                op, dst_parent
            )));
        }

        ns.tree
            .move_inode(id, parent_id, dst.name(), SystemTime::now());

        debug!(file_id = id, src = %src, dst = %dst, "Renamed");
        Ok(Outcome::Applied)
    }

    /// Create a directory.
    pub fn mkdir(&self, path: &str, recursive: bool) -> Result<FileId> {
        let path = NsPath::parse(path)?;
        let mut ns = self.namespace.write();
        let created = ns.tree.create_path(
            "mkdir",
            &path,
            NewInode::Directory,
            recursive,
            false,
            SystemTime::now(),
        )?;
        let id = *created
            .last()
            .ok_or_else(|| MemspaceError::Internal(format!("mkdir: {}: nothing created", path)))?;

        debug!(file_id = id, path = %path, "Created directory");
        Ok(id)
    }

    // Pinning and caching

    /// Pin or unpin a file, or every file currently under a directory.
    pub fn set_pinned(&self, id: FileId, pinned: bool) -> Result<()> {
        let mut ns = self.namespace.write();
        ns.inode("set_pinned", id)?;

        let files: Vec<FileId> = ns.files_under(id).iter().map(|inode| inode.id).collect();
        for file_id in &files {
            if pinned {
                ns.pinned.pin(*file_id);
            } else {
                ns.pinned.unpin(*file_id);
            }
        }

        debug!(file_id = id, pinned, files = files.len(), "Updated pin state");
        Ok(())
    }

    /// Current pinned file ids, ordered.
    pub fn get_pin_id_list(&self) -> BTreeSet<FileId> {
        self.namespace.read().pinned.snapshot()
    }

    /// Ask workers to drop cached copies of every block in scope.
    pub fn free(&self, id: FileId, recursive: bool) -> Result<Outcome> {
        let op = "free";
        let ns = self.namespace.read();
        let inode = ns.inode(op, id)?;
        if inode.has_children() && !recursive {
            let path = ns.path(op, id)?;
            return Err(MemspaceError::DirectoryNotEmpty(format!("{}: {}", op, path)));
        }

        let files = ns.files_under(id);
        if let Some(pinned) = files.iter().find(|f| ns.pinned.contains(f.id)) {
            let path = ns.path(op, pinned.id)?;
            warn!(op, path = %path, "Refusing to free a pinned file");
            return Ok(Outcome::Refused(Refusal::Pinned(path.to_string())));
        }

        let block_ids: Vec<BlockId> = files
            .iter()
            .filter_map(|f| f.as_file())
            .flat_map(|f| f.block_ids.iter().copied())
            .collect();
        self.blocks.free_blocks(&block_ids);

        debug!(file_id = id, blocks = block_ids.len(), "Freed");
        Ok(Outcome::Applied)
    }

    // Mount table

    /// Mount `ufs_path` at `ns_path`.
    pub fn mount(&self, ns_path: &str, ufs_path: &str) -> Result<()> {
        let op = "mount";
        let path = NsPath::parse(ns_path)?;
        self.namespace.read().mounts.check_add(&path, ufs_path)?;

        let exists = self
            .ufs
            .exists(ufs_path)
            .map_err(|e| MemspaceError::storage(format!("{}: {}", op, ufs_path), e))?;
        if !exists {
            return Err(MemspaceError::storage(
                format!("{}: {}", op, ufs_path),
                io::Error::new(io::ErrorKind::NotFound, "under storage path does not exist"),
            ));
        }

        let mut ns = self.namespace.write();
        ns.mounts.check_add(&path, ufs_path)?;
        match ns.tree.resolve(&path) {
            Some(id) => {
                let inode = ns.inode_mut(op, id)?;
                if !inode.is_directory() || inode.has_children() {
                    return Err(MemspaceError::MountPointConflict(format!(
                        "{}: {} exists and is not an empty directory",
                        op, path
                    )));
                }
                inode.persisted = true;
                ns.tree.persist_ancestors(id);
            }
            None => {
                let created = ns.tree.create_path(
                    op,
                    &path,
                    NewInode::Directory,
                    true,
                    true,
                    SystemTime::now(),
                )?;
                if let Some(id) = created.last() {
                    ns.tree.persist_ancestors(*id);
                }
            }
        }
        ns.mounts.add(path.clone(), ufs_path)?;

        info!(path = %path, ufs = ufs_path, "Mounted");
        Ok(())
    }

    /// Remove a mount point and the metadata beneath it.
    pub fn unmount(&self, ns_path: &str) -> Result<()> {
        let op = "unmount";
        let path = NsPath::parse(ns_path)?;
        let mut ns = self.namespace.write();
        let ufs_path = ns.mounts.remove(&path)?;

        if let Some(id) = ns.tree.resolve(&path) {
            let removed = ns.tree.remove_subtree(id, SystemTime::now());
            let mut block_ids = Vec::new();
            for inode in &removed {
                ns.pinned.unpin(inode.id);
                ns.ttl.remove(inode.id);
                if let Some(file) = inode.as_file() {
                    block_ids.extend_from_slice(&file.block_ids);
                }
            }
            self.blocks.remove_blocks(&block_ids);
        }

        info!(op, path = %path, ufs = %ufs_path, "Unmounted");
        Ok(())
    }

    pub fn get_ufs_address(&self) -> String {
        self.namespace.read().mounts.root_ufs().to_string()
    }

    pub fn get_mount_points(&self) -> Vec<MountInfo> {
        self.namespace.read().mounts.mounts()
    }

    // Under file system import

    /// Bring metadata for `path` in from the under file system.
    ///
    /// An existing file returns its id. A directory has its absent immediate
    /// children imported, recursing into subdirectories when `recursive`. An
    /// absent path is imported together with its missing ancestors.
    ///
    /// Fails with `MountPointConflict` if a mount or unmount changed where
    /// `path` resolves while the under storage was being listed.
    pub fn load_file_info_from_ufs(&self, path: &str, recursive: bool) -> Result<FileId> {
        let op = "load_file_info_from_ufs";
        let path = NsPath::parse(path)?;

        let (existing, ufs_path) = {
            let ns = self.namespace.read();
            let existing = ns.tree.resolve(&path);
            if let Some(id) = existing {
                if !ns.inode(op, id)?.is_directory() {
                    return Ok(id);
                }
            }
            (existing, ns.mounts.resolve(&path))
        };

        let status = match self.ufs.status(&ufs_path) {
            Ok(status) => status,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return match existing {
                    Some(id) => Ok(id),
                    None => Err(MemspaceError::FileDoesNotExist(format!(
                        "{}: {} (under storage {})",
                        op, path, ufs_path
                    ))),
                };
            }
            Err(e) => return Err(MemspaceError::storage(format!("{}: {}", op, ufs_path), e)),
        };

        let entries = if status.is_directory {
            self.list_ufs(&path, &ufs_path, recursive)?
        } else {
            Vec::new()
        };

        let mut ns = self.namespace.write();
        // The mount table may have changed while the listing ran unlocked.
        let current = ns.mounts.resolve(&path);
        if current != ufs_path {
            return Err(MemspaceError::MountPointConflict(format!(
                "{}: {} now maps to {}, listed {}",
                op, path, current, ufs_path
            )));
        }
        let id = match ns.tree.resolve(&path) {
            Some(id) => id,
            None => self.import_entry(&mut ns, &path, &status)?,
        };
        let mut imported = 0usize;
        for entry in &entries {
            if ns.tree.resolve(&entry.path).is_some() {
                continue;
            }
            if ns.mounts.resolve(&entry.path) != entry.ufs_path {
                debug!(path = %entry.path, "Skipped entry shadowed by a new mount");
                continue;
            }
            match self.import_entry(&mut ns, &entry.path, &entry.status) {
                Ok(_) => imported += 1,
                Err(e) => debug!(path = %entry.path, error = %e, "Skipped under storage entry"),
            }
        }

        debug!(path = %path, imported, "Loaded metadata from under storage");
        Ok(id)
    }

    /// Walk the UFS directory at `ufs_path`, parents before children.
    fn list_ufs(&self, path: &NsPath, ufs_path: &str, recursive: bool) -> Result<Vec<UfsEntry>> {
        let mut entries = Vec::new();
        let mut pending = vec![(path.clone(), ufs_path.to_string())];
        while let Some((dir, dir_ufs)) = pending.pop() {
            let listing = self.ufs.list(&dir_ufs).map_err(|e| {
                MemspaceError::storage(format!("load_file_info_from_ufs: list {}", dir_ufs), e)
            })?;
            for status in listing {
                let child = dir.join(&status.name)?;
                let child_ufs = join_ufs_path(&dir_ufs, &status.name);
                if recursive && status.is_directory {
                    pending.push((child.clone(), child_ufs.clone()));
                }
                entries.push(UfsEntry {
                    path: child,
                    ufs_path: child_ufs,
                    status,
                });
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Create one imported inode, with persisted ancestors.
    fn import_entry(&self, ns: &mut Namespace, path: &NsPath, status: &UfsStatus) -> Result<FileId> {
        let op = "load_file_info_from_ufs";
        let now = SystemTime::now();
        let new = if status.is_directory {
            NewInode::Directory
        } else {
            NewInode::File {
                block_size_bytes: self.default_block_size,
                ttl: None,
            }
        };
        let created = ns.tree.create_path(op, path, new, true, true, now)?;
        let id = *created
            .last()
            .ok_or_else(|| MemspaceError::Internal(format!("{}: {}: nothing created", op, path)))?;
        ns.tree.persist_ancestors(id);

        let inode = ns.inode_mut(op, id)?;
        if let Some(file) = inode.as_file_mut() {
            let block_count = status.length.div_ceil(file.block_size_bytes);
            for _ in 0..block_count {
                file.allocate_block(id)?;
            }
            file.length = status.length;
            file.completed = true;
        }
        Ok(id)
    }

    // Blocks

    /// Mark every block of a file lost.
    pub fn report_lost_file(&self, id: FileId) -> Result<()> {
        let op = "report_lost_file";
        let ns = self.namespace.read();
        let inode = ns.inode(op, id)?;
        let file = inode.as_file().ok_or_else(|| not_a_file(op, id))?;
        self.blocks.report_lost(&file.block_ids);

        warn!(file_id = id, blocks = file.block_ids.len(), "File reported lost");
        Ok(())
    }

    /// Ids of existing files with at least one lost block.
    pub fn get_lost_files(&self) -> Vec<FileId> {
        let ns = self.namespace.read();
        let lost: BTreeSet<FileId> = self
            .blocks
            .lost_blocks()
            .into_iter()
            .map(|block| block.container_id())
            .filter(|id| {
                ns.tree
                    .get(*id)
                    .map(|inode| !inode.is_directory())
                    .unwrap_or(false)
            })
            .collect();
        lost.into_iter().collect()
    }

    pub fn get_file_block_info(&self, id: FileId, index: usize) -> Result<FileBlockInfo> {
        let op = "get_file_block_info";
        let ns = self.namespace.read();
        self.block_info_locked(&ns, op, id, index)
    }

    pub fn get_file_block_info_list(&self, id: FileId) -> Result<Vec<FileBlockInfo>> {
        let op = "get_file_block_info_list";
        let ns = self.namespace.read();
        let inode = ns.inode(op, id)?;
        let file = inode.as_file().ok_or_else(|| not_a_file(op, id))?;
        (0..file.block_ids.len())
            .map(|index| self.block_info_locked(&ns, op, id, index))
            .collect()
    }

    fn block_info_locked(
        &self,
        ns: &Namespace,
        op: &str,
        id: FileId,
        index: usize,
    ) -> Result<FileBlockInfo> {
        let inode = ns.inode(op, id)?;
        let file = inode.as_file().ok_or_else(|| not_a_file(op, id))?;
        let block_id = *file.block_ids.get(index).ok_or_else(|| {
            MemspaceError::BlockInfoUnavailable(format!(
                "{}: file id {} has {} blocks, no block {}",
                op,
                id,
                file.block_ids.len(),
                index
            ))
        })?;
        let offset = file.block_offset(index);

        let ufs_locations = if inode.persisted {
            let path = ns.path(op, id)?;
            vec![ns.mounts.resolve(&path)]
        } else {
            Vec::new()
        };

        let block_info = match self.blocks.block_info(block_id) {
            Some(info) => info,
            None if inode.persisted => BlockInfo {
                block_id,
                length: file
                    .length
                    .saturating_sub(offset)
                    .min(file.block_size_bytes),
                locations: Vec::new(),
            },
            None => {
                return Err(MemspaceError::BlockInfoUnavailable(format!(
                    "{}: file id {}: block {} was never committed",
                    op, id, block_id
                )))
            }
        };

        Ok(FileBlockInfo {
            block_info,
            offset,
            ufs_locations,
        })
    }

    // TTL

    /// Delete every file whose TTL has elapsed at `now`.
    pub fn expire_ttl_files(&self, now: SystemTime) -> Vec<FileId> {
        let mut ns = self.namespace.write();
        let expired = ns.ttl.expired(millis_since_epoch(now));

        let mut deleted = Vec::new();
        for id in expired {
            ns.ttl.remove(id);
            match self.delete_locked(&mut ns, "expire_ttl_files", id, false) {
                Ok(Outcome::Applied) => deleted.push(id),
                Ok(Outcome::Refused(reason)) => {
                    warn!(file_id = id, %reason, "Expired file not deleted")
                }
                Err(e) => warn!(file_id = id, error = %e, "Expired file not deleted"),
            }
        }
        deleted
    }
}

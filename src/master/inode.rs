//! Namespace tree nodes.

use crate::error::{MemspaceError, Result};
use crate::types::{BlockId, FileId};
use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

/// Lifecycle of a file's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Blocks may still be appended.
    Open,
    /// Block list and length are frozen.
    Completed,
    /// Completed and written to the under file system.
    Persisted,
}

/// File-specific inode data.
#[derive(Debug, Clone)]
pub struct FileInode {
    pub block_size_bytes: u64,
    pub block_ids: Vec<BlockId>,
    pub completed: bool,
    /// Valid once completed.
    pub length: u64,
    pub ttl: Option<Duration>,
}

impl FileInode {
    pub fn new(block_size_bytes: u64, ttl: Option<Duration>) -> Self {
        Self {
            block_size_bytes,
            block_ids: Vec::new(),
            completed: false,
            length: 0,
            ttl,
        }
    }

    /// Append the next block id of file `file_id`.
    pub fn allocate_block(&mut self, file_id: FileId) -> Result<BlockId> {
        let block_id = next_block_id(file_id, self.block_ids.len() as u64)?;
        self.block_ids.push(block_id);
        Ok(block_id)
    }

    /// Byte offset of the block at `index`.
    pub fn block_offset(&self, index: usize) -> u64 {
        index as u64 * self.block_size_bytes
    }
}

/// Block id at position `sequence` of file `file_id`, if one is left.
fn next_block_id(file_id: FileId, sequence: u64) -> Result<BlockId> {
    if sequence >= BlockId::MAX_BLOCKS_PER_FILE {
        return Err(MemspaceError::InvalidState(format!(
            "get_new_block_id_for_file: file {} has no block ids left",
            file_id
        )));
    }
    BlockId::try_new(file_id, sequence).ok_or_else(|| {
        MemspaceError::InvalidState(format!(
            "get_new_block_id_for_file: file id {} is beyond the block id range",
            file_id
        ))
    })
}

/// Directory-specific inode data.
#[derive(Debug, Clone, Default)]
pub struct DirectoryInode {
    /// Children by name, kept in name order.
    pub children: BTreeMap<String, FileId>,
}

#[derive(Debug, Clone)]
pub enum InodeKind {
    File(FileInode),
    Directory(DirectoryInode),
}

/// A file or directory in the namespace tree.
#[derive(Debug, Clone)]
pub struct Inode {
    pub id: FileId,
    pub name: String,
    /// Parent inode; the root is its own parent.
    pub parent_id: FileId,
    pub creation_time: SystemTime,
    pub last_modified: SystemTime,
    pub persisted: bool,
    pub kind: InodeKind,
}

impl Inode {
    pub fn new_file(
        id: FileId,
        name: String,
        parent_id: FileId,
        block_size_bytes: u64,
        ttl: Option<Duration>,
        now: SystemTime,
    ) -> Self {
        Self {
            id,
            name,
            parent_id,
            creation_time: now,
            last_modified: now,
            persisted: false,
            kind: InodeKind::File(FileInode::new(block_size_bytes, ttl)),
        }
    }

    pub fn new_directory(id: FileId, name: String, parent_id: FileId, now: SystemTime) -> Self {
        Self {
            id,
            name,
            parent_id,
            creation_time: now,
            last_modified: now,
            persisted: false,
            kind: InodeKind::Directory(DirectoryInode::default()),
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, InodeKind::Directory(_))
    }

    pub fn as_file(&self) -> Option<&FileInode> {
        match &self.kind {
            InodeKind::File(f) => Some(f),
            InodeKind::Directory(_) => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileInode> {
        match &mut self.kind {
            InodeKind::File(f) => Some(f),
            InodeKind::Directory(_) => None,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryInode> {
        match &self.kind {
            InodeKind::Directory(d) => Some(d),
            InodeKind::File(_) => None,
        }
    }

    pub fn as_directory_mut(&mut self) -> Option<&mut DirectoryInode> {
        match &mut self.kind {
            InodeKind::Directory(d) => Some(d),
            InodeKind::File(_) => None,
        }
    }

    /// State of a file's contents; `None` for directories.
    pub fn file_state(&self) -> Option<FileState> {
        let file = self.as_file()?;
        Some(match (file.completed, self.persisted) {
            (false, _) => FileState::Open,
            (true, false) => FileState::Completed,
            (true, true) => FileState::Persisted,
        })
    }

    /// True for a directory with at least one child.
    pub fn has_children(&self) -> bool {
        self.as_directory()
            .map(|d| !d.children.is_empty())
            .unwrap_or(false)
    }

    /// Update modification time.
    pub fn touch(&mut self, now: SystemTime) {
        if now > self.last_modified {
            self.last_modified = now;
        }
    }
}

//! In-memory namespace hierarchy.

use super::inode::Inode;
use crate::error::{MemspaceError, Result};
use crate::path::NsPath;
use crate::types::{FileId, ROOT_ID};
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// What [`InodeTree::create_path`] should create at the end of the path.
#[derive(Debug, Clone, Copy)]
pub enum NewInode {
    File {
        block_size_bytes: u64,
        ttl: Option<Duration>,
    },
    Directory,
}

/// The namespace tree.
///
/// Every non-root inode has exactly one existing parent, names are unique
/// within a directory, and ids are handed out in increasing order and never
/// reused.
pub struct InodeTree {
    inodes: HashMap<FileId, Inode>,
    /// Next inode ID to allocate.
    next_id: FileId,
}

impl InodeTree {
    /// Create a tree holding only the (persisted) root directory.
    pub fn new(now: SystemTime) -> Self {
        let mut root = Inode::new_directory(ROOT_ID, String::new(), ROOT_ID, now);
        root.persisted = true;

        let mut inodes = HashMap::new();
        inodes.insert(ROOT_ID, root);

        Self {
            inodes,
            next_id: ROOT_ID + 1,
        }
    }

    fn allocate_id(&mut self) -> FileId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    pub fn get(&self, id: FileId) -> Option<&Inode> {
        self.inodes.get(&id)
    }

    pub fn get_mut(&mut self, id: FileId) -> Option<&mut Inode> {
        self.inodes.get_mut(&id)
    }

    pub fn lookup_child(&self, parent: FileId, name: &str) -> Option<FileId> {
        self.inodes
            .get(&parent)?
            .as_directory()?
            .children
            .get(name)
            .copied()
    }

    /// Children of a directory in name order; empty for files.
    pub fn children(&self, id: FileId) -> Vec<&Inode> {
        match self.inodes.get(&id).and_then(|i| i.as_directory()) {
            Some(dir) => dir
                .children
                .values()
                .filter_map(|child| self.inodes.get(child))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn resolve(&self, path: &NsPath) -> Option<FileId> {
        let mut current = ROOT_ID;
        for name in path.components() {
            current = self.lookup_child(current, name)?;
        }
        Some(current)
    }

    /// Absolute path of an inode.
    pub fn path_of(&self, id: FileId) -> Option<NsPath> {
        let mut names = Vec::new();
        let mut current = self.inodes.get(&id)?;
        while current.id != ROOT_ID {
            names.push(current.name.as_str());
            current = self.inodes.get(&current.parent_id)?;
        }

        let mut path = NsPath::root();
        for name in names.iter().rev() {
            path = path.join(name).ok()?;
        }
        Some(path)
    }

    /// Create `path`, and its missing ancestors when `recursive`.
    ///
    /// Validates the whole path before touching the tree, so on error nothing
    /// has changed. Returns the ids created, outermost first; the last one is
    /// the target.
    pub fn create_path(
        &mut self,
        op: &str,
        path: &NsPath,
        new: NewInode,
        recursive: bool,
        persisted: bool,
        now: SystemTime,
    ) -> Result<Vec<FileId>> {
        let components: Vec<&str> = path.components().collect();
        if components.is_empty() {
            return Err(MemspaceError::FileAlreadyExists(format!("{}: {}", op, path)));
        }

        let mut parent = ROOT_ID;
        let mut existing = 0;
        for name in &components {
            match self.lookup_child(parent, name) {
                Some(child) => {
                    parent = child;
                    existing += 1;
                }
                None => break,
            }
        }

        if existing == components.len() {
            return Err(MemspaceError::FileAlreadyExists(format!("{}: {}", op, path)));
        }
        let parent_is_directory = self
            .inodes
            .get(&parent)
            .map(|p| p.is_directory())
            .unwrap_or(false);
        if !parent_is_directory {
            return Err(MemspaceError::InvalidPath(format!(
                "{}: {}: ancestor is a file",
                op, path
            )));
        }
        if existing + 1 < components.len() && !recursive {
            return Err(MemspaceError::InvalidPath(format!(
                "{}: {}: parent directory does not exist",
                op, path
            )));
        }

        let mut created = Vec::with_capacity(components.len() - existing);
        for (offset, name) in components[existing..].iter().enumerate() {
            let is_target = existing + offset + 1 == components.len();
            let id = self.allocate_id();
            let mut inode = match new {
                NewInode::File {
                    block_size_bytes,
                    ttl,
                } if is_target => {
                    Inode::new_file(id, name.to_string(), parent, block_size_bytes, ttl, now)
                }
                _ => Inode::new_directory(id, name.to_string(), parent, now),
            };
            inode.persisted = persisted;
            self.attach(parent, inode, now);
            parent = id;
            created.push(id);
        }

        debug!(path = %path, created = created.len(), "Created path");
        Ok(created)
    }

    fn attach(&mut self, parent: FileId, inode: Inode, now: SystemTime) {
        if let Some(parent_inode) = self.inodes.get_mut(&parent) {
            parent_inode.touch(now);
            if let Some(dir) = parent_inode.as_directory_mut() {
                dir.children.insert(inode.name.clone(), inode.id);
            }
        }
        self.inodes.insert(inode.id, inode);
    }

    fn detach(&mut self, id: FileId, now: SystemTime) {
        let (parent, name) = match self.inodes.get(&id) {
            Some(inode) => (inode.parent_id, inode.name.clone()),
            None => return,
        };
        if let Some(parent_inode) = self.inodes.get_mut(&parent) {
            parent_inode.touch(now);
            if let Some(dir) = parent_inode.as_directory_mut() {
                dir.children.remove(&name);
            }
        }
    }

    /// `id` and everything beneath it, parents before children.
    pub fn descendants(&self, id: FileId) -> Vec<FileId> {
        let mut out = Vec::new();
        if !self.inodes.contains_key(&id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(dir) = self.inodes.get(&current).and_then(|i| i.as_directory()) {
                // Reverse so children come out in name order.
                stack.extend(dir.children.values().rev().copied());
            }
        }
        out
    }

    /// Unlink and drop the subtree rooted at `id`. The root is never removed.
    pub fn remove_subtree(&mut self, id: FileId, now: SystemTime) -> Vec<Inode> {
        if id == ROOT_ID {
            return Vec::new();
        }
        let ids = self.descendants(id);
        self.detach(id, now);
        ids.into_iter()
            .filter_map(|inode_id| self.inodes.remove(&inode_id))
            .collect()
    }

    /// Re-parent and rename `id`. The caller has validated the move.
    pub fn move_inode(&mut self, id: FileId, new_parent: FileId, new_name: &str, now: SystemTime) {
        self.detach(id, now);
        let inode = match self.inodes.remove(&id) {
            Some(mut inode) => {
                inode.name = new_name.to_string();
                inode.parent_id = new_parent;
                inode.touch(now);
                inode
            }
            None => return,
        };
        self.attach(new_parent, inode, now);
    }

    /// Mark every ancestor of `id` persisted.
    pub fn persist_ancestors(&mut self, id: FileId) {
        let mut current = self.inodes.get(&id).map(|i| i.parent_id);
        while let Some(parent) = current {
            let inode = match self.inodes.get_mut(&parent) {
                Some(inode) => inode,
                None => break,
            };
            inode.persisted = true;
            current = if parent == ROOT_ID {
                None
            } else {
                Some(inode.parent_id)
            };
        }
    }
}

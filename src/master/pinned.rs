//! Files exempt from worker cache eviction.

use crate::types::FileId;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Default)]
pub struct PinnedSet {
    ids: HashSet<FileId>,
}

impl PinnedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the file was not pinned before.
    pub fn pin(&mut self, id: FileId) -> bool {
        self.ids.insert(id)
    }

    /// Returns true if the file was pinned.
    pub fn unpin(&mut self, id: FileId) -> bool {
        self.ids.remove(&id)
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ordered copy of the set.
    pub fn snapshot(&self) -> BTreeSet<FileId> {
        self.ids.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_unpin() {
        let mut pinned = PinnedSet::new();
        assert!(pinned.pin(7));
        assert!(!pinned.pin(7));
        assert!(pinned.pin(3));

        assert_eq!(pinned.snapshot().into_iter().collect::<Vec<_>>(), vec![3, 7]);

        assert!(pinned.unpin(7));
        assert!(!pinned.unpin(7));
        assert!(!pinned.contains(7));
        assert_eq!(pinned.len(), 1);
    }
}

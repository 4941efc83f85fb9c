//! Namespace master for memspace.
//!
//! This module holds the whole file system namespace in memory: the inode
//! tree, the mount table, the pinned set and TTL index, plus the block
//! bookkeeping workers report into. [`FileSystemMaster`] is the single entry
//! point; [`server`] exposes it over HTTP.

// No panics while the namespace lock is held.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod block_master;
mod file_system_master;
mod inode;
mod mount_table;
mod pinned;
pub mod protocol;
pub mod server;
mod tree;
mod ttl;

pub use block_master::{BlockMaster, WorkerCommand};
pub use file_system_master::FileSystemMaster;
pub use inode::FileState;
pub use mount_table::MountInfo;
pub use server::{router, run_master_server};
pub use ttl::TtlChecker;

//! Command-line interface for memspace.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// memspace - in-memory namespace master for a tiered file system.
#[derive(Parser)]
#[command(name = "memspace")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MEMSPACE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MEMSPACE_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start the namespace master
    Master {
        /// Bind address for the master API
        #[arg(long)]
        bind_addr: Option<String>,

        /// Under storage location mounted at the namespace root
        #[arg(long)]
        ufs_address: Option<String>,
    },

    /// Start a worker
    Worker {
        /// Bind address for the worker session API
        #[arg(long)]
        bind_addr: Option<String>,

        /// Master to register with
        #[arg(short, long, env = "MEMSPACE_MASTER")]
        master: Option<String>,
    },

    /// File operations against a running master
    Fs {
        /// Master address
        #[arg(short, long, env = "MEMSPACE_MASTER", default_value = "127.0.0.1:19998")]
        master: String,

        #[command(subcommand)]
        command: FsCommands,
    },

    /// Show version information
    Version,
}

/// File system subcommands.
#[derive(Subcommand)]
pub enum FsCommands {
    /// List directory contents
    Ls {
        /// Path to list
        #[arg(default_value = "/")]
        path: String,

        /// Long format
        #[arg(short, long)]
        long: bool,
    },

    /// Show file/directory info
    Stat {
        /// Path to stat
        path: String,
    },

    /// Create a directory
    Mkdir {
        /// Path to create
        path: String,

        /// Create parent directories
        #[arg(short, long)]
        parents: bool,
    },

    /// Create an empty, completed file
    Touch {
        /// Path to create
        path: String,

        /// Block size in bytes
        #[arg(long, default_value_t = 64 * 1024 * 1024)]
        block_size: u64,

        /// Delete the file after this long, e.g. "30s"
        #[arg(long)]
        ttl: Option<String>,

        /// Create parent directories
        #[arg(short, long)]
        parents: bool,
    },

    /// Remove a file or directory
    Rm {
        /// Path to remove
        path: String,

        /// Remove directories recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// Move or rename a file or directory
    Mv {
        /// Source path
        src: String,

        /// Destination path
        dst: String,
    },

    /// Pin a file or directory in worker memory
    Pin {
        path: String,
    },

    /// Unpin a file or directory
    Unpin {
        path: String,
    },

    /// Evict a file or directory from worker memory
    Free {
        path: String,

        /// Free directories recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// Mount an under storage path into the namespace
    Mount {
        /// Namespace path
        path: String,

        /// Under storage path
        ufs_path: String,
    },

    /// Remove a mount point
    Unmount {
        path: String,
    },

    /// Import metadata for an under storage path
    Load {
        path: String,

        /// Import whole subtrees
        #[arg(short, long)]
        recursive: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

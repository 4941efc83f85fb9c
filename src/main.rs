//! memspace CLI - Main entry point.

use memspace::cli::{Cli, Commands, FsCommands};
use memspace::client::MasterClient;
use memspace::config::{humantime_serde::parse_duration, MemspaceConfig};
use memspace::types::{FileId, FileInfo, Outcome};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Master {
            bind_addr,
            ufs_address,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(addr) = bind_addr {
                config.master.bind_addr = addr.parse()?;
            }
            if let Some(ufs_address) = ufs_address {
                config.master.ufs_address = ufs_address;
            }
            if let Some(level) = cli.log_level {
                config.observability.log_level = level;
            }

            memspace::run(config).await?;
        }

        Commands::Worker { bind_addr, master } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(addr) = bind_addr {
                config.worker.bind_addr = addr.parse()?;
            }
            if let Some(addr) = master {
                config.worker.master_addr = addr.parse()?;
            }
            if let Some(level) = cli.log_level {
                config.observability.log_level = level;
            }

            memspace::run_worker(config).await?;
        }

        Commands::Fs { master, command } => {
            let client = MasterClient::from_addr(&master)?;
            run_fs(&client, command).await?;
        }

        Commands::Version => {
            println!("memspace v{}", env!("CARGO_PKG_VERSION"));
            println!("In-memory namespace master for a tiered distributed file system");
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MemspaceConfig> {
    Ok(match path {
        Some(path) => MemspaceConfig::from_file(path)?,
        None => MemspaceConfig::default(),
    })
}

async fn run_fs(client: &MasterClient, command: FsCommands) -> anyhow::Result<()> {
    match command {
        FsCommands::Ls { path, long } => {
            let id = resolve_path(client, &path).await?;
            for info in client.get_file_info_list(id).await? {
                if long {
                    print_long(&info);
                } else {
                    println!("{}", info.name);
                }
            }
        }
        FsCommands::Stat { path } => {
            let id = resolve_path(client, &path).await?;
            let info = client.get_file_info(id).await?;
            println!("  Path: {}", info.path);
            println!("  Id: {}", info.file_id);
            println!(
                "  Type: {}",
                if info.is_directory { "directory" } else { "file" }
            );
            println!("  UFS path: {}", info.ufs_path);
            println!("  Size: {}", info.length);
            println!("  Block size: {}", info.block_size_bytes);
            println!("  Blocks: {}", info.block_ids.len());
            println!("  Completed: {}", info.is_completed);
            println!("  Persisted: {}", info.is_persisted);
            println!("  Pinned: {}", info.is_pinned);
            println!("  In memory: {}%", info.in_memory_percentage);
            if let Some(ttl) = info.ttl_ms {
                println!("  TTL: {}ms", ttl);
            }
        }
        FsCommands::Mkdir { path, parents } => {
            let id = client.mkdir(&path, parents).await?;
            println!("Created directory: {} ({})", path, id);
        }
        FsCommands::Touch {
            path,
            block_size,
            ttl,
            parents,
        } => {
            let ttl = ttl
                .as_deref()
                .map(parse_duration)
                .transpose()
                .map_err(|e| anyhow::anyhow!("Invalid TTL: {}", e))?;
            let id = client.create(&path, block_size, parents, ttl).await?;
            client.complete_file(id).await?;
            println!("Created file: {} ({})", path, id);
        }
        FsCommands::Rm { path, recursive } => {
            let id = resolve_path(client, &path).await?;
            report(client.delete_file(id, recursive).await?, "Removed", &path);
        }
        FsCommands::Mv { src, dst } => {
            let id = resolve_path(client, &src).await?;
            report(client.rename(id, &dst).await?, "Moved", &src);
        }
        FsCommands::Pin { path } => {
            let id = resolve_path(client, &path).await?;
            client.set_pinned(id, true).await?;
            println!("Pinned: {}", path);
        }
        FsCommands::Unpin { path } => {
            let id = resolve_path(client, &path).await?;
            client.set_pinned(id, false).await?;
            println!("Unpinned: {}", path);
        }
        FsCommands::Free { path, recursive } => {
            let id = resolve_path(client, &path).await?;
            report(client.free(id, recursive).await?, "Freed", &path);
        }
        FsCommands::Mount { path, ufs_path } => {
            client.mount(&path, &ufs_path).await?;
            println!("Mounted {} at {}", ufs_path, path);
        }
        FsCommands::Unmount { path } => {
            client.unmount(&path).await?;
            println!("Unmounted: {}", path);
        }
        FsCommands::Load { path, recursive } => {
            let id = client.load_file_info_from_ufs(&path, recursive).await?;
            println!("Loaded: {} ({})", path, id);
        }
    }

    Ok(())
}

/// Resolve a path to a file id.
async fn resolve_path(client: &MasterClient, path: &str) -> anyhow::Result<FileId> {
    match client.get_file_id(path).await? {
        Some(id) => Ok(id),
        None => anyhow::bail!("Path not found: {}", path),
    }
}

fn print_long(info: &FileInfo) {
    let type_char = if info.is_directory { 'd' } else { '-' };
    let flags = format!(
        "{}{}{}",
        if info.is_persisted { 'p' } else { '-' },
        if info.is_pinned { 'P' } else { '-' },
        if info.is_completed { 'c' } else { '-' },
    );
    println!(
        "{}{}  {:>12}  {:>3}%  {}",
        type_char, flags, info.length, info.in_memory_percentage, info.name
    );
}

fn report(outcome: Outcome, verb: &str, path: &str) {
    match outcome {
        Outcome::Applied => println!("{}: {}", verb, path),
        Outcome::Refused(reason) => {
            eprintln!("Refused: {}", reason);
            std::process::exit(1);
        }
    }
}

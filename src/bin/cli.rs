//! IndexKV CLI
//!
//! Command-line interface over a file-backed indexed store.

use clap::{Parser, Subcommand};
use indexkv::{Config, FileStore, IndexedStore, Presence};
use tracing_subscriber::{fmt, EnvFilter};

/// IndexKV CLI
#[derive(Parser, Debug)]
#[command(name = "indexkv-cli")]
#[command(about = "CLI for the IndexKV indexed key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./indexkv_data")]
    data_dir: String,

    /// Registry document name
    #[arg(short, long, default_value = "async-storage-keys")]
    registry: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List live keys
    Keys,

    /// Show every registry entry, tombstones included
    Registry,

    /// Prune registry tombstones and compact the log
    Compact,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,indexkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .registry_name(&args.registry)
        .build();

    let file_store = FileStore::open(&config)?;
    tracing::debug!("Data directory: {}", file_store.data_dir().display());

    let (store, _) = IndexedStore::open(file_store, config).await?;

    match args.command {
        Commands::Get { key } => match store.get_item(&key).await? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            store.set_item(&key, value).await?;
            println!("OK");
        }
        Commands::Del { key } => {
            store.remove_item(&key).await?;
            println!("OK");
        }
        Commands::Keys => {
            for key in store.keys().await? {
                println!("{}", key);
            }
        }
        Commands::Registry => {
            let registry = store.registry().await?;
            for (key, presence) in registry.iter() {
                let flag = match presence {
                    Presence::Present => "present",
                    Presence::Tombstoned => "tombstoned",
                };
                println!("{}\t{}", key, flag);
            }
        }
        Commands::Compact => {
            let pruned = store.compact().await?;
            store.store().compact()?;
            // The registry document itself is one of the stored keys
            let live = store.store().len().saturating_sub(1);
            println!("pruned {} tombstone(s), {} live key(s)", pruned, live);
        }
    }

    Ok(())
}

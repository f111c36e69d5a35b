//! Inspect and extract files from a local installation.
//!
//! Usage:
//!   cargo run --example extract -p casclite-storage -- \
//!       --config casc.json extract "DBFilesClient\Map.dbc" out/Map.dbc --locale enUS
//!
//! The configuration is a JSON-serialized `StorageConfig`; it can also be
//! given through `CASCLITE_CONFIG`.

use anyhow::{Context, bail};
use casclite_storage::{CascHandler, LoadPhase, LocaleFlags, NamespaceNode, StorageConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "extract")]
struct Cli {
    /// Storage configuration (JSON)
    #[arg(long, env = "CASCLITE_CONFIG")]
    config: PathBuf,

    /// Locale used for lookups (`enUS`, `koKR`, `All`, or a hex mask)
    #[arg(long, default_value = "enUS")]
    locale: LocaleFlags,

    /// Print load progress
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print table sizes
    Info,
    /// Check whether paths are known to the root table
    Exists {
        /// Logical paths
        paths: Vec<String>,
    },
    /// Print the archive span a path resolves to
    Locate {
        /// Logical path
        path: String,
    },
    /// Extract a file to disk
    Extract {
        /// Logical path
        path: String,
        /// Destination file
        output: PathBuf,
    },
    /// Build a folder tree from a list file and print a summary
    Tree {
        /// Text file with one logical path per line
        listfile: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();

    let config = StorageConfig::from_json_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let report = |phase: LoadPhase, percent: u8| {
        if percent % 25 == 0 {
            info!("{phase}: {percent}%");
        }
    };
    let mut builder = CascHandler::builder(config);
    if cli.progress {
        builder = builder.progress(&report);
    }
    let handler = builder.open().context("opening storage")?;

    match cli.command {
        Command::Info => {
            let stats = handler.stats();
            println!("shard files:     {}", stats.shard_files);
            println!("index entries:   {}", stats.local_index_entries);
            println!("encoding entries:{:>8}", stats.encoding_entries);
            println!("root paths:      {}", stats.root_paths);
            println!("root entries:    {}", stats.root_entries);
        }
        Command::Exists { paths } => {
            for path in paths {
                println!("{}\t{path}", if handler.file_exists(&path) { "yes" } else { "no" });
            }
        }
        Command::Locate { path } => {
            let span = handler.locate(&path, cli.locale)?;
            println!(
                "data.{:03} offset={} length={}",
                span.archive_id, span.offset, span.length
            );
        }
        Command::Extract { path, output } => {
            let bytes = handler.extract_to(&path, &output, cli.locale)?;
            info!("Wrote {} bytes to {}", bytes.len(), output.display());
        }
        Command::Tree { listfile } => {
            let text = std::fs::read_to_string(&listfile)
                .with_context(|| format!("reading {}", listfile.display()))?;
            let mut namespace = handler.namespace();
            let tree = namespace.build(text.lines().map(str::trim).filter(|l| !l.is_empty()));
            if tree.is_empty() {
                bail!("no path from {} is in the root table", listfile.display());
            }
            println!(
                "{} files in {} folders",
                tree.file_count(),
                tree.folder_count()
            );
            let names = namespace.names();
            for child in tree.children() {
                match child {
                    NamespaceNode::Folder(folder) => println!(
                        "  {}/ ({} files)",
                        names.folder_name(folder.hash()).unwrap_or("?"),
                        folder.file_count()
                    ),
                    NamespaceNode::File(file) => {
                        println!("  {}", names.file_name(file.hash).unwrap_or("?"));
                    }
                }
            }
        }
    }

    Ok(())
}

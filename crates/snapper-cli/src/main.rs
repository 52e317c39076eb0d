//! # snapper CLI
//!
//! Command-line interface for the Snapper content-addressed asset store.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use snapper_cas::AssetStore;
use snapper_config::logging::{init_logging, LogLevel};
use snapper_config::path::normalize_or_original;
use snapper_config::{log_cli_debug, log_cli_info, Config};

mod snapify;
mod status;

/// Snapper - content-addressed blob store for binary assets
#[derive(Parser)]
#[command(name = "snapper")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Committed blob root (overrides config and SNAPPER_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Staging root, must share a filesystem with the data root
    #[arg(long, global = true)]
    spool_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Store(StoreCommands),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Commands that operate on an opened store
#[derive(Subcommand)]
enum StoreCommands {
    /// Store a payload and print its content address
    Put {
        /// File to store (reads stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,

        /// Treat the input as base64 text
        #[arg(long)]
        base64: bool,
    },

    /// Write a stored payload to stdout or a file
    Get {
        #[arg(value_name = "HASH")]
        hash: String,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the payload as base64
        #[arg(long)]
        base64: bool,
    },

    /// Check whether blobs exist (exit code 1 if any is missing)
    Exists {
        #[arg(value_name = "HASH", required = true)]
        hashes: Vec<String>,
    },

    /// Display store statistics
    Status {
        #[arg(long)]
        json: bool,
    },

    /// Rewrite legacy raw/gzip blobs into the current codec
    Snapify(snapify::SnapifyArgs),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file locations
    Path,
}

fn main() -> Result<ExitCode> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = Cli::parse();
    init_logging(LogLevel::from_verbosity(cli.verbose));

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }
    if let Some(dir) = cli.spool_dir {
        config.storage.spool_dir = dir;
    }

    let command = match cli.command {
        Commands::Config { command } => {
            cmd_config(&config, command)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Store(command) => command,
    };

    let store = open_store(&config)?;
    match command {
        StoreCommands::Put { file, base64 } => cmd_put(&store, file, base64)?,
        StoreCommands::Get {
            hash,
            output,
            base64,
        } => cmd_get(&store, &hash, output, base64)?,
        StoreCommands::Exists { hashes } => return Ok(cmd_exists(&store, &hashes)),
        StoreCommands::Status { json } => status::run(&store, json)?,
        StoreCommands::Snapify(args) => snapify::run(store.data_dir(), &config.migrate, args)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn open_store(config: &Config) -> Result<AssetStore> {
    let store = AssetStore::new(&config.storage.data_dir, &config.storage.spool_dir)
        .with_context(|| {
            format!(
                "Failed to open store (data: {}, spool: {})",
                config.storage.data_dir.display(),
                config.storage.spool_dir.display()
            )
        })?;
    log_cli_debug!(
        "Store opened",
        data_dir = tracing::field::debug(store.data_dir()),
        spool_dir = tracing::field::debug(store.spool_dir())
    );
    Ok(store)
}

fn cmd_put(store: &AssetStore, file: Option<PathBuf>, base64: bool) -> Result<()> {
    let mut input = Vec::new();
    match &file {
        Some(path) => {
            File::open(path)
                .and_then(|mut f| f.read_to_end(&mut input))
                .with_context(|| format!("Failed to read {}", path.display()))?;
        }
        None => {
            io::stdin()
                .read_to_end(&mut input)
                .context("Failed to read stdin")?;
        }
    }

    let address = if base64 {
        let text = String::from_utf8(input).context("Base64 input is not UTF-8")?;
        store.store(text.trim())
    } else {
        store.store_bytes(&input)
    }
    .context("Failed to store payload")?;

    log_cli_info!("Stored payload", address = address.as_str());
    println!("{}", address);
    Ok(())
}

fn cmd_get(store: &AssetStore, hash: &str, output: Option<PathBuf>, base64: bool) -> Result<()> {
    if base64 {
        let encoded = store
            .get_as_base64(hash)
            .with_context(|| format!("Failed to load blob {}", hash))?;
        println!("{}", encoded);
        return Ok(());
    }

    let mut reader = store
        .load(hash)
        .with_context(|| format!("Failed to load blob {}", hash))?;
    log_cli_debug!(
        "Loading blob",
        address = hash,
        codec = tracing::field::display(reader.codec())
    );

    let copied = match output {
        Some(path) => {
            let mut out = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let copied = io::copy(&mut reader, &mut out)?;
            out.sync_all()?;
            copied
        }
        None => {
            let mut stdout = io::stdout().lock();
            let copied = io::copy(&mut reader, &mut stdout)?;
            stdout.flush()?;
            copied
        }
    };
    log_cli_debug!("Blob written", bytes = copied);
    Ok(())
}

fn cmd_exists(store: &AssetStore, hashes: &[String]) -> ExitCode {
    let mut all_present = true;
    for hash in hashes {
        let present = store.exists(hash);
        all_present &= present;
        println!("{} {}", hash, present);
    }
    if all_present {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn cmd_config(config: &Config, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => print!("{}", config.to_toml()?),
        ConfigCommands::Path => {
            match Config::global_config_path() {
                Some(path) => println!("Global:  {}", path.display()),
                None => println!("Global:  (no home directory)"),
            }
            println!(
                "Project: {}",
                normalize_or_original(Config::project_config_path()).display()
            );
        }
    }
    Ok(())
}

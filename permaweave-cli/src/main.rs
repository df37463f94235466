//! Permaweave CLI
//!
//! Command-line client for uploading files to the weave.
//!
//! # Commands
//! - `upload` - Upload a file, optionally encrypted
//! - `status` - Query transaction status
//! - `config` - Show or initialize configuration
//!
//! # Configuration
//! Config file: ~/.permaweave/config.toml
//! Signing identity: ~/.permaweave/identity.key

use anyhow::Result;
use clap::{Parser, Subcommand};
use permaweave_client::{Ed25519Signer, HttpGateway, Uploader};
use std::path::PathBuf;
use std::sync::Arc;

mod commands;
mod config;
mod symbols;

use commands::{status, upload};

#[derive(Parser)]
#[command(name = "permaweave")]
#[command(about = "Encrypted chunked uploads to the weave")]
#[command(version)]
struct Cli {
    /// Gateway host (overrides config file)
    #[arg(long, global = true, env = "PERMAWEAVE_GATEWAY_HOST")]
    host: Option<String>,

    /// Gateway port (overrides config file)
    #[arg(long, global = true, env = "PERMAWEAVE_GATEWAY_PORT")]
    port: Option<u16>,

    /// Gateway protocol, http or https (overrides config file)
    #[arg(long, global = true, env = "PERMAWEAVE_GATEWAY_PROTOCOL")]
    protocol: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file
    Upload {
        /// File to upload
        path: String,

        /// Encrypt the file before uploading
        #[arg(short, long)]
        encrypt: bool,

        /// Encryption key file (32 raw bytes or 64 hex chars)
        #[arg(short, long)]
        key_file: Option<PathBuf>,

        /// Content-Type tag (guessed from the file extension if omitted)
        #[arg(long)]
        content_type: Option<String>,

        /// Chunk size in bytes
        #[arg(long)]
        chunk_size: Option<u32>,

        /// Permit uploading an empty file
        #[arg(long, default_value = "false")]
        allow_empty: bool,
    },

    /// Query transaction status
    Status {
        /// Transaction id (the upload receipt)
        tx_id: String,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the active configuration
    Show,
    /// Write a default config file and generate a signing identity
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration from ~/.permaweave/config.toml
    let mut cfg = config::load_config();

    // CLI args override config file
    if let Some(host) = cli.host {
        cfg.gateway.host = host;
    }
    if let Some(port) = cli.port {
        cfg.gateway.port = port;
    }
    if let Some(protocol) = cli.protocol {
        cfg.gateway.protocol = protocol;
    }

    let gateway_config = cfg.gateway.to_gateway_config();
    let gateway = HttpGateway::new(&gateway_config)?;

    match cli.command {
        Commands::Upload {
            path,
            encrypt,
            key_file,
            content_type,
            chunk_size,
            allow_empty,
        } => {
            let signer = require_identity()?;
            let uploader = Uploader::new(Arc::new(gateway), Arc::new(signer));
            let config = upload::UploadConfig {
                path,
                encrypt,
                key_file,
                content_type,
                chunk_size: chunk_size.or(cfg.upload.chunk_size),
                allow_empty,
            };
            upload::run(&uploader, config).await?;
        }

        Commands::Status { tx_id } => {
            status::run(&gateway, &tx_id).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let toml_str = toml::to_string_pretty(&cfg)?;
                println!("{}", toml_str);
            }
            ConfigAction::Init => {
                config::save_config(&cfg)?;
                println!("Wrote {}", config::config_file_path()?.display());

                if config::load_identity()?.is_none() {
                    let signer = Ed25519Signer::generate();
                    config::save_identity(&signer)?;
                    println!(
                        "{} Generated signing identity at {}",
                        symbols::CHECK,
                        config::identity_file_path()?.display()
                    );
                } else {
                    println!("Signing identity already present");
                }
            }
        },
    }

    Ok(())
}

/// Load the signing identity or explain how to provision one
fn require_identity() -> Result<Ed25519Signer> {
    config::load_identity()?.ok_or_else(|| {
        anyhow::anyhow!("No signing identity found. Run `permaweave config init` first.")
    })
}

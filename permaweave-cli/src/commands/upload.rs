//! Upload Command
//!
//! Uploads a single file to the weave, optionally encrypting it first.

use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use permaweave_client::{UploadOptions, Uploader};
use permaweave_core::{EncryptionKey, DEFAULT_CHUNK_SIZE, KEY_SIZE};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Upload configuration
pub struct UploadConfig {
    pub path: String,
    pub encrypt: bool,
    pub key_file: Option<PathBuf>,
    pub content_type: Option<String>,
    pub chunk_size: Option<u32>,
    pub allow_empty: bool,
}

/// Run upload command
pub async fn run(uploader: &Uploader, config: UploadConfig) -> Result<()> {
    let path = Path::new(&config.path);

    if !path.is_file() {
        anyhow::bail!("Not a file: {}", config.path);
    }

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file");

    let mime_type = match &config.content_type {
        Some(mime) => mime.clone(),
        None => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };

    let key = if config.encrypt {
        let key_file = config
            .key_file
            .as_ref()
            .context("--encrypt requires --key-file")?;
        Some(read_key_file(key_file).await?)
    } else {
        None
    };

    let data = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", config.path))?;
    let size = data.len() as u64;
    let chunk_size = config.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);

    let options = UploadOptions {
        encrypt: config.encrypt,
        key,
        chunk_size,
        allow_empty_payload: config.allow_empty,
        ..Default::default()
    };

    // Total chunks is known up front; the plan is pure arithmetic
    let total_chunks = if size == 0 {
        1
    } else {
        (size + chunk_size as u64 - 1) / chunk_size as u64
    };

    let pb = ProgressBar::new(total_chunks);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Uploading {}", file_name));

    let mut progress = uploader.subscribe();
    let pb_task = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while let Ok(event) = progress.recv().await {
                pb.set_position(event.acked_count as u64);
                if event.acked_count == event.total_count {
                    break;
                }
            }
        })
    };

    let result = uploader.upload(data.into(), &mime_type, options).await;
    pb_task.abort();

    let receipt = result.context("Upload failed")?;
    pb.finish_with_message(format!(
        "{} Uploaded {} ({} bytes)",
        style(symbols::CHECK).green(),
        file_name,
        size
    ));

    println!(
        "\n{} {}\n  Content-Type: {}\n  Size: {} bytes",
        style("Transaction:").green().bold(),
        receipt.id,
        mime_type,
        size
    );

    if let Some(counter_base) = receipt.counter_base {
        println!(
            "  {} Counter base: {} (required to decrypt; store it with your key)",
            symbols::LOCK,
            counter_base.to_hex()
        );
    }

    println!(
        "\n{} Allow several minutes for the transaction to finalize.",
        style(symbols::INFO).cyan()
    );

    Ok(())
}

/// Read an encryption key from a file: 32 raw bytes or 64 hex characters
async fn read_key_file(path: &Path) -> Result<EncryptionKey> {
    let raw = fs::read(path)
        .await
        .with_context(|| format!("Failed to read key file {}", path.display()))?;

    if raw.len() == KEY_SIZE {
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&raw);
        return Ok(EncryptionKey::from_bytes(key));
    }

    let text = String::from_utf8(raw).context("Key file is neither raw bytes nor hex")?;
    let decoded = hex::decode(text.trim()).context("Key file is not valid hex")?;
    EncryptionKey::from_slice(&decoded).context("Key must be exactly 32 bytes")
}

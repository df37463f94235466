//! Configuration and identity management
//!
//! Handles storing and loading CLI configuration and the signing identity.
//! Config directory: ~/.permaweave/ (cross-platform)
//!
//! Config file format (~/.permaweave/config.toml):
//! ```toml
//! [gateway]
//! host = "localhost"
//! port = 1984
//! protocol = "http"
//!
//! [upload]
//! chunk_size = 262144
//! ```

use anyhow::{Context, Result};
use permaweave_client::{Ed25519Signer, GatewayConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// CLI configuration (~/.permaweave/config.toml)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PermaweaveConfig {
    /// Gateway connection settings
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Upload settings
    #[serde(default)]
    pub upload: UploadSettings,
}

/// Gateway connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    #[serde(default = "default_gateway_protocol")]
    pub protocol: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            protocol: default_gateway_protocol(),
        }
    }
}

impl GatewaySettings {
    /// Convert to the client's gateway config
    pub fn to_gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            host: self.host.clone(),
            port: self.port,
            protocol: self.protocol.clone(),
        }
    }
}

fn default_gateway_host() -> String {
    std::env::var("PERMAWEAVE_GATEWAY_HOST").unwrap_or_else(|_| "localhost".to_string())
}

fn default_gateway_port() -> u16 {
    std::env::var("PERMAWEAVE_GATEWAY_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1984)
}

fn default_gateway_protocol() -> String {
    std::env::var("PERMAWEAVE_GATEWAY_PROTOCOL").unwrap_or_else(|_| "http".to_string())
}

/// Upload settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UploadSettings {
    /// Chunk size in bytes; the client default applies when unset
    #[serde(default)]
    pub chunk_size: Option<u32>,
}

/// Get the config directory path (~/.permaweave/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let config_dir = home.join(".permaweave");

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory ~/.permaweave/")?;
    }

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the signing identity file path
pub fn identity_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("identity.key"))
}

/// Load configuration from file, falling back to defaults
pub fn load_config() -> PermaweaveConfig {
    match config_file_path() {
        Ok(path) if path.exists() => match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    PermaweaveConfig::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                PermaweaveConfig::default()
            }
        },
        _ => PermaweaveConfig::default(),
    }
}

/// Save configuration to file
pub fn save_config(config: &PermaweaveConfig) -> Result<()> {
    let path = config_file_path()?;
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(&path, content).context("Failed to write config file")?;
    Ok(())
}

/// Load the signing identity (hex-encoded 32-byte secret key)
pub fn load_identity() -> Result<Option<Ed25519Signer>> {
    let path = identity_file_path()?;
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).context("Failed to read identity file")?;
    let bytes = hex::decode(content.trim()).context("Identity file is not valid hex")?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("Identity key must be exactly 32 bytes"))?;

    Ok(Some(Ed25519Signer::from_bytes(&key)))
}

/// Save a signing identity with restrictive permissions
pub fn save_identity(signer: &Ed25519Signer) -> Result<()> {
    let path = identity_file_path()?;
    let content = hex::encode(signer.to_bytes());

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::write(&path, &content)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        fs::write(&path, content)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PermaweaveConfig::default();
        assert_eq!(config.gateway.port, 1984);
        assert_eq!(config.gateway.protocol, "http");
        assert!(config.upload.chunk_size.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = PermaweaveConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();

        assert!(toml_str.contains("[gateway]"));
        assert!(toml_str.contains("host"));
        assert!(toml_str.contains("protocol"));
    }

    #[test]
    fn test_gateway_settings_conversion() {
        let settings = GatewaySettings {
            host: "weave.example.net".to_string(),
            port: 443,
            protocol: "https".to_string(),
        };
        let config = settings.to_gateway_config();
        assert_eq!(config.base_url(), "https://weave.example.net:443");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: PermaweaveConfig = toml::from_str("[gateway]\nhost = \"node1\"\n").unwrap();
        assert_eq!(config.gateway.host, "node1");
        assert_eq!(config.gateway.port, 1984);
    }
}

//! # Configuration Management Module
//!
//! TOML configuration for the progression engine, loaded once at startup.
//!
//! ## Configuration Structure
//!
//! - [`BbsConfig`] - Board identity: name, sysop address, NPC mail domain, fallback handle
//! - [`StorageConfig`] - State directory and the two email source documents
//! - [`SchedulerConfig`] - Trigger scan interval and optional mail gate token
//! - [`NpcConfig`] - Reply generator seed
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use glyphbbs::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Load configuration from file
//!     let config = Config::load("config.toml").await?;
//!     println!("BBS Name: {}", config.bbs.name);
//!
//!     // Create default configuration
//!     Config::create_default("config.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [bbs]
//! name = "GLYPHIS_IO BBS"
//! sysop_address = "glyphis@ciphernet.net"
//! npc_domain = "ciphernet.net"
//! default_handle = "operative"
//!
//! [storage]
//! data_dir = "./data/state"
//! inbox_file = "./data/seeds/emails_inbox.json"
//! outbox_file = "./data/seeds/emails_outbox.json"
//!
//! [scheduler]
//! check_interval_ms = 5000
//! # mail_gate_token = "PSEM"
//!
//! [npc]
//! # seed = 1989
//!
//! [logging]
//! level = "info"
//! file = "glyphbbs.log"
//! ```
//!
//! Every section except `[bbs]` and `[storage]` may be omitted.

use crate::tokens::Token;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BbsConfig {
    pub name: String,
    /// Address that receives onboarding mail (`username: <handle>`).
    pub sysop_address: String,
    /// Mail domain whose addresses must have a character profile.
    #[serde(default = "default_npc_domain")]
    pub npc_domain: String,
    /// Shown in `{username}` placeholders before the player registers.
    #[serde(default = "default_handle")]
    pub default_handle: String,
}

fn default_npc_domain() -> String {
    "ciphernet.net".to_string()
}

fn default_handle() -> String {
    crate::context::DEFAULT_HANDLE.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding tokens.json, delivered.json, player.json and mailbox.json
    pub data_dir: String,
    pub inbox_file: String,
    pub outbox_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// When set, auto_send mail and outgoing sends require this token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail_gate_token: Option<String>,
}

fn default_check_interval_ms() -> u64 {
    5000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: default_check_interval_ms(),
            mail_gate_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NpcConfig {
    /// Fixed seed for reply flavor text; unset draws from entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bbs: BbsConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub npc: NpcConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config
            .validate()
            .map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !self.bbs.sysop_address.contains('@') {
            return Err(anyhow!(
                "bbs.sysop_address '{}' is not an address",
                self.bbs.sysop_address
            ));
        }
        if self.bbs.npc_domain.trim().is_empty() {
            return Err(anyhow!("bbs.npc_domain must not be empty"));
        }
        if self.scheduler.check_interval_ms == 0 {
            return Err(anyhow!("scheduler.check_interval_ms must be positive"));
        }
        self.mail_gate()
            .map_err(|e| anyhow!("scheduler.mail_gate_token: {}", e))?;
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
    }

    pub fn inbox_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.inbox_file)
    }

    pub fn outbox_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.outbox_file)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.scheduler.check_interval_ms)
    }

    /// The configured mail gate as a token, if any.
    pub fn mail_gate(&self) -> crate::errors::Result<Option<Token>> {
        match self.scheduler.mail_gate_token.as_deref() {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => Token::parse(raw).map(Some),
        }
    }

    /// True when `address` belongs to the NPC mail domain.
    pub fn is_npc_domain(&self, address: &str) -> bool {
        address
            .trim()
            .rsplit_once('@')
            .map_or(false, |(_, domain)| domain.eq_ignore_ascii_case(self.bbs.npc_domain.trim()))
    }

    pub fn is_sysop(&self, address: &str) -> bool {
        address.trim().eq_ignore_ascii_case(self.bbs.sysop_address.trim())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bbs: BbsConfig {
                name: "GLYPHIS_IO BBS".to_string(),
                sysop_address: "glyphis@ciphernet.net".to_string(),
                npc_domain: default_npc_domain(),
                default_handle: default_handle(),
            },
            storage: StorageConfig {
                data_dir: "./data/state".to_string(),
                inbox_file: "./data/seeds/emails_inbox.json".to_string(),
                outbox_file: "./data/seeds/emails_outbox.json".to_string(),
            },
            scheduler: SchedulerConfig::default(),
            npc: NpcConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("glyphbbs.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_interval(), Duration::from_secs(5));
        assert!(config.mail_gate().unwrap().is_none());
    }

    #[test]
    fn test_minimal_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [bbs]
            name = "test"
            sysop_address = "glyphis@ciphernet.net"

            [storage]
            data_dir = "/tmp/state"
            inbox_file = "in.json"
            outbox_file = "out.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.bbs.npc_domain, "ciphernet.net");
        assert_eq!(config.bbs.default_handle, "operative");
        assert_eq!(config.scheduler.check_interval_ms, 5000);
        assert!(config.npc.seed.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_mail_gate_is_normalised() {
        let mut config = Config::default();
        config.scheduler.mail_gate_token = Some(" psem ".to_string());
        assert_eq!(config.mail_gate().unwrap().unwrap().as_str(), "PSEM");
        config.scheduler.mail_gate_token = Some("not a token".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_routing_helpers() {
        let config = Config::default();
        assert!(config.is_npc_domain("rain@CipherNet.net"));
        assert!(!config.is_npc_domain("friend@example.org"));
        assert!(!config.is_npc_domain("no-at-sign"));
        assert!(config.is_sysop(" Glyphis@ciphernet.net "));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.scheduler.check_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.storage.inbox_file, "./data/seeds/emails_inbox.json");
        assert_eq!(back.logging.file.as_deref(), Some("glyphbbs.log"));
    }
}

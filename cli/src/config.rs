//! Simulation configuration with TOML file support.

use std::path::Path;

use allot_types::{Address, Amount, ALLOCATION_SLOTS};
use allot_utils::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(String),

    #[error("cannot parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A complete epoch run: who takes part, what they allocate, and how the
/// epoch is funded and timed.
///
/// Loaded from TOML via [`SimulationConfig::from_toml_file`] or built
/// programmatically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub log_format: LogFormat,

    /// Filter directive, e.g. `"info"` or `"debug,allot_epoch=trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Hex setup key for the transparent proof system. Random when absent.
    #[serde(default)]
    pub setup_key: Option<String>,

    #[serde(default)]
    pub epoch: EpochSection,

    #[serde(default)]
    pub members: Vec<MemberSection>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSection {
    #[serde(default = "default_admin")]
    pub admin: Address,

    #[serde(default = "default_coordinator")]
    pub coordinator: Address,

    /// Delay from "now" until the epoch starts. Must be positive.
    #[serde(default = "default_starts_in_secs")]
    pub starts_in_secs: u64,

    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Escrow deposit in raw units, as a decimal string (TOML integers stop
    /// at `i64`).
    #[serde(default = "default_escrow")]
    pub escrow: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSection {
    pub address: Address,

    /// Basis points given to each member, by member index.
    pub allocations: Vec<i64>,

    /// Hex commitment salt. Random when absent.
    #[serde(default)]
    pub salt: Option<String>,
}

// ── Defaults ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}

fn default_admin() -> Address {
    Address::repeat(0xAD)
}

fn default_coordinator() -> Address {
    Address::repeat(0xC0)
}

fn default_starts_in_secs() -> u64 {
    60
}

fn default_duration_secs() -> u64 {
    3_600
}

fn default_escrow() -> String {
    "10000000000000000000".to_string()
}

impl Default for EpochSection {
    fn default() -> Self {
        Self {
            admin: default_admin(),
            coordinator: default_coordinator(),
            starts_in_secs: default_starts_in_secs(),
            duration_secs: default_duration_secs(),
            escrow: default_escrow(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            setup_key: None,
            epoch: EpochSection::default(),
            members: Vec::new(),
        }
    }
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SimulationConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn escrow_amount(&self) -> Result<Amount, ConfigError> {
        self.epoch
            .escrow
            .trim()
            .parse::<u128>()
            .map(Amount::new)
            .map_err(|e| ConfigError::Invalid(format!("escrow \"{}\": {e}", self.epoch.escrow)))
    }

    pub fn setup_key_bytes(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        self.setup_key
            .as_deref()
            .map(|key| parse_key32("setup_key", key))
            .transpose()
    }

    /// Reject settings that would otherwise fail partway through a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epoch.starts_in_secs == 0 {
            return Err(ConfigError::Invalid(
                "epoch.starts_in_secs must be positive".into(),
            ));
        }
        self.escrow_amount()?;
        self.setup_key_bytes()?;
        for member in &self.members {
            if member.allocations.len() > ALLOCATION_SLOTS {
                return Err(ConfigError::Invalid(format!(
                    "member {} lists {} allocations, at most {ALLOCATION_SLOTS} allowed",
                    member.address,
                    member.allocations.len()
                )));
            }
            member.salt_bytes()?;
        }
        Ok(())
    }
}

impl MemberSection {
    pub fn salt_bytes(&self) -> Result<Option<[u8; 32]>, ConfigError> {
        self.salt
            .as_deref()
            .map(|salt| parse_key32("salt", salt))
            .transpose()
    }
}

/// Parse 32 bytes of hex, with or without a `0x` prefix.
pub fn parse_key32(field: &str, s: &str) -> Result<[u8; 32], ConfigError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| ConfigError::Invalid(format!("{field}: {e}")))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| ConfigError::Invalid(format!("{field}: expected 32 bytes, got {}", b.len())))
}

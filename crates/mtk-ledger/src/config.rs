use std::path::Path;

use serde::{Deserialize, Serialize};

use mtk_types::{parse_units, Amount, Principal, DECIMALS};

use crate::error::LedgerError;

/// Construction parameters in subunits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeployParams {
    /// Token subunits credited to the deployer.
    pub initial_supply: Amount,
    /// Wei required to mint one whole token.
    pub initial_token_price: Amount,
}

/// Human-facing deployment parameters.
///
/// Amounts are decimal strings: `initial_supply` in whole tokens and
/// `initial_token_price` in ether per token, both with 18 decimals. The
/// deployer is a `0x` address or a label from which an address is derived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub deployer: String,
    pub initial_supply: String,
    pub initial_token_price: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            deployer: "owner".into(),
            initial_supply: "10000".into(),
            initial_token_price: "0.01".into(),
        }
    }
}

impl DeployConfig {
    pub fn deployer(&self) -> Result<Principal, LedgerError> {
        resolve_principal(&self.deployer)
    }

    pub fn params(&self) -> Result<DeployParams, LedgerError> {
        Ok(DeployParams {
            initial_supply: parse_units(&self.initial_supply, DECIMALS)?,
            initial_token_price: parse_units(&self.initial_token_price, DECIMALS)?,
        })
    }
}

/// Runtime knobs of the ledger itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Capacity of each subscriber's broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 1024,
        }
    }
}

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub deploy: DeployConfig,
    pub ledger: LedgerConfig,
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, LedgerError> {
        toml::from_str(source).map_err(|e| LedgerError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| LedgerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&source)
    }

    pub fn to_toml(&self) -> Result<String, LedgerError> {
        toml::to_string_pretty(self).map_err(|e| LedgerError::Config(e.to_string()))
    }
}

/// The address `s` spells if it starts with `0x`, otherwise the principal
/// derived from `s` as a label. A `0x` input that is not a valid address is
/// an error, never a label.
pub fn resolve_principal(s: &str) -> Result<Principal, LedgerError> {
    let trimmed = s.trim();
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return Ok(Principal::from_hex(trimmed)?);
    }
    Ok(Principal::derive(trimmed))
}

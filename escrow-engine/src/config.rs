//! Engine configuration
//!
//! Loaded from an optional TOML file, overridden by `SWAP_`-prefixed
//! environment variables (`SWAP_LOG_LEVEL=debug`, `SWAP_RELAY_PROGRAM_ID=..`).

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use swap_core::{Pubkey, BLOCKHEIGHT_EXPIRY_THRESHOLD};

/// Escrow program id, namespace of every derived address
pub const DEFAULT_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x36, 0xfd, 0xce, 0x29, 0x41, 0x06, 0xa1, 0x24, 0xdc, 0x96, 0xee, 0xe5, 0xdd, 0x86, 0x61, 0x93,
    0x48, 0x6c, 0x7b, 0x10, 0x09, 0x62, 0xda, 0x05, 0xa6, 0xcb, 0x3e, 0xea, 0x20, 0x01, 0x0c, 0x42,
]);

/// Bitcoin relay program id
pub const DEFAULT_RELAY_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x22, 0x66, 0x69, 0x9a, 0x3c, 0xc8, 0xb8, 0x3b, 0x2e, 0x67, 0xc2, 0xdb, 0xf2, 0x4a, 0xc7, 0x34,
    0x1d, 0x5b, 0xb3, 0x49, 0xe8, 0x12, 0xfe, 0x08, 0xbc, 0x03, 0x87, 0x98, 0x75, 0x59, 0xd4, 0xcd,
]);

/// Native ed25519 signature verification program id
pub const DEFAULT_ED25519_PROGRAM_ID: Pubkey = Pubkey::new_from_array([
    0x03, 0x7d, 0x46, 0xd6, 0x7c, 0x93, 0xfb, 0xbe, 0x12, 0xf9, 0x42, 0x8f, 0x83, 0x8d, 0x40, 0xff,
    0x05, 0x70, 0x74, 0x49, 0x27, 0xf4, 0x8a, 0x64, 0xfc, 0xca, 0x70, 0x44, 0x80, 0x00, 0x00, 0x00,
]);

/// Configuration for the swap engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub program_id: Pubkey,
    /// Only attestations from this program count as SPV proofs
    pub relay_program_id: Pubkey,
    pub ed25519_program_id: Pubkey,
    /// Blocks the relay keeps before pruning
    pub relay_pruning_factor: u16,
    /// Headroom kept below the pruning depth
    pub relay_safety_buffer: u16,
    /// Expiries below this are block heights, at or above it timestamps.
    /// Never above the default, so heights fit in 32 bits.
    pub blockheight_expiry_threshold: u64,
    /// Most recent events kept for replay by [`crate::SwapEngine::events`]
    pub event_log_capacity: usize,
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID,
            relay_program_id: DEFAULT_RELAY_PROGRAM_ID,
            ed25519_program_id: DEFAULT_ED25519_PROGRAM_ID,
            relay_pruning_factor: 250,
            relay_safety_buffer: 50,
            blockheight_expiry_threshold: BLOCKHEIGHT_EXPIRY_THRESHOLD,
            event_log_capacity: 10_000,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Deepest confirmation count an escrow may require; deeper proofs
    /// could reference already pruned headers.
    pub fn max_confirmations(&self) -> u16 {
        self.relay_pruning_factor.saturating_sub(self.relay_safety_buffer)
    }

    /// Loads configuration from `path` (if present) and the environment
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("SWAP"))
            .build()
            .context("failed to build engine configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("invalid engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .context("failed to parse engine configuration")?
            .try_deserialize()
            .context("invalid engine configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the escrow program cannot honour
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.blockheight_expiry_threshold <= BLOCKHEIGHT_EXPIRY_THRESHOLD,
            "blockheight_expiry_threshold {} exceeds {}",
            self.blockheight_expiry_threshold,
            BLOCKHEIGHT_EXPIRY_THRESHOLD
        );
        anyhow::ensure!(self.event_log_capacity > 0, "event_log_capacity must be positive");
        Ok(())
    }
}

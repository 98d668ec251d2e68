//! Cross-chain atomic swap escrow
//!
//! Locks tokens against a commitment and releases them to the claimer on
//! proof, or back to the offerer on a cooperative or timeout refund:
//! - HTLC preimages, Bitcoin outputs and transaction ids as claim conditions
//! - SPV attestations from a Bitcoin relay for chain claims and height expiry
//! - Internal balances and claimer reputation kept on per-owner user accounts
//! - Audit events for off-chain indexers

pub mod attestation;
pub mod claim_verifier;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod program;
pub mod refund_authorizer;
pub mod reputation;
pub mod store;
pub mod telemetry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::EngineConfig;
pub use engine::SwapEngine;
pub use error::{ErrorCategory, SwapError};
pub use ledger::{MemoryLedger, TokenLedger};

/// Result type alias for escrow operations
pub type EscrowResult<T> = Result<T, SwapError>;

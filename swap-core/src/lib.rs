//! Shared types for the atomic swap escrow
//!
//! Swap terms and their canonical encoding, commitment hashing, Bitcoin
//! transaction parsing for chain claims, and the audit events emitted when an
//! escrow changes state.

pub mod btc_tx;
pub mod commitment;
pub mod error;
pub mod events;
pub mod pubkey;
pub mod swap_data;

pub use btc_tx::{parse_transaction, ParsedTransaction};
pub use error::CoreError;
pub use events::{ClaimEvent, InitializeEvent, RefundEvent, SwapEvent};
pub use pubkey::Pubkey;
pub use swap_data::{
    Expiry, NoncedLock, SwapData, SwapType, BLOCKHEIGHT_EXPIRY_THRESHOLD, SWAP_TYPE_COUNT,
};

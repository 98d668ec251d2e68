//! Audit events consumed by off-chain indexers

use serde::{Deserialize, Serialize};

use crate::swap_data::SwapType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeEvent {
    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],
    #[serde(with = "hex::serde")]
    pub txo_hash: [u8; 32],
    pub nonce: u64,
    pub kind: SwapType,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEvent {
    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],
    /// Preimage for HTLCs, transaction id for chain kinds
    #[serde(with = "hex::serde")]
    pub secret: [u8; 32],
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundEvent {
    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwapEvent {
    Initialize(InitializeEvent),
    Claim(ClaimEvent),
    Refund(RefundEvent),
}

impl SwapEvent {
    pub fn hash(&self) -> [u8; 32] {
        match self {
            SwapEvent::Initialize(e) => e.hash,
            SwapEvent::Claim(e) => e.hash,
            SwapEvent::Refund(e) => e.hash,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            SwapEvent::Initialize(e) => e.sequence,
            SwapEvent::Claim(e) => e.sequence,
            SwapEvent::Refund(e) => e.sequence,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<InitializeEvent> for SwapEvent {
    fn from(event: InitializeEvent) -> Self {
        SwapEvent::Initialize(event)
    }
}

impl From<ClaimEvent> for SwapEvent {
    fn from(event: ClaimEvent) -> Self {
        SwapEvent::Claim(event)
    }
}

impl From<RefundEvent> for SwapEvent {
    fn from(event: RefundEvent) -> Self {
        SwapEvent::Refund(event)
    }
}

//! Preceding-instruction attestations and the chain relay collaborator
//!
//! Claims on chain swaps and block-height refunds need facts the escrow
//! program cannot check itself: SPV inclusion of a Bitcoin transaction and the
//! relay's current tip height. Cooperative refunds need a verified claimer
//! signature. These facts are produced by other programs earlier in the same
//! atomic unit and handed to the escrow as a [`Preamble`]; only the first
//! instruction of the preamble is consulted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swap_core::Pubkey;
use thiserror::Error;

/// Address the preamble has to be read from
pub const INSTRUCTIONS_SYSVAR_ID: Pubkey = Pubkey::new_from_array([
    0x06, 0xa7, 0xd5, 0x17, 0x18, 0x7b, 0xd1, 0x66, 0x35, 0xda, 0xd4, 0x04, 0x55, 0xfd, 0xc2, 0xc0,
    0xc1, 0x24, 0xc6, 0x8f, 0x21, 0x56, 0x75, 0xa5, 0xdb, 0xba, 0xcb, 0x5f, 0x08, 0x00, 0x00, 0x00,
]);

/// Comparison of the relay tip against a height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum BlockHeightOperator {
    Lt = 0,
    Le = 1,
    Gt = 2,
    Ge = 3,
    Eq = 4,
}

impl BlockHeightOperator {
    /// Whether `tip <op> height` holds
    pub fn holds(self, tip: u32, height: u32) -> bool {
        match self {
            Self::Lt => tip < height,
            Self::Le => tip <= height,
            Self::Gt => tip > height,
            Self::Ge => tip >= height,
            Self::Eq => tip == height,
        }
    }
}

/// Fact established by a preceding instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attestation {
    /// SPV inclusion of a transaction at the given depth
    TransactionVerified {
        #[serde(with = "hex::serde")]
        reversed_tx_id: [u8; 32],
        confirmations: u16,
    },
    /// The relay tip satisfies `tip <operator> height`
    BlockHeight {
        height: u32,
        operator: BlockHeightOperator,
    },
    /// A valid signature by `pubkey` over `message`
    Ed25519 {
        pubkey: Pubkey,
        #[serde(with = "hex::serde")]
        message: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecedingInstruction {
    pub program_id: Pubkey,
    pub attestation: Attestation,
}

/// Instructions preceding an escrow operation in the same atomic unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preamble {
    /// Account the instructions were loaded from
    pub source: Pubkey,
    pub instructions: Vec<PrecedingInstruction>,
}

impl Default for Preamble {
    fn default() -> Self {
        Self {
            source: INSTRUCTIONS_SYSVAR_ID,
            instructions: Vec::new(),
        }
    }
}

/// Header the merkle proof is anchored to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedHeader {
    pub height: u32,
    #[serde(with = "hex::serde")]
    pub block_hash: [u8; 32],
    #[serde(with = "hex::serde")]
    pub merkle_root: [u8; 32],
}

/// Inclusion proof handed to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInclusionProof {
    pub reversed_tx_id: [u8; 32],
    pub min_confirmations: u16,
    pub tx_index: u32,
    pub merkle_proof: Vec<[u8; 32]>,
    pub committed_header: CommittedHeader,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Header {0} is not part of the relay's main chain")]
    UnknownHeader(u32),

    #[error("Merkle proof does not connect the transaction to the header")]
    InvalidMerkleProof,

    #[error("Insufficient confirmations: required {required}, have {actual}")]
    InsufficientConfirmations { required: u16, actual: u16 },

    #[error("Block height {height} does not satisfy {operator:?} against tip {tip}")]
    HeightComparisonFailed {
        height: u32,
        operator: BlockHeightOperator,
        tip: u32,
    },
}

/// Bitcoin SPV light client
#[async_trait]
pub trait ChainRelay: Send + Sync {
    /// Program id attestations from this relay carry
    fn program_id(&self) -> Pubkey;

    /// Verifies inclusion and returns the confirmations the transaction has
    async fn verify_transaction(
        &self,
        reversed_tx_id: [u8; 32],
        min_confirmations: u16,
        tx_index: u32,
        merkle_proof: &[[u8; 32]],
        committed_header: &CommittedHeader,
    ) -> Result<u16, RelayError>;

    /// Compares the committed tip against `height`
    async fn block_height(&self, height: u32, operator: BlockHeightOperator) -> Result<(), RelayError>;
}

impl Preamble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, program_id: Pubkey, attestation: Attestation) -> Self {
        self.instructions.push(PrecedingInstruction {
            program_id,
            attestation,
        });
        self
    }

    /// First instruction, the only one the escrow program reads
    pub fn first(&self) -> Option<&PrecedingInstruction> {
        self.instructions.first()
    }

    /// Runs the relay's SPV check and records its attestation on success
    pub async fn with_transaction_proof<R: ChainRelay + ?Sized>(
        self,
        relay: &R,
        proof: &TxInclusionProof,
    ) -> Result<Self, RelayError> {
        let confirmations = relay
            .verify_transaction(
                proof.reversed_tx_id,
                proof.min_confirmations,
                proof.tx_index,
                &proof.merkle_proof,
                &proof.committed_header,
            )
            .await?;

        Ok(self.push(
            relay.program_id(),
            Attestation::TransactionVerified {
                reversed_tx_id: proof.reversed_tx_id,
                confirmations,
            },
        ))
    }

    /// Runs the relay's tip comparison and records its attestation on success
    pub async fn with_block_height_proof<R: ChainRelay + ?Sized>(
        self,
        relay: &R,
        height: u32,
        operator: BlockHeightOperator,
    ) -> Result<Self, RelayError> {
        relay.block_height(height, operator).await?;
        Ok(self.push(relay.program_id(), Attestation::BlockHeight { height, operator }))
    }

    /// Records a signature the ed25519 program has already verified
    pub fn with_signature(self, ed25519_program_id: Pubkey, pubkey: Pubkey, message: Vec<u8>) -> Self {
        self.push(ed25519_program_id, Attestation::Ed25519 { pubkey, message })
    }
}

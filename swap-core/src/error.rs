//! Error types for swap terms decoding and Bitcoin transaction parsing

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Encoded swap data has the wrong size
    #[error("Invalid encoded length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Unknown swap type: {0}")]
    UnknownSwapType(u8),

    #[error("Invalid boolean byte: {0}")]
    InvalidBool(u8),

    #[error("Invalid public key: {0}")]
    InvalidPubkey(String),

    /// 64-byte payloads are indistinguishable from inner merkle nodes
    #[error("Transaction of {0} bytes could be spoofed as a merkle node")]
    MerkleNodeLength(usize),

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Transaction carries witness data, strip it before submitting")]
    SegwitNotStripped,

    #[error("Inputs use differing nSequence values")]
    NonUniformSequence,

    #[error("nSequence {0:#010x} has consensus meaning")]
    SequenceHasConsensusMeaning(u32),
}

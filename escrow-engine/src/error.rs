//! Error types for the escrow program
//!
//! Every rejected operation maps to exactly one variant. Numeric codes are
//! stable so indexers and clients can match on them: program errors start at
//! 6000, account constraint errors mirror the 2000/3000 framework ranges.

use thiserror::Error;

use crate::ledger::LedgerError;

/// Broad class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authorization,
    Proof,
    Structural,
    Configuration,
    Fault,
}

/// Main error type for escrow operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// Initialize or cooperative refund authorization is past its expiry
    #[error("Authorization expired")]
    AuthExpired,

    /// Timeout refund attempted before the escrow expired
    #[error("Request not expired yet")]
    NotExpiredYet,

    /// Claim secret does not hash to the escrow commitment
    #[error("Invalid secret provided")]
    InvalidSecret,

    /// Swap kind byte outside the known range
    #[error("Unknown type of the contract")]
    KindUnknown,

    /// Required confirmations exceed what the relay keeps
    #[error("Too many confirmations required")]
    TooManyConfirmations,

    /// Transaction attestation not issued by the configured relay
    #[error("Invalid program id for transaction verification")]
    InvalidTxVerifyProgramId,

    /// No transaction attestation preceding the claim
    #[error("Invalid instruction for transaction verification")]
    InvalidTxVerifyIx,

    /// Attested txid differs from the claimed transaction
    #[error("Invalid txid for transaction verification")]
    InvalidTxVerifyTxid,

    /// Attested confirmations below the escrow requirement
    #[error("Invalid confirmations for transaction verification")]
    InvalidTxVerifyConfirmations,

    /// Claim transaction malformed or carrying bad nSequence
    #[error("Invalid transaction/nSequence")]
    InvalidTx,

    /// Transaction locktime and nSequence do not encode the escrow nonce
    #[error("Invalid nonce used")]
    InvalidNonce,

    /// Claimed output index is out of range
    #[error("Invalid vout of the output used")]
    InvalidVout,

    /// User account or data buffer not owned by the signer
    #[error("Invalid user data account")]
    InvalidUserData,

    /// Height attestation not issued by the configured relay
    #[error("Invalid program id for blockheight verification")]
    InvalidBlockheightVerifyProgramId,

    /// No height attestation preceding the refund
    #[error("Invalid instruction for blockheight verification")]
    InvalidBlockheightVerifyIx,

    /// Attested height differs from the escrow expiry
    #[error("Invalid height for blockheight verification")]
    InvalidBlockheightVerifyHeight,

    /// Attested comparison operator is not the refund operator
    #[error("Invalid operation for blockheight verification")]
    InvalidBlockheightVerifyOperation,

    /// Signature attestation not issued by the ed25519 program
    #[error("Signature verification failed: invalid ed25519 program id")]
    SignatureVerificationFailedInvalidProgram,

    /// Attested signer or message does not match the authorization
    #[error("Signature verification failed: invalid data")]
    SignatureVerificationFailedInvalidData,

    /// Funding source disagrees with the pay-in flag
    #[error("Invalid swap data: pay in")]
    InvalidSwapDataPayIn,

    /// Nonzero nonce on a kind other than ChainNonced
    #[error("Invalid swap data: nonce")]
    InvalidSwapDataNonce,

    /// A raw constraint on the supplied accounts was violated
    #[error("A raw constraint was violated")]
    ConstraintRaw,

    /// Account address not derived from the expected seeds
    #[error("A seeds constraint was violated")]
    ConstraintSeeds,

    /// Account is not at its well-known address, e.g. a spoofed instruction source
    #[error("An address constraint was violated")]
    ConstraintAddress,

    /// Token account holds a different mint
    #[error("A token mint constraint was violated")]
    ConstraintTokenMint,

    /// Escrow, user account or buffer does not exist
    #[error("The program expected this account to be already initialized")]
    AccountNotInitialized,

    /// Address already holds a live account
    #[error("Account already in use")]
    AccountAlreadyInitialized,

    /// Out-of-bounds access or arithmetic overflow; aborts the whole operation
    #[error("Program failed to complete: {0}")]
    ProgramFault(String),
}

impl SwapError {
    /// Create a program fault
    pub fn fault<S: Into<String>>(msg: S) -> Self {
        Self::ProgramFault(msg.into())
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::AuthExpired => 6000,
            Self::NotExpiredYet => 6001,
            Self::InvalidSecret => 6003,
            Self::KindUnknown => 6005,
            Self::TooManyConfirmations => 6006,
            Self::InvalidTxVerifyProgramId => 6007,
            Self::InvalidTxVerifyIx => 6008,
            Self::InvalidTxVerifyTxid => 6009,
            Self::InvalidTxVerifyConfirmations => 6010,
            Self::InvalidTx => 6011,
            Self::InvalidNonce => 6012,
            Self::InvalidVout => 6013,
            Self::InvalidUserData => 6016,
            Self::InvalidBlockheightVerifyProgramId => 6017,
            Self::InvalidBlockheightVerifyIx => 6018,
            Self::InvalidBlockheightVerifyHeight => 6019,
            Self::InvalidBlockheightVerifyOperation => 6020,
            Self::SignatureVerificationFailedInvalidProgram => 6021,
            Self::SignatureVerificationFailedInvalidData => 6025,
            Self::InvalidSwapDataPayIn => 6026,
            Self::InvalidSwapDataNonce => 6027,
            Self::ConstraintRaw => 2003,
            Self::ConstraintSeeds => 2006,
            Self::ConstraintAddress => 2012,
            Self::ConstraintTokenMint => 2014,
            Self::AccountNotInitialized => 3012,
            Self::AccountAlreadyInitialized => 0,
            Self::ProgramFault(_) => 1,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthExpired
            | Self::NotExpiredYet
            | Self::SignatureVerificationFailedInvalidProgram
            | Self::SignatureVerificationFailedInvalidData => ErrorCategory::Authorization,

            Self::InvalidSecret
            | Self::InvalidNonce
            | Self::InvalidTx
            | Self::InvalidVout
            | Self::InvalidTxVerifyProgramId
            | Self::InvalidTxVerifyIx
            | Self::InvalidTxVerifyTxid
            | Self::InvalidTxVerifyConfirmations
            | Self::InvalidBlockheightVerifyProgramId
            | Self::InvalidBlockheightVerifyIx
            | Self::InvalidBlockheightVerifyHeight
            | Self::InvalidBlockheightVerifyOperation => ErrorCategory::Proof,

            Self::ConstraintRaw
            | Self::ConstraintSeeds
            | Self::ConstraintAddress
            | Self::ConstraintTokenMint
            | Self::AccountNotInitialized
            | Self::AccountAlreadyInitialized
            | Self::InvalidUserData => ErrorCategory::Structural,

            Self::TooManyConfirmations
            | Self::InvalidSwapDataNonce
            | Self::InvalidSwapDataPayIn
            | Self::KindUnknown => ErrorCategory::Configuration,

            Self::ProgramFault(_) => ErrorCategory::Fault,
        }
    }
}

impl From<LedgerError> for SwapError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { .. } => Self::ConstraintRaw,
            LedgerError::AccountNotFound(_) => Self::AccountNotInitialized,
            LedgerError::MintMismatch { .. } => Self::ConstraintTokenMint,
            LedgerError::AccountExists(_) => Self::AccountAlreadyInitialized,
            LedgerError::Overflow => Self::fault("ledger balance overflow"),
        }
    }
}

impl From<swap_core::CoreError> for SwapError {
    fn from(err: swap_core::CoreError) -> Self {
        use swap_core::CoreError;
        match err {
            CoreError::UnknownSwapType(_) => Self::KindUnknown,
            CoreError::MerkleNodeLength(_)
            | CoreError::MalformedTransaction(_)
            | CoreError::SegwitNotStripped
            | CoreError::NonUniformSequence
            | CoreError::SequenceHasConsensusMeaning(_) => Self::InvalidTx,
            other => Self::fault(other.to_string()),
        }
    }
}

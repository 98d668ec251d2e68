//! Swap terms - the immutable part of every escrow
//!
//! `SwapData` is fixed when an escrow is initialized and never changes
//! afterwards. Its byte layout is canonical (little-endian integers, one byte
//! per flag, no padding) so off-chain parties can commit to and compare terms
//! without sharing a serializer.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Expiry values below this are Bitcoin block heights, at or above it they
/// are unix timestamps in seconds.
pub const BLOCKHEIGHT_EXPIRY_THRESHOLD: u64 = 1_000_000_000;

/// Locktimes at or above this value are interpreted as timestamps by Bitcoin
/// consensus; nonced swaps store their offset from it.
pub const NONCE_LOCKTIME_OFFSET: u64 = 500_000_000;

/// Top nibble that strips an nSequence of its relative-locktime meaning.
pub const NONCE_SEQUENCE_TAG: u32 = 0xF000_0000;

const NONCE_SEQUENCE_MASK: u64 = 0x00FF_FFFF;

pub const SWAP_TYPE_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SwapType {
    /// Hash-locked: claimed with the sha256 preimage of `hash`
    Htlc = 0,
    /// Claimed with a confirmed transaction paying the committed output
    Chain = 1,
    /// Like `Chain`, with the output additionally pinned by locktime/nSequence
    ChainNonced = 2,
    /// Claimed with a confirmed transaction whose id is `hash`
    ChainTxhash = 3,
}

impl SwapType {
    pub const ALL: [SwapType; SWAP_TYPE_COUNT] = [
        SwapType::Htlc,
        SwapType::Chain,
        SwapType::ChainNonced,
        SwapType::ChainTxhash,
    ];

    /// Index into the per-kind reputation arrays
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_chain(self) -> bool {
        !matches!(self, SwapType::Htlc)
    }
}

impl TryFrom<u8> for SwapType {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SwapType::Htlc),
            1 => Ok(SwapType::Chain),
            2 => Ok(SwapType::ChainNonced),
            3 => Ok(SwapType::ChainTxhash),
            other => Err(CoreError::UnknownSwapType(other)),
        }
    }
}

/// How an escrow's `expiry` field is to be checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    BlockHeight(u32),
    Timestamp(u64),
}

impl Expiry {
    pub fn from_raw(expiry: u64, threshold: u64) -> Self {
        // Larger thresholds are capped so heights stay within u32
        if expiry < threshold.min(BLOCKHEIGHT_EXPIRY_THRESHOLD) {
            Expiry::BlockHeight(expiry as u32)
        } else {
            Expiry::Timestamp(expiry)
        }
    }
}

/// Locktime and nSequence a nonced claim transaction has to carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoncedLock {
    pub locktime: u64,
    pub n_sequence: u32,
}

impl NoncedLock {
    /// Splits a nonce into its 5-byte locktime offset and 3-byte sequence tail
    pub fn from_nonce(nonce: u64) -> Self {
        Self {
            locktime: (nonce >> 24) + NONCE_LOCKTIME_OFFSET,
            n_sequence: NONCE_SEQUENCE_TAG | (nonce & NONCE_SEQUENCE_MASK) as u32,
        }
    }

    /// Inverse of [`NoncedLock::from_nonce`]; `None` when the pair cannot be
    /// expressed as a nonce.
    pub fn to_nonce(locktime: u32, n_sequence: u32) -> Option<u64> {
        let offset = (locktime as u64).checked_sub(NONCE_LOCKTIME_OFFSET)?;
        if n_sequence & 0xFF00_0000 != NONCE_SEQUENCE_TAG {
            return None;
        }
        Some((offset << 24) | (n_sequence as u64 & NONCE_SEQUENCE_MASK))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapData {
    pub kind: SwapType,
    /// Bitcoin confirmations required for chain kinds
    pub confirmations: u16,
    /// Non-zero only for `ChainNonced`
    pub nonce: u64,

    /// Commitment the claim has to open:
    /// payment hash for `Htlc`, txo hash for `Chain`/`ChainNonced`,
    /// reversed transaction id for `ChainTxhash`
    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],

    /// Funds came from an external token account into the vault
    pub pay_in: bool,
    /// Funds leave to an external token account instead of an internal balance
    pub pay_out: bool,

    pub amount: u64,
    pub expiry: u64,

    /// Correlates audit events, not used for uniqueness
    pub sequence: u64,
}

impl SwapData {
    pub const LEN: usize = 1 + 2 + 8 + 32 + 1 + 1 + 8 + 8 + 8;

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0] = self.kind as u8;
        out[1..3].copy_from_slice(&self.confirmations.to_le_bytes());
        out[3..11].copy_from_slice(&self.nonce.to_le_bytes());
        out[11..43].copy_from_slice(&self.hash);
        out[43] = self.pay_in as u8;
        out[44] = self.pay_out as u8;
        out[45..53].copy_from_slice(&self.amount.to_le_bytes());
        out[53..61].copy_from_slice(&self.expiry.to_le_bytes());
        out[61..69].copy_from_slice(&self.sequence.to_le_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() != Self::LEN {
            return Err(CoreError::InvalidLength {
                expected: Self::LEN,
                actual: data.len(),
            });
        }

        let u64_at = |start: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&data[start..start + 8]);
            u64::from_le_bytes(buf)
        };
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&data[11..43]);

        Ok(Self {
            kind: SwapType::try_from(data[0])?,
            confirmations: u16::from_le_bytes([data[1], data[2]]),
            nonce: u64_at(3),
            hash,
            pay_in: decode_bool(data[43])?,
            pay_out: decode_bool(data[44])?,
            amount: u64_at(45),
            expiry: u64_at(53),
            sequence: u64_at(61),
        })
    }

    pub fn expiry_kind(&self, threshold: u64) -> Expiry {
        Expiry::from_raw(self.expiry, threshold)
    }

    pub fn nonced_lock(&self) -> NoncedLock {
        NoncedLock::from_nonce(self.nonce)
    }
}

fn decode_bool(byte: u8) -> Result<bool, CoreError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CoreError::InvalidBool(other)),
    }
}

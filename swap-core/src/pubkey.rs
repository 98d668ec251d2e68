//! Identities and seeded addresses
//!
//! Every party, token account, vault and escrow record is named by a 32-byte
//! key. Program-owned records live at addresses derived from a fixed list of
//! seeds, so anyone can recompute where a record must be and reject an
//! account that was substituted for it.

use std::{fmt, str::FromStr};

use bitcoin::hashes::{sha256, Hash, HashEngine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

const DERIVATION_MARKER: &[u8] = b"ProgramDerivedAddress";

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Deterministic key for a human readable label, used for well-known
    /// program ids and in fixtures.
    pub fn from_label(label: &str) -> Self {
        Self(sha256::Hash::hash(label.as_bytes()).to_byte_array())
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Derives the address owned by `program_id` for the given seeds.
    pub fn find_program_address(seeds: &[&[u8]], program_id: &Pubkey) -> Pubkey {
        let mut engine = sha256::Hash::engine();
        for seed in seeds {
            engine.input(seed);
        }
        engine.input(&program_id.0);
        engine.input(DERIVATION_MARKER);
        Pubkey(sha256::Hash::from_engine(engine).to_byte_array())
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", hex::encode(self.0))
    }
}

impl FromStr for Pubkey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| CoreError::InvalidPubkey(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

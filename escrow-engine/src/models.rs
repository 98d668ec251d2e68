//! Core data models for the escrow program
//!
//! Persistent records (escrow states, user accounts, claim data buffers) and
//! the request types accepted by each operation. Requests name every account
//! they touch; the program checks each one against where it must live.

use serde::{Deserialize, Serialize};
use swap_core::{Pubkey, SwapData, SwapType, SWAP_TYPE_COUNT};

use crate::attestation::Preamble;

/// A live escrow, keyed by the hash of its swap data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowState {
    pub data: SwapData,

    /// Party depositing the funds
    pub offerer: Pubkey,
    /// Funding token account, only for pay-in escrows
    pub offerer_ata: Option<Pubkey>,

    /// Party able to claim once the spend condition is met
    pub claimer: Pubkey,
    /// Payout token account, only for pay-out escrows
    pub claimer_ata: Option<Pubkey>,

    pub mint: Pubkey,

    /// Native reward for whoever submits a successful claim
    pub claimer_bounty: u64,
    /// Native compensation for the offerer on a timeout refund
    pub security_deposit: u64,
}

impl EscrowState {
    /// Party that funded the native pot and receives what is left of it
    pub fn funder(&self) -> Pubkey {
        if self.data.pay_in {
            self.offerer
        } else {
            self.claimer
        }
    }

    /// Native amount held at the escrow address. Only one of bounty and
    /// deposit is ever paid out, so the larger of the two covers both.
    pub fn native_pot(&self) -> u64 {
        self.security_deposit.max(self.claimer_bounty)
    }
}

/// Internal balance and reputation of one owner for one mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub owner: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,

    pub success_volume: [u64; SWAP_TYPE_COUNT],
    pub success_count: [u64; SWAP_TYPE_COUNT],

    pub fail_volume: [u64; SWAP_TYPE_COUNT],
    pub fail_count: [u64; SWAP_TYPE_COUNT],

    pub coop_close_volume: [u64; SWAP_TYPE_COUNT],
    pub coop_close_count: [u64; SWAP_TYPE_COUNT],
}

impl UserAccount {
    pub fn new(owner: Pubkey, mint: Pubkey) -> Self {
        Self {
            owner,
            mint,
            amount: 0,
            success_volume: [0; SWAP_TYPE_COUNT],
            success_count: [0; SWAP_TYPE_COUNT],
            fail_volume: [0; SWAP_TYPE_COUNT],
            fail_count: [0; SWAP_TYPE_COUNT],
            coop_close_volume: [0; SWAP_TYPE_COUNT],
            coop_close_count: [0; SWAP_TYPE_COUNT],
        }
    }
}

/// Claim proof staged ahead of a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBuffer {
    pub owner: Pubkey,
    pub data: Vec<u8>,
}

/// Where tokens come from or go to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceAccount {
    /// External token account
    Token(Pubkey),
    /// User account holding an internal balance
    Internal(Pubkey),
}

/// Offerer's side of an initialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingSource {
    /// Tokens move from the offerer's token account into the vault
    PayIn { offerer_token_account: Pubkey },
    /// The offerer's internal balance is debited; the claimer posts the
    /// native deposit and bounty
    Internal {
        offerer_user_account: Pubkey,
        security_deposit: u64,
        claimer_bounty: u64,
    },
}

impl FundingSource {
    pub fn is_pay_in(&self) -> bool {
        matches!(self, FundingSource::PayIn { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializeRequest {
    pub swap_data: SwapData,
    pub offerer: Pubkey,
    pub claimer: Pubkey,
    pub mint: Pubkey,
    /// Must be the address derived from `swap_data.hash`
    pub escrow_address: Pubkey,
    pub funding: FundingSource,
    /// Claimer's payout token account (pay-out) or user account (otherwise)
    pub claimer_destination: BalanceAccount,
    /// Commitment to the expected Bitcoin output, only forwarded to indexers
    pub txo_hash: [u8; 32],
    /// Validity limit of the counterparties' agreement on these terms
    pub auth_expiry: u64,
}

/// Claim proof bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimSecret {
    Inline(Vec<u8>),
    /// Read from a data buffer previously written by the signer
    Buffer(Pubkey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub hash: [u8; 32],
    pub escrow_address: Pubkey,
    /// Submitter, receives the claimer bounty
    pub signer: Pubkey,
    /// Must be the escrow's funder, receives the rest of the native pot
    pub initializer: Pubkey,
    pub claimer_destination: BalanceAccount,
    pub secret: ClaimSecret,
    pub preamble: Preamble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundAuth {
    /// Unilateral refund after expiry
    Timeout,
    /// Claimer-signed refund, valid until `auth_expiry`
    Cooperative { auth_expiry: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundRequest {
    pub hash: [u8; 32],
    pub escrow_address: Pubkey,
    /// Submitter, has to be the recorded offerer
    pub offerer: Pubkey,
    pub claimer: Pubkey,
    /// Offerer's funding token account (pay-in) or user account (otherwise)
    pub offerer_destination: BalanceAccount,
    /// Claimer's user account, required unless the escrow pays out
    pub claimer_user_account: Option<Pubkey>,
    pub auth: RefundAuth,
    pub preamble: Preamble,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositRequest {
    pub signer: Pubkey,
    pub mint: Pubkey,
    pub signer_token_account: Pubkey,
    pub user_account: Pubkey,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawRequest {
    pub signer: Pubkey,
    pub mint: Pubkey,
    pub signer_token_account: Pubkey,
    pub user_account: Pubkey,
    pub amount: u64,
}

/// Reputation counters of one owner, by swap type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationSummary {
    pub kind: SwapType,
    pub success_count: u64,
    pub success_volume: u64,
    pub coop_close_count: u64,
    pub coop_close_volume: u64,
    pub fail_count: u64,
    pub fail_volume: u64,
}

/// Custody totals for one mint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyReport {
    pub vault_balance: u64,
    pub internal_balances: u64,
    pub escrowed: u64,
}

impl CustodyReport {
    /// Every token in the vault belongs to an internal balance or a live escrow
    pub fn is_balanced(&self) -> bool {
        self.internal_balances.checked_add(self.escrowed) == Some(self.vault_balance)
    }
}

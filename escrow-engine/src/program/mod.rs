//! Escrow program - one processor per operation
//!
//! Every processor runs in three phases: validate all accounts and proofs
//! without touching state, apply the resulting ledger batch (all-or-nothing),
//! then commit the record changes, which cannot fail once validation passed.
//! A rejected operation therefore has no observable effect.

mod balance;
mod claim;
mod data;
mod initialize;
mod refund;

pub use balance::{custody_report, process_deposit, process_withdraw};
pub use claim::process_claim;
pub use data::{process_close_data, process_init_data, process_write_data};
pub use initialize::process_initialize;
pub use refund::process_refund;

use std::sync::Arc;

use swap_core::Pubkey;

use crate::{
    attestation::{Preamble, INSTRUCTIONS_SYSVAR_ID},
    config::EngineConfig,
    error::SwapError,
    ledger::{TokenAccount, TokenLedger},
    store::EscrowStateStore,
    EscrowResult,
};

/// Everything the program owns or moves
#[derive(Debug, Clone)]
pub struct ProgramState<L> {
    pub store: EscrowStateStore,
    pub ledger: L,
}

impl<L: TokenLedger> ProgramState<L> {
    pub fn new(program_id: Pubkey, ledger: L) -> Self {
        Self {
            store: EscrowStateStore::new(program_id),
            ledger,
        }
    }
}

/// Per-operation environment
#[derive(Debug, Clone)]
pub struct ProgramContext {
    pub config: Arc<EngineConfig>,
    pub now: u64,
}

/// Existing token account holding `mint`
fn token_account_for<L: TokenLedger>(ledger: &L, address: &Pubkey, mint: &Pubkey) -> EscrowResult<TokenAccount> {
    let account = ledger
        .token_account(address)
        .ok_or(SwapError::AccountNotInitialized)?;
    if account.mint != *mint {
        return Err(SwapError::ConstraintTokenMint);
    }
    Ok(account)
}

fn check_preamble_source(preamble: &Preamble) -> EscrowResult<()> {
    if preamble.source != INSTRUCTIONS_SYSVAR_ID {
        return Err(SwapError::ConstraintAddress);
    }
    Ok(())
}

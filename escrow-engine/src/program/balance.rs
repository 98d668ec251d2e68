use swap_core::Pubkey;
use tracing::info;

use super::{token_account_for, ProgramState};
use crate::{
    error::SwapError,
    ledger::{LedgerBatch, TokenLedger},
    models::{CustodyReport, DepositRequest, WithdrawRequest},
    EscrowResult,
};

/// Moves tokens from the signer's token account into its internal balance.
/// Returns the new internal balance.
pub fn process_deposit<L: TokenLedger>(state: &mut ProgramState<L>, req: &DepositRequest) -> EscrowResult<u64> {
    state
        .store
        .check_user_account_address(&req.user_account, &req.signer, &req.mint)?;

    let source = token_account_for(&state.ledger, &req.signer_token_account, &req.mint)?;
    if source.owner != req.signer || source.amount < req.amount {
        return Err(SwapError::ConstraintRaw);
    }

    let current = state
        .store
        .user_account(&req.signer, &req.mint)
        .map_or(0, |account| account.amount);
    let balance = current
        .checked_add(req.amount)
        .ok_or_else(|| SwapError::fault("internal balance overflow"))?;

    let vault = state.store.vault_address(&req.mint);
    let mut batch = LedgerBatch::new();
    batch
        .open_token_account(vault, state.store.vault_authority(), req.mint)
        .token_transfer(req.signer_token_account, vault, req.mint, req.amount);
    state.ledger.apply(&batch)?;

    state.store.user_account_mut(&req.signer, &req.mint, true)?.amount = balance;

    info!("Deposited {} of {} for {}", req.amount, req.mint, req.signer);
    Ok(balance)
}

/// Moves tokens from the signer's internal balance out of the vault.
/// Returns the remaining internal balance.
pub fn process_withdraw<L: TokenLedger>(state: &mut ProgramState<L>, req: &WithdrawRequest) -> EscrowResult<u64> {
    let account = state
        .store
        .user_account_at(&req.user_account, &req.signer, &req.mint)?;
    if account.amount < req.amount {
        return Err(SwapError::ConstraintRaw);
    }
    let balance = account.amount - req.amount;

    token_account_for(&state.ledger, &req.signer_token_account, &req.mint)?;

    let mut batch = LedgerBatch::new();
    batch.token_transfer(
        state.store.vault_address(&req.mint),
        req.signer_token_account,
        req.mint,
        req.amount,
    );
    state.ledger.apply(&batch)?;

    state.store.user_account_mut(&req.signer, &req.mint, false)?.amount = balance;

    info!("Withdrew {} of {} for {}", req.amount, req.mint, req.signer);
    Ok(balance)
}

/// Vault balance against what the program owes for `mint`
pub fn custody_report<L: TokenLedger>(state: &ProgramState<L>, mint: &Pubkey) -> CustodyReport {
    let vault_balance = state
        .ledger
        .token_account(&state.store.vault_address(mint))
        .map_or(0, |account| account.amount);
    let internal_balances = state
        .store
        .user_accounts()
        .filter(|account| account.mint == *mint)
        .fold(0u64, |sum, account| sum.saturating_add(account.amount));
    let escrowed = state
        .store
        .escrows()
        .filter(|escrow| escrow.mint == *mint)
        .fold(0u64, |sum, escrow| sum.saturating_add(escrow.data.amount));

    CustodyReport {
        vault_balance,
        internal_balances,
        escrowed,
    }
}

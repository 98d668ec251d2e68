use swap_core::RefundEvent;
use tracing::info;

use super::{check_preamble_source, token_account_for, ProgramContext, ProgramState};
use crate::{
    error::SwapError,
    ledger::{LedgerBatch, TokenLedger},
    models::{BalanceAccount, RefundRequest},
    refund_authorizer::{RefundAuthorizer, RefundKind},
    reputation::{ReputationTracker, Resolution},
    EscrowResult,
};

pub fn process_refund<L: TokenLedger>(
    state: &mut ProgramState<L>,
    ctx: &ProgramContext,
    req: &RefundRequest,
) -> EscrowResult<RefundEvent> {
    let escrow = state.store.escrow_at(&req.hash, &req.escrow_address)?.clone();
    let data = &escrow.data;

    if req.offerer != escrow.offerer || req.claimer != escrow.claimer {
        return Err(SwapError::ConstraintRaw);
    }

    // Offerer's internal balance after the refund, for non pay-in escrows
    let refunded = match (data.pay_in, req.offerer_destination) {
        (true, BalanceAccount::Token(address)) => {
            if escrow.offerer_ata != Some(address) {
                return Err(SwapError::ConstraintRaw);
            }
            token_account_for(&state.ledger, &address, &escrow.mint)?;
            None
        }
        (false, BalanceAccount::Internal(address)) => {
            let offerer = state
                .store
                .user_account_at(&address, &escrow.offerer, &escrow.mint)?;
            let balance = offerer
                .amount
                .checked_add(data.amount)
                .ok_or_else(|| SwapError::fault("offerer balance overflow"))?;
            Some(balance)
        }
        _ => return Err(SwapError::ConstraintRaw),
    };

    if !data.pay_out {
        let address = req.claimer_user_account.ok_or(SwapError::ConstraintRaw)?;
        state
            .store
            .user_account_at(&address, &escrow.claimer, &escrow.mint)?;
    }

    check_preamble_source(&req.preamble)?;

    let kind = RefundAuthorizer::new(&ctx.config, ctx.now).authorize(&escrow, req.auth, &req.preamble)?;

    let mut batch = LedgerBatch::new();
    if let (true, Some(offerer_ata)) = (data.pay_in, escrow.offerer_ata) {
        batch.token_transfer(state.store.vault_address(&escrow.mint), offerer_ata, escrow.mint, data.amount);
    }
    let pot = escrow.native_pot();
    let deposit = match kind {
        RefundKind::Cooperative => 0,
        RefundKind::Timeout => escrow.security_deposit.min(pot),
    };
    batch
        .native_transfer(req.escrow_address, escrow.offerer, deposit)
        .native_transfer(req.escrow_address, escrow.funder(), pot - deposit);

    state.ledger.apply(&batch)?;

    state.store.remove_escrow(&req.hash);
    if let Some(balance) = refunded {
        state
            .store
            .user_account_mut(&escrow.offerer, &escrow.mint, false)?
            .amount = balance;
    }
    if !data.pay_out {
        let resolution = match kind {
            RefundKind::Cooperative => Resolution::CooperativeClose,
            RefundKind::Timeout => Resolution::Failure,
        };
        let claimer = state.store.user_account_mut(&escrow.claimer, &escrow.mint, false)?;
        ReputationTracker::record(claimer, data, resolution);
    }

    info!(
        "Refunded {:?} escrow {} ({:?}, {} back to {}, deposit {})",
        data.kind,
        hex::encode(data.hash),
        kind,
        data.amount,
        escrow.offerer,
        deposit
    );

    Ok(RefundEvent {
        hash: data.hash,
        sequence: data.sequence,
    })
}

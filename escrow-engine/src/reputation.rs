//! Reputation Tracker - on-ledger claimer track record
//!
//! Counters live on the claimer's user account and are kept per swap type.
//! They only ever grow (saturating), one step per resolved escrow that did
//! not pay out to an external account.

use swap_core::{SwapData, SwapType};

use crate::models::{ReputationSummary, UserAccount};

/// How an escrow ended, from the claimer's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Claimed with a valid proof
    Success,
    /// Refunded with the claimer's consent
    CooperativeClose,
    /// Refunded after the claimer let it expire
    Failure,
}

pub struct ReputationTracker;

impl ReputationTracker {
    pub fn record(account: &mut UserAccount, data: &SwapData, resolution: Resolution) {
        let kind = data.kind.index();
        let (count, volume) = match resolution {
            Resolution::Success => (&mut account.success_count, &mut account.success_volume),
            Resolution::CooperativeClose => (&mut account.coop_close_count, &mut account.coop_close_volume),
            Resolution::Failure => (&mut account.fail_count, &mut account.fail_volume),
        };
        count[kind] = count[kind].saturating_add(1);
        volume[kind] = volume[kind].saturating_add(data.amount);
    }

    pub fn summary(account: &UserAccount) -> Vec<ReputationSummary> {
        SwapType::ALL
            .iter()
            .map(|kind| {
                let i = kind.index();
                ReputationSummary {
                    kind: *kind,
                    success_count: account.success_count[i],
                    success_volume: account.success_volume[i],
                    coop_close_count: account.coop_close_count[i],
                    coop_close_volume: account.coop_close_volume[i],
                    fail_count: account.fail_count[i],
                    fail_volume: account.fail_volume[i],
                }
            })
            .collect()
    }
}

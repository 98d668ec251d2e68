//! Swap Engine - serialized, async front end of the escrow program
//!
//! All operations run under a single write lock on the program state, so
//! two claims (or a claim and a refund) racing on the same escrow resolve to
//! exactly one winner. Accepted operations append their audit event to the
//! event log and broadcast it to subscribers, in the order they took effect.
//! The log is a bounded replay buffer of the most recent
//! `event_log_capacity` events; durable history belongs to subscribers.

use std::{collections::VecDeque, sync::Arc};

use swap_core::{ClaimEvent, InitializeEvent, Pubkey, RefundEvent, SwapEvent};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::{
    clock::Clock,
    config::EngineConfig,
    ledger::{MemoryLedger, TokenLedger},
    models::{
        ClaimRequest, CustodyReport, DataBuffer, DepositRequest, EscrowState, InitializeRequest, RefundRequest,
        ReputationSummary, UserAccount, WithdrawRequest,
    },
    program::{self, ProgramContext, ProgramState},
    reputation::ReputationTracker,
    EscrowResult,
};

/// Capacity of the event broadcast channel; slow subscribers lag, they never
/// block the engine
const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct SwapEngine<L: TokenLedger = MemoryLedger> {
    config: Arc<EngineConfig>,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<ProgramState<L>>>,
    events: Arc<RwLock<VecDeque<SwapEvent>>>,
    event_tx: broadcast::Sender<SwapEvent>,
}

impl<L: TokenLedger> Clone for SwapEngine<L> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            clock: self.clock.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

impl<L: TokenLedger + 'static> SwapEngine<L> {
    pub fn new(config: EngineConfig, ledger: L, clock: Arc<dyn Clock>) -> Self {
        let state = ProgramState::new(config.program_id, ledger);
        Self::from_state(config, state, clock)
    }

    /// Resumes from existing program state
    pub fn from_state(config: EngineConfig, state: ProgramState<L>, clock: Arc<dyn Clock>) -> Self {
        info!(
            "Starting swap engine (program {}, relay {}, max confirmations {})",
            config.program_id,
            config.relay_program_id,
            config.max_confirmations()
        );

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config: Arc::new(config),
            clock,
            state: Arc::new(RwLock::new(state)),
            events: Arc::new(RwLock::new(VecDeque::new())),
            event_tx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Operations

    pub async fn initialize(&self, req: InitializeRequest) -> EscrowResult<InitializeEvent> {
        self.execute("initialize", |state, ctx| program::process_initialize(state, ctx, &req))
            .await
    }

    pub async fn claim(&self, req: ClaimRequest) -> EscrowResult<ClaimEvent> {
        self.execute("claim", |state, ctx| program::process_claim(state, ctx, &req))
            .await
    }

    pub async fn refund(&self, req: RefundRequest) -> EscrowResult<RefundEvent> {
        self.execute("refund", |state, ctx| program::process_refund(state, ctx, &req))
            .await
    }

    /// Returns the new internal balance
    pub async fn deposit(&self, req: DepositRequest) -> EscrowResult<u64> {
        self.mutate("deposit", |state| program::process_deposit(state, &req))
            .await
    }

    /// Returns the remaining internal balance
    pub async fn withdraw(&self, req: WithdrawRequest) -> EscrowResult<u64> {
        self.mutate("withdraw", |state| program::process_withdraw(state, &req))
            .await
    }

    pub async fn init_data(&self, signer: Pubkey, address: Pubkey) -> EscrowResult<()> {
        self.mutate("init_data", |state| program::process_init_data(state, &signer, address))
            .await
    }

    /// Returns the buffer length after the write
    pub async fn write_data(&self, signer: Pubkey, address: Pubkey, start: usize, bytes: &[u8]) -> EscrowResult<usize> {
        self.mutate("write_data", |state| {
            program::process_write_data(state, &signer, &address, start, bytes)
        })
        .await
    }

    pub async fn close_data(&self, signer: Pubkey, address: Pubkey) -> EscrowResult<()> {
        self.mutate("close_data", |state| program::process_close_data(state, &signer, &address))
            .await
    }

    // Queries

    pub async fn escrow(&self, hash: &[u8; 32]) -> Option<EscrowState> {
        self.state.read().await.store.escrow(hash).cloned()
    }

    pub async fn user_account(&self, owner: &Pubkey, mint: &Pubkey) -> Option<UserAccount> {
        self.state.read().await.store.user_account(owner, mint).cloned()
    }

    pub async fn reputation(&self, owner: &Pubkey, mint: &Pubkey) -> Option<Vec<ReputationSummary>> {
        self.state
            .read()
            .await
            .store
            .user_account(owner, mint)
            .map(ReputationTracker::summary)
    }

    pub async fn data_buffer(&self, address: &Pubkey) -> Option<DataBuffer> {
        self.state.read().await.store.data_buffer(address).cloned()
    }

    pub async fn custody_report(&self, mint: &Pubkey) -> CustodyReport {
        program::custody_report(&*self.state.read().await, mint)
    }

    /// Most recent accepted events, oldest first. Older events are evicted
    /// once the log holds `event_log_capacity` of them.
    pub async fn events(&self) -> Vec<SwapEvent> {
        self.events.read().await.iter().cloned().collect()
    }

    /// Events accepted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.event_tx.subscribe()
    }

    pub async fn escrow_address(&self, hash: &[u8; 32]) -> Pubkey {
        self.state.read().await.store.escrow_address(hash)
    }

    pub async fn user_account_address(&self, owner: &Pubkey, mint: &Pubkey) -> Pubkey {
        self.state.read().await.store.user_account_address(owner, mint)
    }

    pub async fn vault_address(&self, mint: &Pubkey) -> Pubkey {
        self.state.read().await.store.vault_address(mint)
    }

    /// Direct ledger access, for funding accounts outside the program
    pub async fn with_ledger<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        f(&mut self.state.write().await.ledger)
    }

    fn context(&self) -> ProgramContext {
        ProgramContext {
            config: self.config.clone(),
            now: self.clock.now_ts(),
        }
    }

    /// Runs an event-emitting operation and records its event while the
    /// state lock is still held
    async fn execute<E, F>(&self, operation: &str, f: F) -> EscrowResult<E>
    where
        E: Clone + Into<SwapEvent>,
        F: FnOnce(&mut ProgramState<L>, &ProgramContext) -> EscrowResult<E>,
    {
        let mut state = self.state.write().await;
        let ctx = self.context();

        match f(&mut state, &ctx) {
            Ok(event) => {
                let event_out: SwapEvent = event.clone().into();
                self.record(event_out.clone()).await;
                // No subscribers is not an error
                let _ = self.event_tx.send(event_out);
                Ok(event)
            }
            Err(e) => {
                warn!("{} rejected with {} ({:?}): {}", operation, e.code(), e.category(), e);
                Err(e)
            }
        }
    }

    async fn record(&self, event: SwapEvent) {
        let mut log = self.events.write().await;
        while log.len() >= self.config.event_log_capacity.max(1) {
            log.pop_front();
        }
        log.push_back(event);
    }

    async fn mutate<T, F>(&self, operation: &str, f: F) -> EscrowResult<T>
    where
        F: FnOnce(&mut ProgramState<L>) -> EscrowResult<T>,
    {
        let mut state = self.state.write().await;
        f(&mut state).map_err(|e| {
            warn!("{} rejected with {} ({:?}): {}", operation, e.code(), e.category(), e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        attestation::{Preamble, TxInclusionProof},
        clock::ManualClock,
        error::SwapError,
        models::{BalanceAccount, ClaimSecret, RefundAuth},
        refund_authorizer::REFUND_HEIGHT_OPERATOR,
        testing::{htlc_pair, Fixture, MemoryRelay},
    };
    use swap_core::SwapType;

    struct Harness {
        fx: Fixture,
        clock: Arc<ManualClock>,
        engine: SwapEngine,
    }

    fn harness() -> Harness {
        let fx = Fixture::new();
        let clock = Arc::new(ManualClock::new(fx.now));
        let engine = SwapEngine::from_state(fx.config.as_ref().clone(), fx.state.clone(), clock.clone());
        Harness { fx, clock, engine }
    }

    fn claim(fx: &Fixture, hash: [u8; 32], secret: Vec<u8>, preamble: Preamble) -> ClaimRequest {
        ClaimRequest {
            hash,
            escrow_address: fx.state.store.escrow_address(&hash),
            signer: fx.claimer,
            initializer: fx.claimer,
            claimer_destination: BalanceAccount::Internal(
                fx.state.store.user_account_address(&fx.claimer, &fx.mint),
            ),
            secret: ClaimSecret::Inline(secret),
            preamble,
        }
    }

    fn timeout_refund(fx: &Fixture, hash: [u8; 32], preamble: Preamble) -> RefundRequest {
        RefundRequest {
            hash,
            escrow_address: fx.state.store.escrow_address(&hash),
            offerer: fx.offerer,
            claimer: fx.claimer,
            offerer_destination: BalanceAccount::Internal(
                fx.state.store.user_account_address(&fx.offerer, &fx.mint),
            ),
            claimer_user_account: Some(fx.state.store.user_account_address(&fx.claimer, &fx.mint)),
            auth: RefundAuth::Timeout,
            preamble,
        }
    }

    #[tokio::test]
    async fn htlc_swap_settles_and_logs_events() {
        let Harness { fx, engine, .. } = harness();
        let mut events = engine.subscribe();
        let (preimage, hash) = htlc_pair(9);

        engine.initialize(fx.internal_init(SwapType::Htlc, hash, 100)).await.unwrap();
        let claimed = engine
            .claim(claim(&fx, hash, preimage.to_vec(), Preamble::new()))
            .await
            .unwrap();
        assert_eq!(claimed.secret, preimage);

        let claimer = engine.user_account(&fx.claimer, &fx.mint).await.unwrap();
        assert_eq!(claimer.amount, 100);
        let reputation = engine.reputation(&fx.claimer, &fx.mint).await.unwrap();
        assert_eq!(reputation[0].success_count, 1);
        assert_eq!(reputation[0].success_volume, 100);

        let log = engine.events().await;
        assert_eq!(log.len(), 2);
        assert!(matches!(log[0], SwapEvent::Initialize(_)));
        assert_eq!(log[1], SwapEvent::Claim(claimed));
        assert_eq!(events.recv().await.unwrap(), log[0]);
        assert_eq!(events.recv().await.unwrap(), log[1]);
        assert!(engine.custody_report(&fx.mint).await.is_balanced());
    }

    #[tokio::test]
    async fn event_log_keeps_only_most_recent() {
        let fx = Fixture::new();
        let clock = Arc::new(ManualClock::new(fx.now));
        let config = EngineConfig {
            event_log_capacity: 2,
            ..fx.config.as_ref().clone()
        };
        let engine = SwapEngine::from_state(config, fx.state.clone(), clock);
        let mut events = engine.subscribe();

        let (preimage, first) = htlc_pair(10);
        let (_, second) = htlc_pair(11);
        engine.initialize(fx.internal_init(SwapType::Htlc, first, 100)).await.unwrap();
        engine.initialize(fx.internal_init(SwapType::Htlc, second, 100)).await.unwrap();
        let claimed = engine
            .claim(claim(&fx, first, preimage.to_vec(), Preamble::new()))
            .await
            .unwrap();

        let log = engine.events().await;
        assert_eq!(log.len(), 2);
        assert!(matches!(&log[0], SwapEvent::Initialize(event) if event.hash == second));
        assert_eq!(log[1], SwapEvent::Claim(claimed));

        // Subscribers still see everything
        for _ in 0..3 {
            events.recv().await.unwrap();
        }
    }

    #[tokio::test]
    async fn txhash_swap_claims_with_relay_proof() {
        let Harness { fx, engine, .. } = harness();
        let relay = MemoryRelay::new(engine.config().relay_program_id, 102);
        let txid = [0x3C; 32];
        relay.include_transaction(txid, 100).await;

        let mut init = fx.internal_init(SwapType::ChainTxhash, txid, 250);
        init.swap_data.confirmations = 3;
        engine.initialize(init).await.unwrap();

        let proof = TxInclusionProof {
            reversed_tx_id: txid,
            min_confirmations: 3,
            tx_index: 0,
            merkle_proof: vec![],
            committed_header: relay.header(100),
        };
        let preamble = Preamble::new().with_transaction_proof(&relay, &proof).await.unwrap();

        let event = engine
            .claim(claim(&fx, txid, b"ignored".to_vec(), preamble))
            .await
            .unwrap();
        assert_eq!(event.secret, txid);
        assert!(engine.escrow(&txid).await.is_none());
    }

    #[tokio::test]
    async fn height_expiry_refund_waits_for_relay_tip() {
        let Harness { fx, engine, .. } = harness();
        let relay = MemoryRelay::new(engine.config().relay_program_id, 499);
        let (_, hash) = htlc_pair(5);

        let mut init = fx.internal_init(SwapType::Htlc, hash, 100);
        init.swap_data.expiry = 500;
        engine.initialize(init).await.unwrap();

        assert!(Preamble::new()
            .with_block_height_proof(&relay, 500, REFUND_HEIGHT_OPERATOR)
            .await
            .is_err());
        assert_eq!(
            engine.refund(timeout_refund(&fx, hash, Preamble::new())).await,
            Err(SwapError::InvalidBlockheightVerifyProgramId)
        );

        relay.set_tip(500);
        let preamble = Preamble::new()
            .with_block_height_proof(&relay, 500, REFUND_HEIGHT_OPERATOR)
            .await
            .unwrap();
        engine.refund(timeout_refund(&fx, hash, preamble)).await.unwrap();

        let offerer = engine.user_account(&fx.offerer, &fx.mint).await.unwrap();
        assert_eq!(offerer.amount, Fixture::INTERNAL_BALANCE);
        let claimer = engine.user_account(&fx.claimer, &fx.mint).await.unwrap();
        assert_eq!(claimer.fail_count, [1, 0, 0, 0]);
    }

    #[tokio::test]
    async fn timestamp_refund_follows_clock() {
        let Harness { fx, clock, engine } = harness();
        let (_, hash) = htlc_pair(6);
        engine.initialize(fx.internal_init(SwapType::Htlc, hash, 100)).await.unwrap();

        assert_eq!(
            engine.refund(timeout_refund(&fx, hash, Preamble::new())).await,
            Err(SwapError::NotExpiredYet)
        );
        clock.advance(3_601);
        assert!(engine.refund(timeout_refund(&fx, hash, Preamble::new())).await.is_ok());
    }

    #[tokio::test]
    async fn racing_claims_have_one_winner() {
        let Harness { fx, engine, .. } = harness();
        let (preimage, hash) = htlc_pair(7);
        engine.initialize(fx.internal_init(SwapType::Htlc, hash, 100)).await.unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                let req = claim(&fx, hash, preimage.to_vec(), Preamble::new());
                tokio::spawn(async move { engine.claim(req).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.contains(&Err(SwapError::AccountNotInitialized)));

        let claimer = engine.user_account(&fx.claimer, &fx.mint).await.unwrap();
        assert_eq!(claimer.amount, 100);
        assert_eq!(engine.events().await.len(), 2);
    }

    #[tokio::test]
    async fn hash_can_only_back_one_live_escrow() {
        let Harness { fx, engine, .. } = harness();
        let (preimage, hash) = htlc_pair(8);

        engine.initialize(fx.internal_init(SwapType::Htlc, hash, 100)).await.unwrap();
        assert_eq!(
            engine.initialize(fx.internal_init(SwapType::Htlc, hash, 50)).await,
            Err(SwapError::AccountAlreadyInitialized)
        );

        engine
            .claim(claim(&fx, hash, preimage.to_vec(), Preamble::new()))
            .await
            .unwrap();
        assert!(engine.initialize(fx.internal_init(SwapType::Htlc, hash, 50)).await.is_ok());
    }

    #[tokio::test]
    async fn custody_stays_balanced_through_mixed_operations() {
        let Harness { fx, clock, engine } = harness();
        let (preimage, claimed) = htlc_pair(1);
        let (_, refunded) = htlc_pair(2);
        let (_, live) = htlc_pair(3);

        engine.initialize(fx.internal_init(SwapType::Htlc, claimed, 100)).await.unwrap();
        engine.initialize(fx.pay_in_init(SwapType::Htlc, refunded, 400)).await.unwrap();
        engine.initialize(fx.pay_in_init(SwapType::Htlc, live, 70)).await.unwrap();
        assert!(engine.custody_report(&fx.mint).await.is_balanced());

        engine
            .claim(claim(&fx, claimed, preimage.to_vec(), Preamble::new()))
            .await
            .unwrap();
        clock.advance(3_601);
        let mut refund = timeout_refund(&fx, refunded, Preamble::new());
        refund.offerer_destination = BalanceAccount::Token(fx.offerer_ata);
        engine.refund(refund).await.unwrap();

        engine
            .withdraw(WithdrawRequest {
                signer: fx.claimer,
                mint: fx.mint,
                signer_token_account: fx.claimer_ata,
                user_account: fx.state.store.user_account_address(&fx.claimer, &fx.mint),
                amount: 100,
            })
            .await
            .unwrap();

        let report = engine.custody_report(&fx.mint).await;
        assert!(report.is_balanced());
        assert_eq!(report.escrowed, 70);
        assert_eq!(report.internal_balances, Fixture::INTERNAL_BALANCE - 100);
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["vault_balance"], report.vault_balance);
        assert_eq!(engine.with_ledger(|ledger| ledger.token_balance(&fx.claimer_ata)).await, 100);
    }

    #[tokio::test]
    async fn claim_data_can_be_staged_in_chunks() {
        let Harness { fx, engine, .. } = harness();
        let (preimage, hash) = htlc_pair(4);
        let buffer = Pubkey::from_label("staged");
        engine.initialize(fx.internal_init(SwapType::Htlc, hash, 100)).await.unwrap();

        engine.init_data(fx.claimer, buffer).await.unwrap();
        engine.write_data(fx.claimer, buffer, 0, &preimage[..16]).await.unwrap();
        assert_eq!(engine.write_data(fx.claimer, buffer, 16, &preimage[16..]).await, Ok(32));

        let mut req = claim(&fx, hash, vec![], Preamble::new());
        req.secret = ClaimSecret::Buffer(buffer);
        engine.claim(req).await.unwrap();
        assert!(engine.data_buffer(&buffer).await.is_none());
    }
}

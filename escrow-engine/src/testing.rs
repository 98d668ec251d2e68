//! Test support: in-memory relay, Bitcoin transaction builders and a funded
//! program fixture. Enabled for downstream crates via the `testing` feature.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use bitcoin::{
    absolute::LockTime, consensus, hashes::Hash, transaction::Version, Amount, OutPoint, ScriptBuf, Sequence,
    Transaction, TxIn, TxOut, Witness,
};
use swap_core::{commitment, Pubkey, SwapData, SwapType};
use tokio::sync::RwLock;

use crate::{
    attestation::{BlockHeightOperator, ChainRelay, CommittedHeader, RelayError},
    config::EngineConfig,
    ledger::MemoryLedger,
    models::{BalanceAccount, CustodyReport, DepositRequest, EscrowState, FundingSource, InitializeRequest},
    program::{custody_report, process_deposit, ProgramContext, ProgramState},
};

/// Relay that trusts whatever inclusions the test registers
pub struct MemoryRelay {
    program_id: Pubkey,
    tip: AtomicU32,
    inclusions: RwLock<HashMap<[u8; 32], u32>>,
}

impl MemoryRelay {
    pub fn new(program_id: Pubkey, tip: u32) -> Self {
        Self {
            program_id,
            tip: AtomicU32::new(tip),
            inclusions: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_tip(&self, tip: u32) {
        self.tip.store(tip, Ordering::SeqCst);
    }

    pub fn tip(&self) -> u32 {
        self.tip.load(Ordering::SeqCst)
    }

    /// Records `reversed_tx_id` as mined at `height`
    pub async fn include_transaction(&self, reversed_tx_id: [u8; 32], height: u32) {
        self.inclusions.write().await.insert(reversed_tx_id, height);
    }

    /// Header the relay has committed at `height`
    pub fn header(&self, height: u32) -> CommittedHeader {
        CommittedHeader {
            height,
            block_hash: commitment::double_sha256(&height.to_le_bytes()),
            merkle_root: [0; 32],
        }
    }
}

#[async_trait]
impl ChainRelay for MemoryRelay {
    fn program_id(&self) -> Pubkey {
        self.program_id
    }

    async fn verify_transaction(
        &self,
        reversed_tx_id: [u8; 32],
        min_confirmations: u16,
        _tx_index: u32,
        _merkle_proof: &[[u8; 32]],
        committed_header: &CommittedHeader,
    ) -> Result<u16, RelayError> {
        let tip = self.tip();
        if committed_header.height > tip {
            return Err(RelayError::UnknownHeader(committed_header.height));
        }

        let height = self
            .inclusions
            .read()
            .await
            .get(&reversed_tx_id)
            .copied()
            .ok_or(RelayError::InvalidMerkleProof)?;
        if height != committed_header.height {
            return Err(RelayError::InvalidMerkleProof);
        }

        let confirmations = u16::try_from(tip - height + 1).unwrap_or(u16::MAX);
        if confirmations < min_confirmations {
            return Err(RelayError::InsufficientConfirmations {
                required: min_confirmations,
                actual: confirmations,
            });
        }
        Ok(confirmations)
    }

    async fn block_height(&self, height: u32, operator: BlockHeightOperator) -> Result<(), RelayError> {
        let tip = self.tip();
        if !operator.holds(tip, height) {
            return Err(RelayError::HeightComparisonFailed { height, operator, tip });
        }
        Ok(())
    }
}

/// Deterministic preimage and its payment hash
pub fn htlc_pair(seed: u8) -> ([u8; 32], [u8; 32]) {
    let preimage = [seed; 32];
    (preimage, commitment::htlc_hash(&preimage))
}

/// Non pay-in, non pay-out terms of 100 tokens expiring an hour after [`Fixture::NOW`]
pub fn swap_data(kind: SwapType, hash: [u8; 32], nonce: u64) -> SwapData {
    SwapData {
        kind,
        confirmations: 0,
        nonce,
        hash,
        pay_in: false,
        pay_out: false,
        amount: 100,
        expiry: Fixture::NOW + 3_600,
        sequence: 1,
    }
}

pub fn escrow_state(data: SwapData) -> EscrowState {
    let offerer = Pubkey::from_label("offerer");
    let claimer = Pubkey::from_label("claimer");
    EscrowState {
        offerer_ata: data.pay_in.then(|| Pubkey::from_label("offerer-ata")),
        claimer_ata: data.pay_out.then(|| Pubkey::from_label("claimer-ata")),
        data,
        offerer,
        claimer,
        mint: Pubkey::from_label("mint"),
        claimer_bounty: 0,
        security_deposit: 0,
    }
}

/// Legacy-serialized transaction with one input per entry of `sequences`.
/// Output 0 pays `value` to a P2WPKH script, output 1 is change.
pub fn claim_tx(sequences: &[u32], locktime: u32, value: u64) -> Transaction {
    let input = sequences
        .iter()
        .enumerate()
        .map(|(i, sequence)| TxIn {
            previous_output: OutPoint {
                vout: i as u32,
                ..OutPoint::null()
            },
            script_sig: ScriptBuf::new(),
            sequence: Sequence(*sequence),
            witness: Witness::new(),
        })
        .collect();

    let mut payee = vec![0x00, 0x14];
    payee.extend_from_slice(&[0xAA; 20]);
    let mut change = vec![0x00, 0x14];
    change.extend_from_slice(&[0xBB; 20]);

    Transaction {
        version: Version::TWO,
        lock_time: LockTime::from_consensus(locktime),
        input,
        output: vec![
            TxOut {
                value: Amount::from_sat(value),
                script_pubkey: ScriptBuf::from_bytes(payee),
            },
            TxOut {
                value: Amount::from_sat(1_000),
                script_pubkey: ScriptBuf::from_bytes(change),
            },
        ],
    }
}

/// Claim payload `vout || raw tx` and the transaction id it proves
pub fn chain_payload(tx: &Transaction, vout: u32) -> (Vec<u8>, [u8; 32]) {
    let mut payload = vout.to_le_bytes().to_vec();
    payload.extend_from_slice(&consensus::serialize(tx));
    (payload, tx.compute_txid().to_byte_array())
}

/// Program state with funded parties:
/// the offerer holds tokens and an internal balance, the claimer has an
/// empty user account and native funds for deposits and bounties, the
/// watchtower has nothing.
pub struct Fixture {
    pub config: Arc<EngineConfig>,
    pub now: u64,
    pub state: ProgramState<MemoryLedger>,
    pub mint: Pubkey,
    pub offerer: Pubkey,
    pub claimer: Pubkey,
    pub watchtower: Pubkey,
    pub offerer_ata: Pubkey,
    pub claimer_ata: Pubkey,
    /// Offerer-owned account of a different mint
    pub other_mint_account: Pubkey,
}

impl Fixture {
    pub const NOW: u64 = 1_700_000_000;
    pub const TOKEN_BALANCE: u64 = 10_000;
    pub const INTERNAL_BALANCE: u64 = 1_000;
    pub const NATIVE_BALANCE: u64 = 1_000;

    pub fn new() -> Self {
        let config = Arc::new(EngineConfig::default());
        let mint = Pubkey::from_label("mint");
        let offerer = Pubkey::from_label("offerer");
        let claimer = Pubkey::from_label("claimer");
        let watchtower = Pubkey::from_label("watchtower");

        let mut ledger = MemoryLedger::new();
        let offerer_ata = ledger.create_token_account(offerer, mint);
        ledger.mint_to(&offerer_ata, Self::TOKEN_BALANCE).unwrap();
        let claimer_ata = ledger.create_token_account(claimer, mint);
        let other_mint_account = ledger.create_token_account(offerer, Pubkey::from_label("other-mint"));
        ledger.airdrop(offerer, Self::NATIVE_BALANCE).unwrap();
        ledger.airdrop(claimer, Self::NATIVE_BALANCE).unwrap();

        let mut state = ProgramState::new(config.program_id, ledger);
        for (owner, token_account, amount) in [
            (offerer, offerer_ata, Self::INTERNAL_BALANCE),
            (claimer, claimer_ata, 0),
        ] {
            let req = DepositRequest {
                signer: owner,
                mint,
                signer_token_account: token_account,
                user_account: state.store.user_account_address(&owner, &mint),
                amount,
            };
            process_deposit(&mut state, &req).unwrap();
        }

        Self {
            config,
            now: Self::NOW,
            state,
            mint,
            offerer,
            claimer,
            watchtower,
            offerer_ata,
            claimer_ata,
            other_mint_account,
        }
    }

    pub fn ctx(&self) -> ProgramContext {
        ProgramContext {
            config: self.config.clone(),
            now: self.now,
        }
    }

    /// Escrow funded from the offerer's internal balance, paid to the
    /// claimer's internal balance, without deposit or bounty
    pub fn internal_init(&self, kind: SwapType, hash: [u8; 32], amount: u64) -> InitializeRequest {
        let mut data = swap_data(kind, hash, 0);
        data.amount = amount;
        data.expiry = self.now + 3_600;
        if kind.is_chain() {
            data.confirmations = 1;
        }

        InitializeRequest {
            swap_data: data,
            offerer: self.offerer,
            claimer: self.claimer,
            mint: self.mint,
            escrow_address: self.state.store.escrow_address(&hash),
            funding: FundingSource::Internal {
                offerer_user_account: self.state.store.user_account_address(&self.offerer, &self.mint),
                security_deposit: 0,
                claimer_bounty: 0,
            },
            claimer_destination: BalanceAccount::Internal(
                self.state.store.user_account_address(&self.claimer, &self.mint),
            ),
            txo_hash: hash,
            auth_expiry: self.now + 60,
        }
    }

    /// Escrow funded from the offerer's token account
    pub fn pay_in_init(&self, kind: SwapType, hash: [u8; 32], amount: u64) -> InitializeRequest {
        let mut req = self.internal_init(kind, hash, amount);
        req.swap_data.pay_in = true;
        req.funding = FundingSource::PayIn {
            offerer_token_account: self.offerer_ata,
        };
        req
    }

    pub fn offerer_internal(&self) -> u64 {
        self.state
            .store
            .user_account(&self.offerer, &self.mint)
            .map_or(0, |account| account.amount)
    }

    pub fn custody(&self) -> CustodyReport {
        custody_report(&self.state, &self.mint)
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

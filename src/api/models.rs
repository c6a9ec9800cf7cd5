use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use utxo_chain::blockchain::model;
use utxo_chain::{
    Block, Blockchain, CancelToken, ChainConfig, ChainError, Miner, MiningOutcome, SharedLedger,
    TransactionOutput, ValidationPolicy,
};

/// Shared application state: one ledger and the node's miner.
///
/// Block production holds `miner` for its whole duration, which serializes
/// producers; the ledger lock is only taken for settlement and for the
/// final append, so readers are not blocked by a running search.
pub struct AppState {
    pub ledger: SharedLedger,
    pub miner: Mutex<Miner>,
}

impl AppState {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            ledger: Blockchain::new(config).into_shared(),
            miner: Mutex::new(Miner::new()),
        }
    }

    /// Mine `block` with the node's miner (already locked by the caller) and
    /// return `(height, hash, nonce)` of the appended block. A block that is
    /// not appended leaves the UTXO set as it was before its settlement.
    pub fn seal(&self, miner: &mut Miner, block: Block) -> Result<(usize, String, u64), ChainError> {
        let block_id = block.id.to_string();
        match miner.mine_shared(block, &self.ledger, &CancelToken::new())? {
            MiningOutcome::Mined {
                height,
                hash,
                nonce,
            } => Ok((height, hash, nonce)),
            MiningOutcome::Cancelled(block) => {
                model::lock(&self.ledger)?.revert_block(&block);
                Err(ChainError::MiningCancelled(block_id))
            }
        }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: usize,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub difficulty: usize,
}

#[derive(Deserialize)]
pub struct GenesisRequest {
    pub address: String,
    pub amount: f64,
}

#[derive(Serialize)]
pub struct GenesisResponse {
    pub txid: String,
    pub hash: String,
    pub nonce: u64,
    pub lender: String,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct TransferRequest {
    /// Hex secret key of the sender. Used to sign and then dropped.
    pub private_key: String,
    pub receiver: String,
    pub amount: f64,
}

#[derive(Serialize)]
pub struct TransferResponse {
    pub txid: String,
    pub mined_index: usize,
    pub hash: String,
    pub nonce: u64,
    pub sender_balance: f64,
    pub receiver_balance: f64,
}

/* ---------- UTXO / balance Models ---------- */

#[derive(Serialize)]
pub struct UtxoResponse {
    pub size: usize,
    pub utxos: Vec<TransactionOutput>,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f64,
    pub utxos: usize,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub difficulty: usize,
    pub reward_per_block: f64,
    pub validation: ValidationPolicy,
    pub last_interval_ms: Option<i64>,
    pub utxo_size: usize,
    pub miner_reward: Option<f64>,
    pub blocks_mined: Option<u64>,
    pub mining: bool,
}

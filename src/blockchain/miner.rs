use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info};

use super::model::{self, Blockchain, SharedLedger};
use super::Block;
use crate::crypto::HASH_HEX_LEN;
use crate::error::{ChainError, Result};

/// Shared flag used to abandon a running nonce search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Found,
    Cancelled,
}

/// Result of mining against a shared ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum MiningOutcome {
    /// The block was appended at `height`.
    Mined {
        height: usize,
        hash: String,
        nonce: u64,
    },
    /// The search was abandoned; the block is handed back as it was left.
    Cancelled(Block),
}

/// Proof-of-work search: bump the nonce and rehash until the hash carries
/// `difficulty` leading hex zeros or `cancel` is raised. Touches nothing but
/// `block`, so it can run on any thread without holding the ledger.
pub fn search(block: &mut Block, difficulty: usize, cancel: &CancelToken) -> Result<SearchOutcome> {
    if difficulty > HASH_HEX_LEN {
        return Err(ChainError::UnreachableDifficulty(difficulty));
    }

    let started = Instant::now();
    let start_nonce = block.nonce;
    while !block.meets_target(difficulty) {
        if cancel.is_cancelled() {
            debug!(
                "search for block {} cancelled after {} attempts",
                block.id,
                block.nonce - start_nonce
            );
            return Ok(SearchOutcome::Cancelled);
        }
        block.increment_nonce();
        block.generate_hash();
    }

    debug!(
        "search for block {} done: nonce={} attempts={} in {} ms",
        block.id,
        block.nonce,
        block.nonce - start_nonce,
        started.elapsed().as_millis()
    );
    Ok(SearchOutcome::Found)
}

/// Finds proofs of work and commits blocks. The reward is an in-memory
/// counter; it is never minted into the UTXO set.
#[derive(Debug, Default, Clone)]
pub struct Miner {
    reward: f64,
    blocks_mined: u64,
}

impl Miner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated reward over every block this miner committed.
    pub fn reward(&self) -> f64 {
        self.reward
    }

    pub fn blocks_mined(&self) -> u64 {
        self.blocks_mined
    }

    /// Search to completion, then append to `ledger` and accrue the reward.
    /// A block that cannot be appended has its settlements reverted.
    pub fn mine<'a>(&mut self, mut block: Block, ledger: &'a mut Blockchain) -> Result<&'a Block> {
        let difficulty = ledger.config().difficulty;
        let reward = ledger.config().reward;

        let searched = search(&mut block, difficulty, &CancelToken::new())
            .and_then(|_| ledger.check_block(&block));
        if let Err(e) = searched {
            ledger.revert_block(&block);
            return Err(e);
        }
        let accepted = ledger.add_block(block)?;

        self.credit(reward);
        info!("{accepted} has just been mined");
        Ok(accepted)
    }

    /// Like `mine`, but the search runs without holding the ledger lock and
    /// can be abandoned through `cancel`. If another block was appended in
    /// the meantime the append fails with `BrokenLink`. On error the block's
    /// settlements are reverted; a cancelled block keeps them so the search
    /// can be resumed, and the caller reverts it if it gives up.
    pub fn mine_shared(
        &mut self,
        mut block: Block,
        ledger: &SharedLedger,
        cancel: &CancelToken,
    ) -> Result<MiningOutcome> {
        let (difficulty, reward) = {
            let bc = model::lock(ledger)?;
            (bc.config().difficulty, bc.config().reward)
        };

        match search(&mut block, difficulty, cancel) {
            Ok(SearchOutcome::Found) => {}
            Ok(SearchOutcome::Cancelled) => return Ok(MiningOutcome::Cancelled(block)),
            Err(e) => {
                model::lock(ledger)?.revert_block(&block);
                return Err(e);
            }
        }

        let mut bc = model::lock(ledger)?;
        if let Err(e) = bc.check_block(&block) {
            bc.revert_block(&block);
            return Err(e);
        }
        let (hash, nonce) = {
            let accepted = bc.add_block(block)?;
            (accepted.hash.clone(), accepted.nonce)
        };
        let height = bc.len() - 1;
        drop(bc);

        self.credit(reward);
        info!("block #{height} mined (hash={hash}, nonce={nonce})");
        Ok(MiningOutcome::Mined {
            height,
            hash,
            nonce,
        })
    }

    fn credit(&mut self, reward: f64) {
        self.reward += reward;
        self.blocks_mined += 1;
    }
}

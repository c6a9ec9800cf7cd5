use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};

use super::Block;
use crate::config::ChainConfig;
use crate::error::{ChainError, Result};
use crate::transaction::{Transaction, TransactionOutput, UtxoSet};
use crate::wallet::Wallet;

/// Ledger handle shared between threads. Every mutation goes through the
/// mutex, so there is a single writer at a time.
pub type SharedLedger = Arc<Mutex<Blockchain>>;

/// Lock a shared ledger, mapping poisoning to an error.
pub fn lock(ledger: &SharedLedger) -> Result<MutexGuard<'_, Blockchain>> {
    ledger.lock().map_err(|_| ChainError::LockPoisoned)
}

/// In-memory chain of accepted blocks plus the authoritative UTXO set.
#[derive(Debug)]
pub struct Blockchain {
    blocks: Vec<Block>,
    utxos: UtxoSet,
    config: ChainConfig,
}

impl Blockchain {
    /// An empty ledger. The genesis block is mined and appended like any other.
    pub fn new(config: ChainConfig) -> Self {
        Self {
            blocks: Vec::new(),
            utxos: UtxoSet::new(),
            config,
        }
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Hash a new block must link to: the tail's hash, or the genesis
    /// sentinel on an empty chain.
    pub fn tail_hash(&self) -> &str {
        self.blocks
            .last()
            .map(|b| b.hash.as_str())
            .unwrap_or(self.config.genesis_prev_hash.as_str())
    }

    /// Fresh candidate block on top of the current tail.
    pub fn next_block(&self) -> Block {
        Block::new(self.tail_hash())
    }

    /// Whether `block` could be appended right now: a valid proof of work
    /// for the configured difficulty and a link to the current tail.
    pub fn check_block(&self, block: &Block) -> Result<()> {
        if !block.is_valid(self.config.difficulty) {
            return Err(ChainError::InvalidProofOfWork(block.id.to_string()));
        }
        let expected = self.tail_hash();
        if block.prev_hash != expected {
            return Err(ChainError::BrokenLink {
                expected: expected.to_string(),
                found: block.prev_hash.clone(),
            });
        }
        Ok(())
    }

    /// Append a mined block that passes `check_block`.
    pub fn add_block(&mut self, block: Block) -> Result<&Block> {
        self.check_block(&block)?;

        info!(
            "block #{} appended (hash={}, nonce={}, txs={})",
            self.blocks.len(),
            block.hash,
            block.nonce,
            block.transactions.len()
        );
        self.blocks.push(block);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Read-only view of the unspent set.
    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    pub(crate) fn utxos_mut(&mut self) -> &mut UtxoSet {
        &mut self.utxos
    }

    /// Owned copy of the unspent set keyed by output id.
    pub fn utxo_snapshot(&self) -> HashMap<String, TransactionOutput> {
        self.utxos.snapshot()
    }

    pub fn add_utxo(&mut self, output: TransactionOutput) {
        debug!("utxo + {} ({:.6} -> {})", output.id, output.amount, output.receiver);
        self.utxos.insert(output);
    }

    pub fn remove_utxo(&mut self, id: &str) -> Option<TransactionOutput> {
        debug!("utxo - {id}");
        self.utxos.spend(id)
    }

    pub fn balance_of(&self, address: &str) -> f64 {
        self.utxos.balance_of(address)
    }

    /// Undo the UTXO changes settled into a candidate block that will not be
    /// appended: its outputs leave the set and the outputs its inputs consumed
    /// come back. Transactions are unwound last to first.
    pub fn revert_block(&mut self, block: &Block) {
        for tx in block.transactions.iter().rev() {
            for out in &tx.outputs {
                self.utxos.spend(&out.id);
            }
            for utxo in tx.inputs.iter().filter_map(|i| i.utxo.as_ref()) {
                self.utxos.insert(utxo.clone());
            }
        }
        debug!(
            "block {} reverted ({} txs unwound)",
            block.id,
            block.transactions.len()
        );
    }

    /// Drop every block and unspent output.
    pub fn reset(&mut self) {
        info!("ledger reset ({} blocks, {} utxos dropped)", self.blocks.len(), self.utxos.len());
        self.blocks.clear();
        self.utxos.clear();
    }

    /// Bootstrap an empty ledger: `lender` grants `amount` to `receiver` in a
    /// signed genesis transaction whose output is seeded straight into the
    /// UTXO set. The returned genesis block still has to be mined.
    pub fn genesis_block(&mut self, lender: &Wallet, receiver: &str, amount: f64) -> Result<Block> {
        if !self.blocks.is_empty() {
            return Err(ChainError::GenesisExists);
        }
        self.config.check()?;

        let mut tx = Transaction::new(lender.address(), receiver, amount);
        let output = TransactionOutput::new("0", receiver, amount);
        tx.add_output(output.clone());
        tx.sign(lender.keys());
        self.add_utxo(output);

        let mut block = Block::new(self.config.genesis_prev_hash.clone());
        block.add_transaction(tx, self)?;
        Ok(block)
    }

    /// Validate the entire chain: linkage, hashes and PoW.
    pub fn is_valid_chain(&self) -> bool {
        let mut prev = self.config.genesis_prev_hash.as_str();
        for block in &self.blocks {
            if block.prev_hash != prev || !block.is_valid(self.config.difficulty) {
                return false;
            }
            prev = block.hash.as_str();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Miner;

    fn config() -> ChainConfig {
        ChainConfig::default().with_difficulty(2)
    }

    fn mined(mut block: Block, difficulty: usize) -> Block {
        while !block.meets_target(difficulty) {
            block.increment_nonce();
            block.generate_hash();
        }
        block
    }

    #[test]
    fn empty_ledger_links_to_sentinel() {
        let bc = Blockchain::new(config());
        assert!(bc.is_empty());
        assert!(bc.last_block().is_none());
        assert_eq!(bc.tail_hash(), bc.config().genesis_prev_hash);
        assert_eq!(bc.next_block().prev_hash, bc.config().genesis_prev_hash);
        assert!(bc.is_valid_chain());
    }

    #[test]
    fn add_block_rejects_unmined_and_unlinked() {
        let mut bc = Blockchain::new(config());

        let unmined = bc.next_block();
        assert!(matches!(
            bc.add_block(unmined),
            Err(ChainError::InvalidProofOfWork(_))
        ));

        let orphan = mined(Block::new("elsewhere"), 2);
        assert!(matches!(
            bc.add_block(orphan),
            Err(ChainError::BrokenLink { .. })
        ));

        let genesis = mined(bc.next_block(), 2);
        let hash = bc.add_block(genesis).unwrap().hash.clone();
        assert_eq!(bc.tail_hash(), hash);

        let stale = mined(Block::new(bc.config().genesis_prev_hash.clone()), 2);
        let genesis_prev_hash = bc.config().genesis_prev_hash.clone();
        assert_eq!(
            bc.add_block(stale),
            Err(ChainError::BrokenLink {
                expected: hash.clone(),
                found: genesis_prev_hash,
            })
        );
        assert_eq!(bc.len(), 1);
        assert!(bc.is_valid_chain());
    }

    #[test]
    fn tampering_breaks_chain_validity() {
        let mut bc = Blockchain::new(config());
        let genesis = mined(bc.next_block(), 2);
        bc.add_block(genesis).unwrap();
        let next = mined(bc.next_block(), 2);
        bc.add_block(next).unwrap();
        assert!(bc.is_valid_chain());

        bc.blocks[1].transactions.push(Transaction::new("x", "y", 1.0));
        assert!(!bc.is_valid_chain());
    }

    #[test]
    fn utxo_helpers_and_reset() {
        let mut bc = Blockchain::new(config());
        let out = TransactionOutput::new("0", "alice", 3.0);
        bc.add_utxo(out.clone());
        assert_eq!(bc.balance_of("alice"), 3.0);
        assert_eq!(bc.utxo_snapshot().get(&out.id), Some(&out));
        assert_eq!(bc.remove_utxo(&out.id), Some(out));
        assert!(bc.utxos().is_empty());

        let lender = Wallet::new();
        let alice = Wallet::new();
        let genesis = bc.genesis_block(&lender, alice.address(), 10.0).unwrap();
        Miner::new().mine(genesis, &mut bc).unwrap();
        assert_eq!(bc.len(), 1);
        assert_eq!(bc.utxos().len(), 1);

        bc.reset();
        assert!(bc.is_empty());
        assert!(bc.utxos().is_empty());
    }

    #[test]
    fn revert_block_unwinds_an_abandoned_genesis() {
        let mut bc = Blockchain::new(config());
        let lender = Wallet::new();
        let alice = Wallet::new();

        let genesis = bc.genesis_block(&lender, alice.address(), 10.0).unwrap();
        assert_eq!(bc.utxos().len(), 1);
        assert!(bc.check_block(&genesis).is_err());

        bc.revert_block(&genesis);
        assert!(bc.utxos().is_empty());
        assert!(bc.is_empty());

        let again = bc.genesis_block(&lender, alice.address(), 10.0).unwrap();
        Miner::new().mine(again, &mut bc).unwrap();
        assert_eq!(bc.balance_of(alice.address()), 10.0);
    }

    #[test]
    fn genesis_block_seeds_utxo_once() {
        let mut bc = Blockchain::new(config());
        let lender = Wallet::new();
        let alice = Wallet::new();

        let genesis = bc.genesis_block(&lender, alice.address(), 1500.0).unwrap();
        assert!(genesis.is_genesis(&bc.config().genesis_prev_hash));
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.transactions[0].verify_signature());
        assert_eq!(bc.balance_of(alice.address()), 1500.0);

        Miner::new().mine(genesis, &mut bc).unwrap();
        assert_eq!(
            bc.genesis_block(&lender, alice.address(), 1.0),
            Err(ChainError::GenesisExists)
        );
    }
}

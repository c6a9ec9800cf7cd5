use std::fmt;

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::merkle::MerkleTree;
use super::model::Blockchain;
use crate::crypto;
use crate::error::TransactionError;
use crate::transaction::{Transaction, validation};

/// A single block in the blockchain holding a list of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    pub timestamp: i64, // Unix timestamp in milliseconds (UTC)
    pub prev_hash: String,
    pub transactions: Vec<Transaction>,
    pub nonce: u64,   // Proof-of-Work nonce
    pub hash: String, // Empty until mined
}

impl Block {
    /// Create an empty, unmined block on top of `prev_hash`.
    pub fn new(prev_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now().timestamp_millis(),
            prev_hash: prev_hash.into(),
            transactions: Vec::new(),
            nonce: 0,
            hash: String::new(),
        }
    }

    pub fn is_genesis(&self, genesis_prev_hash: &str) -> bool {
        self.prev_hash == genesis_prev_hash
    }

    pub fn merkle_root(&self) -> String {
        MerkleTree::new(&self.transactions).root().to_string()
    }

    /// SHA-256 over id, previous hash, timestamp, nonce, the transactions'
    /// string form and the Merkle root. The cached `hash` is not part of it.
    pub fn compute_hash(&self) -> String {
        let preimage = format!(
            "{}{}{}{}{}{}",
            self.id,
            self.prev_hash,
            self.timestamp,
            self.nonce,
            self.transactions_string(),
            self.merkle_root()
        );
        crypto::sha256_hex(&preimage)
    }

    /// Refresh the cached hash from the current contents.
    pub fn generate_hash(&mut self) {
        self.hash = self.compute_hash();
    }

    pub fn increment_nonce(&mut self) {
        self.nonce += 1;
    }

    /// Whether the cached hash starts with `difficulty` hex zeros. An unmined
    /// block never does.
    pub fn meets_target(&self, difficulty: usize) -> bool {
        !self.hash.is_empty()
            && self.hash.len() >= difficulty
            && self.hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// Validate that the block's cached `hash` matches its content and
    /// satisfies the PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self, difficulty: usize) -> bool {
        self.hash == self.compute_hash() && self.meets_target(difficulty)
    }

    /// Attach a transaction. Outside the genesis block the transaction is
    /// validated and settled against the ledger's UTXO set first; a rejected
    /// transaction is not appended and leaves the ledger untouched.
    pub fn add_transaction(
        &mut self,
        mut tx: Transaction,
        ledger: &mut Blockchain,
    ) -> Result<(), TransactionError> {
        if !self.is_genesis(&ledger.config().genesis_prev_hash) {
            let policy = ledger.config().validation;
            validation::validate(&mut tx, ledger.utxos_mut(), policy)?;
        }

        info!(
            "block {}: accepted transaction {} ({} -> {}, {:.6})",
            self.id, tx.transaction_id, tx.sender, tx.receiver, tx.amount
        );
        self.transactions.push(tx);
        Ok(())
    }

    fn transactions_string(&self) -> String {
        let parts: Vec<String> = self.transactions.iter().map(|t| t.to_string()).collect();
        format!("[{}]", parts.join(" "))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = if self.hash.is_empty() {
            "<none>"
        } else {
            self.hash.as_str()
        };
        write!(
            f,
            "Block(id = {}, prevHash = {}, hash = {}, timestamp = {}, nonce = {}, transactions = {}, merkleRoot = {})",
            self.id,
            self.prev_hash,
            hash,
            self.timestamp,
            self.nonce,
            self.transactions.len(),
            self.merkle_root()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Block;
    use crate::blockchain::{Blockchain, GENESIS_PREV_HASH};
    use crate::config::ChainConfig;
    use crate::crypto::KeyPair;
    use crate::error::TransactionError;
    use crate::transaction::{Transaction, TransactionInput, TransactionOutput};

    #[test]
    fn new_block_is_unmined() {
        let b = Block::new("prev");
        assert_eq!(b.id.get_version_num(), 4);
        assert!(b.timestamp > 0);
        assert_eq!(b.nonce, 0);
        assert!(b.hash.is_empty());
        assert_eq!(b.merkle_root(), "");
        assert!(!b.meets_target(0));
        assert!(b.to_string().contains("hash = <none>"));
    }

    #[test]
    fn hash_tracks_nonce_and_content() {
        let mut b = Block::new("prev");
        b.generate_hash();
        let first = b.hash.clone();
        assert_eq!(first, b.compute_hash());
        assert_eq!(first.len(), 64);

        b.increment_nonce();
        assert_eq!(b.nonce, 1);
        assert_ne!(b.compute_hash(), first);
        // cached hash is stale until regenerated
        assert!(!b.is_valid(0));
        b.generate_hash();
        assert!(b.is_valid(0));

        let before = b.hash.clone();
        b.transactions.push(Transaction::new("x", "y", 1.0));
        assert_ne!(before, b.compute_hash());
    }

    #[test]
    fn target_is_leading_hex_zeros() {
        let mut b = Block::new("prev");
        b.hash = "000af".into();
        assert!(b.meets_target(3));
        assert!(!b.meets_target(4));
        assert!(!b.meets_target(6));
    }

    #[test]
    fn genesis_block_skips_validation() {
        let mut ledger = Blockchain::new(ChainConfig::default().with_difficulty(1));
        let mut genesis = Block::new(GENESIS_PREV_HASH);
        // unsigned and unfunded, still accepted
        let tx = Transaction::new("lender", "alice", 10.0);
        genesis.add_transaction(tx, &mut ledger).unwrap();
        assert_eq!(genesis.transactions.len(), 1);
        assert!(ledger.utxos().is_empty());
    }

    #[test]
    fn non_genesis_block_validates_and_settles() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let mut ledger = Blockchain::new(ChainConfig::default().with_difficulty(1));
        let funding = TransactionOutput::new("0", &alice.public_key_hex(), 10.0);
        ledger.add_utxo(funding.clone());

        let mut block = Block::new("not-genesis");

        let unsigned = Transaction::new(&alice.public_key_hex(), &bob.public_key_hex(), 4.0);
        assert_eq!(
            block.add_transaction(unsigned, &mut ledger),
            Err(TransactionError::InvalidSignature)
        );
        assert!(block.transactions.is_empty());
        assert_eq!(ledger.utxos().len(), 1);

        let mut tx = Transaction::new(&alice.public_key_hex(), &bob.public_key_hex(), 4.0);
        tx.add_input(TransactionInput::new(funding.id.clone()));
        tx.sign(&alice);
        assert!(block.add_transaction(tx, &mut ledger).is_ok());
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions[0].outputs.len(), 2);
        assert_eq!(ledger.balance_of(&bob.public_key_hex()), 4.0);
        assert_eq!(ledger.balance_of(&alice.public_key_hex()), 6.0);
    }
}

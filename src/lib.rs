//! In-memory UTXO ledger with proof-of-work mining.
//!
//! Transactions are attached to a candidate [`Block`], which validates and
//! settles them against the [`Blockchain`]'s unspent set; a [`Miner`] then
//! searches for a nonce and appends the block.

pub mod blockchain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod transaction;
pub mod wallet;

pub use blockchain::{Block, Blockchain, CancelToken, MerkleTree, Miner, MiningOutcome, SharedLedger};
pub use config::ChainConfig;
pub use error::{ChainError, CryptoError, Result, TransactionError};
pub use transaction::{Transaction, TransactionInput, TransactionOutput, UtxoSet, ValidationPolicy};
pub use wallet::Wallet;

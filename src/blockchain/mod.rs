pub mod block;
pub mod merkle;
pub mod miner;
pub mod model;

pub use block::Block;
pub use merkle::MerkleTree;
pub use miner::{CancelToken, Miner, MiningOutcome, SearchOutcome, search};
pub use model::{Blockchain, SharedLedger};

/// `prev_hash` of the genesis block.
pub const GENESIS_PREV_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Amount credited to a miner's reward counter per accepted block.
pub const MINING_REWARD: f64 = 6.25;

/// Default Proof-of-Work difficulty (number of leading hex zeros).
pub const DEFAULT_DIFFICULTY: usize = 5;

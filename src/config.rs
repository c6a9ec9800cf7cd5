use std::env;

use std::fmt::Display;
use std::str::FromStr;

use log::warn;

use crate::blockchain::{DEFAULT_DIFFICULTY, GENESIS_PREV_HASH, MINING_REWARD};
use crate::crypto::HASH_HEX_LEN;
use crate::error::{ChainError, Result};
use crate::transaction::ValidationPolicy;

/// Ledger-wide constants. Fixed for the lifetime of a `Blockchain`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// `prev_hash` carried by the genesis block.
    pub genesis_prev_hash: String,
    /// Amount credited to a miner's counter per accepted block.
    pub reward: f64,
    /// Number of leading `'0'` hex characters a block hash must carry.
    pub difficulty: usize,
    pub validation: ValidationPolicy,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_prev_hash: GENESIS_PREV_HASH.to_string(),
            reward: MINING_REWARD,
            difficulty: DEFAULT_DIFFICULTY,
            validation: ValidationPolicy::Strict,
        }
    }
}

impl ChainConfig {
    /// Defaults overridden by `DIFFICULTY`, `MINING_REWARD` and
    /// `VALIDATION_POLICY` (`strict` | `permissive`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`. Values that do
    /// not parse, a difficulty beyond the hash length and a reward that is
    /// negative or not finite are logged and replaced by the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let difficulty = parsed(&lookup, "DIFFICULTY", defaults.difficulty, |d| {
            *d <= HASH_HEX_LEN
        });
        let reward = parsed(&lookup, "MINING_REWARD", defaults.reward, |r| {
            r.is_finite() && *r >= 0.0
        });
        let validation = parsed(&lookup, "VALIDATION_POLICY", defaults.validation, |_| true);

        Self {
            difficulty,
            reward,
            validation,
            ..defaults
        }
    }

    /// Reject settings no ledger can run with.
    pub fn check(&self) -> Result<()> {
        if self.difficulty > HASH_HEX_LEN {
            return Err(ChainError::UnreachableDifficulty(self.difficulty));
        }
        if !self.reward.is_finite() || self.reward < 0.0 {
            return Err(ChainError::InvalidReward(self.reward));
        }
        Ok(())
    }

    pub fn with_difficulty(mut self, difficulty: usize) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_validation(mut self, validation: ValidationPolicy) -> Self {
        self.validation = validation;
        self
    }
}

fn parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    accept: impl Fn(&T) -> bool,
) -> T
where
    T: FromStr + Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if accept(&value) => value,
        Ok(value) => {
            warn!("{key}={value} is out of range, using {default}");
            default
        }
        Err(_) => {
            warn!("{key}={raw:?} does not parse, using {default}");
            default
        }
    }
}

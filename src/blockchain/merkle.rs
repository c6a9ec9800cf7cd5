use crate::crypto;
use crate::transaction::Transaction;

/// Root commitment over an ordered list of transaction ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    leaves: Vec<String>,
    root: String,
}

impl MerkleTree {
    pub fn new(transactions: &[Transaction]) -> Self {
        Self::from_ids(
            transactions
                .iter()
                .map(|t| t.transaction_id.clone())
                .collect(),
        )
    }

    /// Build from raw leaf ids. Adjacent pairs are hashed together level by
    /// level; an odd level pairs its last leaf with itself. No leaves yields
    /// an empty root and a single leaf is its own root.
    pub fn from_ids(leaves: Vec<String>) -> Self {
        let root = compute_root(&leaves);
        Self { leaves, root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }
}

fn compute_root(leaves: &[String]) -> String {
    let mut level = match leaves {
        [] => return String::new(),
        [only] => return only.clone(),
        _ => leaves.to_vec(),
    };

    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => merge(left, right),
                [last] => merge(last, last),
                _ => unreachable!("chunks(2) yields one or two items"),
            })
            .collect();
    }

    level.swap_remove(0)
}

fn merge(left: &str, right: &str) -> String {
    crypto::sha256_hex(&format!("{left}{right}"))
}

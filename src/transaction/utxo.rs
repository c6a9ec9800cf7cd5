use std::collections::HashMap;

use super::model::{Transaction, TransactionOutput};

/// The authoritative unspent set, keyed by output id.
#[derive(Debug, Default, Clone)]
pub struct UtxoSet {
    map: HashMap<String, TransactionOutput>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Insert an output under its own id, replacing any previous entry.
    pub fn insert(&mut self, output: TransactionOutput) {
        self.map.insert(output.id.clone(), output);
    }

    /// Spend (remove) a single output. Returns the removed output if it existed.
    pub fn spend(&mut self, id: &str) -> Option<TransactionOutput> {
        self.map.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&TransactionOutput> {
        self.map.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.map.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Read-only iterator over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TransactionOutput)> {
        self.map.iter()
    }

    /// Outputs owned by `address`.
    pub fn owned_by<'a>(&'a self, address: &'a str) -> impl Iterator<Item = &'a TransactionOutput> {
        self.map.values().filter(move |o| o.is_mine(address))
    }

    pub fn balance_of(&self, address: &str) -> f64 {
        self.owned_by(address).map(|o| o.amount).sum()
    }

    /// Owned copy of the current map.
    pub fn snapshot(&self) -> HashMap<String, TransactionOutput> {
        self.map.clone()
    }

    /// Insert every output a transaction carries.
    pub fn add_tx_outputs(&mut self, tx: &Transaction) {
        for out in &tx.outputs {
            self.insert(out.clone());
        }
    }
}

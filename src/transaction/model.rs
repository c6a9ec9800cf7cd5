use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{self, KeyPair};

/// A value allocation to `receiver`, spendable until a later transaction
/// consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutput {
    /// Content hash of (receiver, amount, parent transaction id).
    pub id: String,
    pub parent_transaction_id: String,
    /// Hex compressed public key of the owner.
    pub receiver: String,
    pub amount: f64,
}

impl TransactionOutput {
    pub fn new(parent_transaction_id: &str, receiver: &str, amount: f64) -> Self {
        let id = crypto::sha256_hex(&format!("{receiver}{amount:.6}{parent_transaction_id}"));
        Self {
            id,
            parent_transaction_id: parent_transaction_id.to_string(),
            receiver: receiver.to_string(),
            amount,
        }
    }

    pub fn is_mine(&self, address: &str) -> bool {
        self.receiver == address
    }
}

/// Reference to a previously created output. `utxo` is filled in when the
/// owning transaction is settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub transaction_output_id: String,
    pub utxo: Option<TransactionOutput>,
}

impl TransactionInput {
    pub fn new(transaction_output_id: impl Into<String>) -> Self {
        Self {
            transaction_output_id: transaction_output_id.into(),
            utxo: None,
        }
    }
}

impl From<&TransactionOutput> for TransactionInput {
    fn from(output: &TransactionOutput) -> Self {
        Self {
            transaction_output_id: output.id.clone(),
            utxo: Some(output.clone()),
        }
    }
}

/// A signed intent to move `amount` from `sender` to `receiver`.
///
/// Outputs are derived during settlement (receiver's share plus the sender's
/// change); callers only supply inputs and a signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    /// Hex DER ECDSA signature over `signing_message()`. Empty until signed.
    pub signature: String,
}

impl Transaction {
    pub fn new(sender: &str, receiver: &str, amount: f64) -> Self {
        let transaction_id = crypto::sha256_hex(&signing_message(sender, receiver, amount));
        Self {
            transaction_id,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            inputs: Vec::new(),
            outputs: Vec::new(),
            signature: String::new(),
        }
    }

    pub fn add_input(&mut self, input: TransactionInput) {
        self.inputs.push(input);
    }

    pub fn add_output(&mut self, output: TransactionOutput) {
        self.outputs.push(output);
    }

    /// Canonical message covered by the signature: sender, receiver, amount.
    pub fn signing_message(&self) -> String {
        signing_message(&self.sender, &self.receiver, self.amount)
    }

    pub fn sign(&mut self, keys: &KeyPair) {
        self.signature = crypto::sign(&keys.secret_key, &self.signing_message());
    }

    /// Signature check against `sender`. Malformed keys or signatures count
    /// as a failed verification.
    pub fn verify_signature(&self) -> bool {
        crypto::verify(&self.sender, &self.signing_message(), &self.signature).unwrap_or(false)
    }

    /// Sum of the amounts of inputs whose output has been resolved.
    pub fn inputs_sum(&self) -> f64 {
        self.inputs
            .iter()
            .filter_map(|i| i.utxo.as_ref())
            .map(|o| o.amount)
            .sum()
    }

    pub fn outputs_sum(&self) -> f64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }
}

fn signing_message(sender: &str, receiver: &str, amount: f64) -> String {
    format!("{sender}{receiver}{amount:.6}")
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transaction(id = {}, sender = {}, receiver = {}, amount = {:.6}, inputs = {}, outputs = {})",
            self.transaction_id,
            self.sender,
            self.receiver,
            self.amount,
            self.inputs.len(),
            self.outputs.len()
        )
    }
}

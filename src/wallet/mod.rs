use crate::blockchain::Blockchain;
use crate::crypto::KeyPair;
use crate::error::CryptoError;
use crate::transaction::{Transaction, TransactionInput};

/// A key pair plus the address derived from it. Balances are read from the
/// ledger's UTXO set; nothing is cached here.
#[derive(Debug, Clone)]
pub struct Wallet {
    keys: KeyPair,
    address: String,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    /// Generate a new secp256k1 keypair. The address is the hex of the
    /// compressed public key.
    pub fn new() -> Self {
        Self::from_keys(KeyPair::generate())
    }

    pub fn from_keys(keys: KeyPair) -> Self {
        let address = keys.public_key_hex();
        Self { keys, address }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, CryptoError> {
        KeyPair::from_secret_hex(secret_hex).map(Self::from_keys)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub fn balance(&self, ledger: &Blockchain) -> f64 {
        ledger.balance_of(&self.address)
    }

    /// Build a signed transfer spending every output this wallet owns. The
    /// receiver's share and the change are produced when the transaction is
    /// attached to a block.
    pub fn transfer(&self, receiver: &str, amount: f64, ledger: &Blockchain) -> Transaction {
        let mut tx = Transaction::new(&self.address, receiver, amount);
        let mut owned: Vec<_> = ledger.utxos().owned_by(&self.address).collect();
        // stable input order regardless of map iteration
        owned.sort_by(|a, b| a.id.cmp(&b.id));
        for output in owned {
            tx.add_input(TransactionInput::from(output));
        }
        tx.sign(&self.keys);
        tx
    }
}

pub mod model;
pub mod utxo;
pub mod validation;

pub use model::{Transaction, TransactionInput, TransactionOutput};
pub use utxo::UtxoSet;
pub use validation::{Settlement, ValidationPolicy};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChainError>;

/// Failures of the key/signature primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid secret key")]
    InvalidSecretKey,

    #[error("invalid DER signature")]
    InvalidSignature,
}

/// Reasons a transaction is refused when it is attached to a block.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransactionError {
    #[error("signature does not verify against sender")]
    InvalidSignature,

    #[error("amount must be a finite, non-negative number (got {0})")]
    NegativeAmount(f64),

    #[error("transaction {0} has already been settled")]
    AlreadySettled(String),

    #[error("input {0} is referenced more than once")]
    DuplicateInput(String),

    #[error("input {0} does not resolve to an unspent output")]
    UnresolvedInput(String),

    #[error("input {0} is not owned by the sender")]
    ForeignInput(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("output {0} collides with an unspent output")]
    OutputCollision(String),

    #[error("settlement for {found} cannot be applied to transaction {expected}")]
    SettlementMismatch { expected: String, found: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("transaction rejected: {0}")]
    Transaction(#[from] TransactionError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("block links to {found}, expected {expected}")]
    BrokenLink { expected: String, found: String },

    #[error("block {0} does not carry a valid proof of work")]
    InvalidProofOfWork(String),

    #[error("difficulty {0} exceeds the {max} hex digits of a block hash", max = crate::crypto::HASH_HEX_LEN)]
    UnreachableDifficulty(usize),

    #[error("mining reward must be finite and non-negative (got {0})")]
    InvalidReward(f64),

    #[error("ledger already has a genesis block")]
    GenesisExists,

    #[error("ledger has no genesis block")]
    MissingGenesis,

    #[error("mining of block {0} was cancelled")]
    MiningCancelled(String),

    #[error("ledger lock poisoned")]
    LockPoisoned,
}

use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Length of a SHA-256 digest rendered as lowercase hex.
pub const HASH_HEX_LEN: usize = 64;

/// SHA-256 of `data`, hex encoded.
pub fn sha256_hex(data: &str) -> String {
    hex::encode(sha256(data))
}

fn sha256(data: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hasher.finalize().into()
}

/// A secp256k1 key pair. The public half, hex encoded and compressed, is the
/// account identity used as sender/receiver throughout the ledger.
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, CryptoError> {
        let bytes =
            hex::decode(secret_hex.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
        let secp = Secp256k1::signing_only();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Hex of the compressed (33 byte) public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}

/// Sign the SHA-256 digest of `message`. Returns the hex DER signature.
pub fn sign(secret_key: &SecretKey, message: &str) -> String {
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest(sha256(message));
    let sig = secp.sign_ecdsa(&msg, secret_key);
    hex::encode(sig.serialize_der().to_vec())
}

/// Verify a hex DER signature over the SHA-256 digest of `message` against a
/// hex encoded public key. Malformed inputs are reported as errors, a well
/// formed signature that does not match yields `Ok(false)`.
pub fn verify(pubkey_hex: &str, message: &str, sig_hex: &str) -> Result<bool, CryptoError> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| CryptoError::InvalidSignature)?;

    let pk = parse_public_key(pubkey_hex)?;

    let msg = Message::from_digest(sha256(message));
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

/// Normalize a hex public key (compressed or uncompressed) to the lowercase
/// compressed form used as an address.
pub fn normalize_address(pubkey_hex: &str) -> Result<String, CryptoError> {
    let pk = parse_public_key(pubkey_hex)?;
    Ok(hex::encode(pk.serialize()))
}

fn parse_public_key(pubkey_hex: &str) -> Result<PublicKey, CryptoError> {
    let bytes =
        hex::decode(pubkey_hex.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
    PublicKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

//! ECDSA key management for the ledger
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve.
//!
//! Public keys and signatures travel inside scripts as two length-prefixed
//! 32-byte big-endian scalars: `X ‖ Y` for a key, `r ‖ s` for a signature.
//! Each scalar is framed like any persisted byte string (`u32` little-endian
//! length, then the bytes).

use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::Digest;
use thiserror::Error;

use super::hash::{double_sha256, sha256};
use crate::storage::codec::get_bytes;

/// Version byte prepended to the key hash before base58 encoding
pub const ADDRESS_VERSION: u8 = 0x10;

/// Size of one curve scalar or coordinate
const SCALAR_SIZE: usize = 32;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from an existing secret key
    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Public key in script wire format
    pub fn public_key_bytes(&self) -> Vec<u8> {
        public_key_to_bytes(&self.public_key)
    }

    /// Address derived from the public key
    pub fn address(&self) -> String {
        public_key_to_address(&self.public_key)
    }

    /// Sign an arbitrary message; returns the signature in script wire format
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, KeyError> {
        sign_message(&self.secret_key, message)
    }

    /// Verify a wire-format signature against this key pair's public key
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool, KeyError> {
        verify_signature(&self.public_key, message, signature)
    }
}

fn put_scalar(out: &mut Vec<u8>, scalar: &[u8]) {
    out.extend_from_slice(&(scalar.len() as u32).to_le_bytes());
    out.extend_from_slice(scalar);
}

/// Reads two framed scalars and left-pads each to 32 bytes
fn read_scalar_pair(bytes: &[u8]) -> Option<[u8; 2 * SCALAR_SIZE]> {
    let mut reader = bytes;
    let first = get_bytes(&mut reader).ok()?;
    let second = get_bytes(&mut reader).ok()?;
    if !reader.is_empty() || first.len() > SCALAR_SIZE || second.len() > SCALAR_SIZE {
        return None;
    }

    let mut out = [0u8; 2 * SCALAR_SIZE];
    out[SCALAR_SIZE - first.len()..SCALAR_SIZE].copy_from_slice(&first);
    out[2 * SCALAR_SIZE - second.len()..].copy_from_slice(&second);
    Some(out)
}

/// Encode a public key as `bytes(X) ‖ bytes(Y)`
pub fn public_key_to_bytes(public_key: &PublicKey) -> Vec<u8> {
    let raw = public_key.serialize_uncompressed();
    let mut out = Vec::with_capacity(2 * (4 + SCALAR_SIZE));
    put_scalar(&mut out, &raw[1..1 + SCALAR_SIZE]);
    put_scalar(&mut out, &raw[1 + SCALAR_SIZE..]);
    out
}

/// Decode a public key from its script wire format
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey, KeyError> {
    let coordinates = read_scalar_pair(bytes).ok_or(KeyError::InvalidPublicKey)?;
    let mut raw = [0u8; 1 + 2 * SCALAR_SIZE];
    raw[0] = 0x04;
    raw[1..].copy_from_slice(&coordinates);
    PublicKey::from_slice(&raw).map_err(|_| KeyError::InvalidPublicKey)
}

/// Parse a public key from hex string (wire format)
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
    public_key_from_bytes(&bytes)
}

/// Convert a public key to a ledger address
///
/// `base58(version ‖ RIPEMD160(SHA256(0x04 ‖ X ‖ Y)) ‖ checksum)`, where the
/// checksum is the first four bytes of the double SHA-256 of the prefix.
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    let sha256_hash = sha256(&public_key.serialize_uncompressed());

    let mut ripemd = Ripemd160::new();
    ripemd.update(&sha256_hash);
    let ripemd_hash = ripemd.finalize();

    let mut address_bytes = vec![ADDRESS_VERSION];
    address_bytes.extend_from_slice(&ripemd_hash);

    let checksum = double_sha256(&address_bytes);
    address_bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(address_bytes).into_string()
}

/// Check that `address` is base58 of a versioned key hash with a valid checksum
pub fn is_valid_address(address: &str) -> bool {
    let Ok(decoded) = bs58::decode(address).into_vec() else {
        return false;
    };
    decoded.len() == 25
        && decoded[0] == ADDRESS_VERSION
        && double_sha256(&decoded[..21])[..4] == decoded[21..]
}

/// Address of a public key given in wire format
pub fn address_from_public_key_bytes(bytes: &[u8]) -> Result<String, KeyError> {
    public_key_from_bytes(bytes).map(|key| public_key_to_address(&key))
}

fn message_digest(message: &[u8]) -> Result<Message, KeyError> {
    Ok(Message::from_digest_slice(&sha256(message))?)
}

/// Sign the SHA-256 digest of `message` with a secret key
pub fn sign_message(secret_key: &SecretKey, message: &[u8]) -> Result<Vec<u8>, KeyError> {
    let secp = Secp256k1::new();
    let signature = secp.sign_ecdsa(&message_digest(message)?, secret_key);
    let compact = signature.serialize_compact();

    let mut out = Vec::with_capacity(2 * (4 + SCALAR_SIZE));
    put_scalar(&mut out, &compact[..SCALAR_SIZE]);
    put_scalar(&mut out, &compact[SCALAR_SIZE..]);
    Ok(out)
}

/// Verify a wire-format signature over `message` against a public key
///
/// A malformed signature is an error; a well-formed signature that does not
/// match is `Ok(false)`.
pub fn verify_signature(
    public_key: &PublicKey,
    message: &[u8],
    signature: &[u8],
) -> Result<bool, KeyError> {
    let secp = Secp256k1::new();
    let compact = read_scalar_pair(signature).ok_or(KeyError::InvalidSignature)?;
    let sig = Signature::from_compact(&compact).map_err(|_| KeyError::InvalidSignature)?;

    match secp.verify_ecdsa(&message_digest(message)?, &sig, public_key) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

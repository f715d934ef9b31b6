//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 and MD5 hashing
//! - ECDSA key management (secp256k1)
//! - Script wire encodings for public keys and signatures

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, md5, sha256, sha256_hex};
pub use keys::{
    address_from_public_key_bytes, is_valid_address, public_key_from_bytes, public_key_from_hex,
    public_key_to_address, public_key_to_bytes, sign_message, verify_signature, KeyError, KeyPair,
    ADDRESS_VERSION,
};

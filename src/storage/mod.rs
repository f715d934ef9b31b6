//! Storage module for ledger persistence
//!
//! `codec` holds the little-endian framing shared by every persisted
//! structure; `persistence` reads and writes whole ledger files.

pub mod codec;
pub mod persistence;

pub use codec::CodecError;
pub use persistence::{
    decode_ledger, encode_ledger, load_from_file, save_to_file, Storage, StorageConfig,
    StorageError,
};

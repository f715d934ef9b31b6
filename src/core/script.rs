//! Script system for output locking conditions
//!
//! A script is a flat byte string of single-byte instructions, some of which
//! carry inline big-endian operands. Locking scripts sit on outputs; the
//! matching unlocking script is supplied by the input that spends them.
//! See [`crate::core::vm`] for execution.

use std::fmt;
use thiserror::Error;

// =============================================================================
// Script Errors
// =============================================================================

/// Script construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Push data too large: {0} bytes")]
    PushTooLarge(usize),
}

// =============================================================================
// Instruction Set
// =============================================================================

/// Instructions understood by the script VM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Instruction {
    /// Do nothing
    Nop = 0x00,
    /// Push the next byte
    PushByte = 0x10,
    /// Push the next 2 bytes
    PushWord = 0x11,
    /// Push the next 4 bytes
    PushDword = 0x12,
    /// Read a 2-byte big-endian length, push that many bytes
    PushBytes = 0x13,
    /// Duplicate the top element
    Dup = 0x14,
    /// Swap the top two elements
    Swap = 0x15,
    /// Pop two elements, fail unless identical
    Equal = 0x20,
    /// Replace the top element with its base64 text
    HashBase64 = 0x31,
    /// Replace the top element with its hex text
    HashToHex = 0x32,
    /// Replace the top element with its MD5 digest
    HashMd5 = 0x40,
    /// Replace a public key with its address
    HashKey = 0x41,
    /// Pop public key and signature, verify over the locking script
    CheckSig = 0x50,
}

impl Instruction {
    /// Convert byte to instruction
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Instruction::Nop),
            0x10 => Some(Instruction::PushByte),
            0x11 => Some(Instruction::PushWord),
            0x12 => Some(Instruction::PushDword),
            0x13 => Some(Instruction::PushBytes),
            0x14 => Some(Instruction::Dup),
            0x15 => Some(Instruction::Swap),
            0x20 => Some(Instruction::Equal),
            0x31 => Some(Instruction::HashBase64),
            0x32 => Some(Instruction::HashToHex),
            0x40 => Some(Instruction::HashMd5),
            0x41 => Some(Instruction::HashKey),
            0x50 => Some(Instruction::CheckSig),
            _ => None,
        }
    }

    /// Size of the fixed inline operand (PUSH_BYTES reads its length instead)
    pub fn operand_size(&self) -> usize {
        match self {
            Instruction::PushByte => 1,
            Instruction::PushWord => 2,
            Instruction::PushDword => 4,
            _ => 0,
        }
    }

    /// Get instruction name for disassembly
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Nop => "OP_NOP",
            Instruction::PushByte => "OP_PUSH_BYTE",
            Instruction::PushWord => "OP_PUSH_WORD",
            Instruction::PushDword => "OP_PUSH_DWORD",
            Instruction::PushBytes => "OP_PUSH_BYTES",
            Instruction::Dup => "OP_DUP",
            Instruction::Swap => "OP_SWAP",
            Instruction::Equal => "OP_EQUAL",
            Instruction::HashBase64 => "OP_HASH_BASE64",
            Instruction::HashToHex => "OP_HASH_TOHEX",
            Instruction::HashMd5 => "OP_HASH_MD5",
            Instruction::HashKey => "OP_HASH_KEY",
            Instruction::CheckSig => "OP_CHECKSIG",
        }
    }
}

// =============================================================================
// Script
// =============================================================================

/// A sequence of instructions, stored as raw bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    data: Vec<u8>,
}

impl Script {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap raw script bytes (e.g. read back from disk)
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn push_instruction(&mut self, instruction: Instruction) -> &mut Self {
        self.data.push(instruction as u8);
        self
    }

    pub fn push_byte(&mut self, value: u8) -> &mut Self {
        self.data.push(value);
        self
    }

    pub fn push_word(&mut self, value: u16) -> &mut Self {
        self.data.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn push_dword(&mut self, value: u32) -> &mut Self {
        self.data.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append bytes without any instruction
    pub fn push_raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Append `PUSH_BYTES <len> <bytes>`
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, ScriptError> {
        let len = u16::try_from(bytes.len()).map_err(|_| ScriptError::PushTooLarge(bytes.len()))?;
        self.push_instruction(Instruction::PushBytes);
        self.push_word(len);
        Ok(self.push_raw(bytes))
    }

    // =========================================================================
    // Standard templates
    // =========================================================================

    /// Pay-to-key lock: `PUSH_BYTES(pubkey) CHECKSIG`
    pub fn pay_to_key(public_key: &[u8]) -> Result<Self, ScriptError> {
        let mut script = Self::new();
        script
            .push_bytes(public_key)?
            .push_instruction(Instruction::CheckSig);
        Ok(script)
    }

    /// Pay-to-key-hash lock: `DUP HASH_KEY PUSH_BYTES(address) EQUAL CHECKSIG`
    pub fn pay_to_key_hash(address: &[u8]) -> Result<Self, ScriptError> {
        let mut script = Self::new();
        script
            .push_instruction(Instruction::Dup)
            .push_instruction(Instruction::HashKey)
            .push_bytes(address)?
            .push_instruction(Instruction::Equal)
            .push_instruction(Instruction::CheckSig);
        Ok(script)
    }

    /// Unlock for [`Script::pay_to_key`]: `PUSH_BYTES(signature)`
    pub fn unlock_pay_to_key(signature: &[u8]) -> Result<Self, ScriptError> {
        let mut script = Self::new();
        script.push_bytes(signature)?;
        Ok(script)
    }

    /// Unlock for [`Script::pay_to_key_hash`]: `PUSH_BYTES(signature) PUSH_BYTES(pubkey)`
    pub fn unlock_pay_to_key_hash(signature: &[u8], public_key: &[u8]) -> Result<Self, ScriptError> {
        let mut script = Self::new();
        script.push_bytes(signature)?.push_bytes(public_key)?;
        Ok(script)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = &self.data;
        let mut i = 0;
        let mut first = true;

        while i < data.len() {
            if !first {
                write!(f, " ")?;
            }
            first = false;

            let byte = data[i];
            i += 1;

            let Some(instruction) = Instruction::from_byte(byte) else {
                write!(f, "UNKNOWN:0x{:02x}", byte)?;
                continue;
            };
            write!(f, "{}", instruction.name())?;

            let size = match instruction {
                Instruction::PushBytes => match data.get(i..i + 2) {
                    Some(len) => {
                        i += 2;
                        u16::from_be_bytes([len[0], len[1]]) as usize
                    }
                    None => return write!(f, " <truncated>"),
                },
                other => other.operand_size(),
            };

            if size > 0 || instruction == Instruction::PushBytes {
                match data.get(i..i + size) {
                    Some(operand) => write!(f, " 0x{}", hex::encode(operand))?,
                    None => return write!(f, " <truncated>"),
                }
                i += size;
            }
        }

        Ok(())
    }
}

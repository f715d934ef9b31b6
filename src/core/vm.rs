//! Script virtual machine
//!
//! Executes an unlocking script followed by a locking script as one
//! instruction stream against a single stack of byte strings. Execution
//! succeeds only if every instruction runs and the stack ends up empty.

use crate::core::script::{Instruction, Script};
use crate::crypto::{address_from_public_key_bytes, md5, public_key_from_bytes, verify_signature};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

// =============================================================================
// VM Errors
// =============================================================================

/// Reasons a script pair does not authorize a spend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Not enough bytes in script: need {needed} at offset {offset}")]
    MissingBytes { needed: usize, offset: usize },
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("OP_EQUAL: element sizes differ ({0} / {1})")]
    SizeMismatch(usize, usize),
    #[error("OP_EQUAL: elements are not equal")]
    NotEqual,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Malformed signature")]
    MalformedSignature,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid instruction: 0x{0:02x}")]
    UnknownInstruction(u8),
    #[error("Remaining elements in stack: {0}")]
    StackNotEmpty(usize),
}

/// Run `unlock ‖ lock` and report whether it authorizes the spend
pub fn execute(unlock: &Script, lock: &Script) -> Result<(), VmError> {
    Vm::new(unlock, lock).run()
}

/// The script virtual machine
pub struct Vm<'a> {
    /// Unlocking script followed by the locking script
    code: Vec<u8>,
    /// Locking script bytes, the message covered by CHECKSIG
    lock: &'a [u8],
    /// Program counter
    pc: usize,
    stack: Vec<Vec<u8>>,
}

impl<'a> Vm<'a> {
    pub fn new(unlock: &Script, lock: &'a Script) -> Self {
        let mut code = Vec::with_capacity(unlock.len() + lock.len());
        code.extend_from_slice(unlock.as_bytes());
        code.extend_from_slice(lock.as_bytes());

        Self {
            code,
            lock: lock.as_bytes(),
            pc: 0,
            stack: Vec::new(),
        }
    }

    /// Execute until the end of the stream or the first failure
    pub fn run(mut self) -> Result<(), VmError> {
        while self.pc < self.code.len() {
            self.step()?;
        }

        if !self.stack.is_empty() {
            return Err(VmError::StackNotEmpty(self.stack.len()));
        }
        Ok(())
    }

    /// Execute a single instruction
    fn step(&mut self) -> Result<(), VmError> {
        let byte = self.code[self.pc];
        let instruction =
            Instruction::from_byte(byte).ok_or(VmError::UnknownInstruction(byte))?;
        self.pc += 1;

        match instruction {
            Instruction::Nop => {}
            Instruction::PushByte | Instruction::PushWord | Instruction::PushDword => {
                let data = self.read(instruction.operand_size())?;
                self.stack.push(data);
            }
            Instruction::PushBytes => {
                let len = self.read(2)?;
                let len = u16::from_be_bytes([len[0], len[1]]) as usize;
                let data = self.read(len)?;
                self.stack.push(data);
            }
            Instruction::Dup => {
                let top = self.stack.last().ok_or(VmError::StackUnderflow)?.clone();
                self.stack.push(top);
            }
            Instruction::Swap => {
                let len = self.stack.len();
                if len < 2 {
                    return Err(VmError::StackUnderflow);
                }
                self.stack.swap(len - 1, len - 2);
            }
            Instruction::Equal => {
                let a = self.pop()?;
                let b = self.pop()?;
                if a.len() != b.len() {
                    return Err(VmError::SizeMismatch(a.len(), b.len()));
                }
                if a != b {
                    return Err(VmError::NotEqual);
                }
            }
            Instruction::HashBase64 => {
                let value = self.pop()?;
                self.stack.push(BASE64.encode(value).into_bytes());
            }
            Instruction::HashToHex => {
                let value = self.pop()?;
                self.stack.push(hex::encode(value).into_bytes());
            }
            Instruction::HashMd5 => {
                let value = self.pop()?;
                self.stack.push(md5(&value));
            }
            Instruction::HashKey => {
                let key = self.pop()?;
                let address =
                    address_from_public_key_bytes(&key).map_err(|_| VmError::InvalidPublicKey)?;
                self.stack.push(address.into_bytes());
            }
            Instruction::CheckSig => {
                let key = self.pop()?;
                let signature = self.pop()?;

                let key = public_key_from_bytes(&key).map_err(|_| VmError::InvalidPublicKey)?;
                let valid = verify_signature(&key, self.lock, &signature)
                    .map_err(|_| VmError::MalformedSignature)?;
                if !valid {
                    return Err(VmError::InvalidSignature);
                }
            }
        }

        Ok(())
    }

    fn pop(&mut self) -> Result<Vec<u8>, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    /// Read `count` inline bytes and advance past them
    fn read(&mut self, count: usize) -> Result<Vec<u8>, VmError> {
        let data = self
            .code
            .get(self.pc..self.pc + count)
            .ok_or(VmError::MissingBytes {
                needed: count,
                offset: self.pc,
            })?
            .to_vec();
        self.pc += count;
        Ok(data)
    }
}

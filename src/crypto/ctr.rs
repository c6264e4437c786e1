//! AES-CTR stream processor.
//!
//! The 128-bit AES block input is `nonce(12) || block_counter(4, big-endian)`,
//! starting at `block_counter = 0` and incrementing by one per consumed
//! 16-byte block. The keystream is `AES-256-ECB(key, block)`; output is
//! plaintext/ciphertext XORed byte-for-byte against that keystream.
//!
//! This is a hand-rolled state machine, `(key, nonce, byte_counter)`,
//! rather than a wrapper over the `ctr` crate's keystream cipher, because
//! the `StreamExhausted` overflow policy at the `u32` byte-counter boundary
//! is specific to this format and the state needs to be directly
//! inspectable to implement it.
//!
//! # Reference
//! - `original_source/aes.go`'s `AesCtrEncryptor`.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes256;
use thiserror::Error;
use zeroize::Zeroize;

/// Nonce size for this format's AES-CTR construction (12 bytes).
pub const NONCE_SIZE: usize = 12;

const BLOCK_LEN: usize = 16;

/// Errors from the AES-CTR stream processor.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrError {
    /// The byte counter would wrap past `u32::MAX`; the CTR nonce/counter
    /// pair would repeat, which this format never permits.
    #[error("AES-CTR stream exhausted: exceeded 2^32 - 1 bytes under one nonce")]
    StreamExhausted,

    /// The AES cipher failed to initialize (e.g. wrong key length).
    #[error("AES cipher unavailable: {0}")]
    CryptoUnavailable(&'static str),
}

/// A single-threaded, stateful AES-CTR stream cipher instance.
///
/// Encryption and decryption are the same operation: call [`process`] with
/// plaintext to get ciphertext, or with ciphertext to get plaintext back.
///
/// [`process`]: AesCtr::process
pub struct AesCtr {
    cipher: Aes256,
    ctr_value: [u8; BLOCK_LEN],
    pad: [u8; BLOCK_LEN],
    byte_counter: u32,
}

impl Zeroize for AesCtr {
    fn zeroize(&mut self) {
        self.ctr_value.zeroize();
        self.pad.zeroize();
        self.byte_counter.zeroize();
        // `self.cipher` zeroizes its own round-key schedule on drop (the
        // `aes` crate's `zeroize` feature), right after this method returns.
    }
}

impl Drop for AesCtr {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl AesCtr {
    /// Construct a new stream over `key` (32 bytes) starting at `nonce`
    /// (12 bytes) and `byte_counter = 0`.
    pub fn new(key: &[u8; 32], nonce: &[u8; NONCE_SIZE]) -> Result<Self, CtrError> {
        let cipher = Aes256::new_from_slice(key)
            .map_err(|_| CtrError::CryptoUnavailable("invalid AES-256 key length"))?;
        let mut ctr_value = [0u8; BLOCK_LEN];
        ctr_value[..NONCE_SIZE].copy_from_slice(nonce);
        Ok(AesCtr {
            cipher,
            ctr_value,
            pad: [0u8; BLOCK_LEN],
            byte_counter: 0,
        })
    }

    /// Transform `input` into `output` (same length), continuing the
    /// keystream from wherever this instance left off.
    ///
    /// # Panics
    ///
    /// Panics if `input.len() != output.len()`.
    pub fn process(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), CtrError> {
        assert_eq!(input.len(), output.len(), "input/output length mismatch");

        for i in 0..input.len() {
            if self.byte_counter % BLOCK_LEN as u32 == 0 {
                let block_number = self.byte_counter / BLOCK_LEN as u32;
                self.ctr_value[NONCE_SIZE..].copy_from_slice(&block_number.to_be_bytes());
                let mut block = GenericArray::clone_from_slice(&self.ctr_value);
                self.cipher.encrypt_block(&mut block);
                self.pad.copy_from_slice(&block);
            }

            let pad_index = (self.byte_counter % BLOCK_LEN as u32) as usize;
            output[i] = input[i] ^ self.pad[pad_index];

            self.byte_counter = self
                .byte_counter
                .checked_add(1)
                .ok_or(CtrError::StreamExhausted)?;
        }
        Ok(())
    }
}

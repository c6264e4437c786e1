//! Crate-wide error taxonomy.
//!
//! Every fallible operation in this crate surfaces one of these variants
//! (wrapping component-level errors where useful via `#[from]`). None of
//! them warrant a retry: each condition is deterministic given its inputs.

use thiserror::Error;

use crate::crypto::ctr::CtrError;
use crate::keyfile::KeyfileError;

/// Top-level error type for encrypt, decrypt, and resolve operations.
#[derive(Error, Debug)]
pub enum GitCryptError {
    /// Underlying read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Magic mismatch while decrypting: the input is not a git-crypt blob.
    #[error("input is not a git-crypt encrypted file")]
    NotEncrypted,

    /// TLV structure violation: bad length, missing sentinel, bad key name.
    #[error("malformed keyfile or blob: {0}")]
    Malformed(String),

    /// Unknown critical (even `field_id`) field, or unsupported `format_ver`.
    #[error("incompatible keyfile: {0}")]
    Incompatible(String),

    /// The caller-requested key version is not present in the keyfile.
    #[error("key version {0} not available in keyfile")]
    UnknownKeyVersion(u32),

    /// **[INTEGRITY VIOLATION]** HMAC verification failed at the end of
    /// decryption: the ciphertext was tampered with, or the wrong key was
    /// used. Any plaintext already written to the sink must be discarded.
    #[error("encrypted file has been tampered with, or was decrypted with the wrong key")]
    Tampered,

    /// The AES-CTR counter would wrap past its `2^32 - 1`-byte limit.
    #[error("stream exceeds the maximum length for a single CTR nonce")]
    StreamExhausted,

    /// The keyring resolver exhausted every (name, recipient) candidate
    /// without a single successful unwrap.
    #[error("no available key could unlock any keyfile under the keys root")]
    NoAvailableKey,

    /// A cryptographic primitive failed to construct (e.g. bad key length).
    #[error("cryptographic primitive unavailable: {0}")]
    CryptoUnavailable(String),
}

impl From<CtrError> for GitCryptError {
    fn from(err: CtrError) -> Self {
        match err {
            CtrError::StreamExhausted => GitCryptError::StreamExhausted,
            CtrError::CryptoUnavailable(msg) => GitCryptError::CryptoUnavailable(msg),
        }
    }
}

impl From<KeyfileError> for GitCryptError {
    fn from(err: KeyfileError) -> Self {
        match err {
            KeyfileError::Malformed(msg) => GitCryptError::Malformed(msg),
            KeyfileError::Incompatible(msg) => GitCryptError::Incompatible(msg),
            KeyfileError::Io(e) => GitCryptError::Io(e),
        }
    }
}

//! The file cipher driver (component E): framed encrypt/decrypt, header
//! emit/parse, nonce derivation, and MAC verification.
//!
//! # Reference
//! - `original_source/decrypt.go` (`DecryptStream`, `IsGitCrypted`,
//!   `ReadFileHeader`).

use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, instrument, trace, warn};

use crate::crypto::ctr::{AesCtr, NONCE_SIZE};
use crate::crypto::hmac::HmacSha1;
use crate::error::GitCryptError;
use crate::keyfile::{KeyEntry, Keyfile};
use crate::util::constant_time_eq;

/// The 9-byte magic that identifies a git-crypt encrypted blob.
pub const MAGIC: [u8; 9] = *b"\x00GITCRYPT";

/// The full 10-byte header prefix: the 9-byte magic plus one reserved
/// `0x00` byte.
const HEADER_PREFIX: [u8; 10] = *b"\x00GITCRYPT\x00";

/// Size of the fixed preamble prepended to every encrypted file: the
/// 10-byte header prefix plus the 12-byte nonce.
pub const HEADER_SIZE: usize = HEADER_PREFIX.len() + NONCE_SIZE;

const IO_BUF_SIZE: usize = 8192;

/// The fixed 22-byte preamble of an encrypted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    nonce: [u8; NONCE_SIZE],
}

impl FileHeader {
    /// The nonce carried by this header: the first 12 bytes of
    /// `HMAC-SHA1(hmac_key, plaintext)` under the entry used to encrypt.
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    fn to_bytes(self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..HEADER_PREFIX.len()].copy_from_slice(&HEADER_PREFIX);
        bytes[HEADER_PREFIX.len()..].copy_from_slice(&self.nonce);
        bytes
    }

    fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self, GitCryptError> {
        if bytes[..MAGIC.len()] != MAGIC {
            return Err(GitCryptError::NotEncrypted);
        }
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[HEADER_PREFIX.len()..]);
        Ok(FileHeader { nonce })
    }
}

/// Encrypt `plaintext` under `key_entry`, writing the framed output
/// (`magic || nonce || AES-CTR(plaintext)`) to `sink`.
///
/// The nonce is derived from `HMAC-SHA1(key_entry.hmac_key(), plaintext)`,
/// which requires the whole plaintext before any output can be written;
/// this driver takes the "buffer the plaintext, then MAC, then encrypt"
/// branch of the two-pass requirement in §4.3.
#[instrument(level = "debug", skip(plaintext, sink, key_entry), fields(key_version = key_entry.version()))]
pub fn encrypt_file<R: Read, W: Write>(
    key_entry: &KeyEntry,
    mut plaintext: R,
    mut sink: W,
) -> Result<(), GitCryptError> {
    let mut buf = Vec::new();
    plaintext.read_to_end(&mut buf)?;
    trace!(plaintext_len = buf.len(), "buffered plaintext for encryption");

    let mut mac = HmacSha1::new(key_entry.hmac_key());
    mac.write(&buf);
    let digest = mac.finalize();
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);

    let header = FileHeader { nonce };
    sink.write_all(&header.to_bytes())?;

    let mut ciphertext = vec![0u8; buf.len()];
    AesCtr::new(key_entry.aes_key(), &nonce)?.process(&buf, &mut ciphertext)?;
    sink.write_all(&ciphertext)?;

    debug!(output_len = HEADER_SIZE + ciphertext.len(), "encrypted file");
    Ok(())
}

/// Decrypt a framed ciphertext stream produced by [`encrypt_file`].
///
/// `key_version` selects the entry within `keyfile` used for decryption
/// (the current design leaves this to the caller's discretion, typically
/// `0` or the keyfile's latest version; see §4.3).
///
/// Plaintext bytes are written to `sink` as they are decrypted, *before*
/// the trailing MAC comparison completes (a filter-style interface where
/// partial output is unavoidable). A [`GitCryptError::Tampered`] result
/// means the data already written to `sink` must be treated as poisoned.
#[instrument(level = "debug", skip(source, sink, keyfile), fields(key_version))]
pub fn decrypt_file<R: Read, W: Write>(
    keyfile: &Keyfile,
    key_version: u32,
    mut source: R,
    mut sink: W,
) -> Result<(), GitCryptError> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    source.read_exact(&mut header_bytes)?;
    let header = FileHeader::parse(&header_bytes)?;

    let entry = keyfile
        .entry(key_version)
        .ok_or(GitCryptError::UnknownKeyVersion(key_version))?;

    let mut ctr = AesCtr::new(entry.aes_key(), header.nonce())?;
    let mut mac = HmacSha1::new(entry.hmac_key());

    let mut in_buf = [0u8; IO_BUF_SIZE];
    loop {
        let n = source.read(&mut in_buf)?;
        if n == 0 {
            break;
        }
        let mut out_buf = vec![0u8; n];
        ctr.process(&in_buf[..n], &mut out_buf)?;
        sink.write_all(&out_buf)?;
        mac.write(&out_buf);
    }

    let digest = mac.finalize();
    if !constant_time_eq(&digest[..NONCE_SIZE], header.nonce()) {
        warn!("HMAC verification failed: file has been tampered with");
        return Err(GitCryptError::Tampered);
    }

    debug!("decrypted file and verified MAC");
    Ok(())
}

/// Sniff whether `reader` begins with the git-crypt magic, without
/// consuming more than the first 9 bytes' worth of semantic meaning.
///
/// Short reads or I/O errors return `false` rather than propagating an
/// error: this is a best-effort "is this file encrypted?" probe.
pub fn sniff_magic<R: Read>(mut reader: R) -> bool {
    let mut buf = [0u8; HEADER_PREFIX.len()];
    match reader.read(&mut buf) {
        Ok(n) if n >= MAGIC.len() => buf[..MAGIC.len()] == MAGIC,
        _ => false,
    }
}

/// Check whether the file at `path` is a git-crypt encrypted blob, by
/// magic alone. Short reads or I/O errors return `false`.
pub fn is_encrypted<P: AsRef<Path>>(path: P) -> bool {
    match std::fs::File::open(path) {
        Ok(file) => sniff_magic(file),
        Err(_) => false,
    }
}

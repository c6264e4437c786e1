//! The keyfile data model: [`KeyEntry`] and [`Keyfile`] (component D's
//! types; the TLV codec itself lives in [`codec`]).

pub mod codec;

use std::fmt;

use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

/// Maximum length, in bytes, of a key name (§4.4).
pub const KEY_NAME_MAX_LEN: usize = 128;

/// Errors from keyfile parsing, construction, and name validation.
#[derive(Error, Debug)]
pub enum KeyfileError {
    /// Underlying I/O failure while reading a keyfile.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLV structure violation: bad length, missing sentinel, bad name,
    /// duplicate version, or an append with a non-increasing version.
    #[error("malformed keyfile: {0}")]
    Malformed(String),

    /// Unknown critical (even `field_id`) field, or unsupported `format_ver`.
    #[error("incompatible keyfile: {0}")]
    Incompatible(String),
}

/// Error returned by [`Keyfile::latest`] when the keyfile has no entries.
///
/// A zero-entry keyfile is a valid, parseable value (it still carries a
/// name), which is a distinct condition from any TLV parsing failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("keyfile has no key entries")]
pub struct NoLatestEntry;

/// Validate a key name per §4.4: non-empty, not the literal `"default"`,
/// every byte in `[A-Za-z0-9_-]`, length at most [`KEY_NAME_MAX_LEN`].
pub fn validate_key_name(name: &str) -> Result<(), KeyfileError> {
    if name.is_empty() {
        return Err(KeyfileError::Malformed("key name may not be empty".into()));
    }
    if name == "default" {
        return Err(KeyfileError::Malformed(
            "'default' is not a legal key name".into(),
        ));
    }
    if name.len() > KEY_NAME_MAX_LEN {
        return Err(KeyfileError::Malformed("key name is too long".into()));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(KeyfileError::Malformed(
            "key names may contain only A-Z, a-z, 0-9, '-', and '_'".into(),
        ));
    }
    Ok(())
}

/// One versioned `(aes_key, hmac_key)` pair within a [`Keyfile`].
///
/// Key material is wrapped in [`Zeroizing`] so it is overwritten as soon as
/// the entry (or a clone of it) is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyEntry {
    version: u32,
    aes_key: Zeroizing<[u8; 32]>,
    hmac_key: Zeroizing<[u8; 64]>,
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("version", &self.version)
            .field("aes_key", &"[REDACTED]")
            .field("hmac_key", &"[REDACTED]")
            .finish()
    }
}

impl KeyEntry {
    /// Build an entry from raw key material.
    pub fn new(version: u32, aes_key: [u8; 32], hmac_key: [u8; 64]) -> Self {
        KeyEntry {
            version,
            aes_key: Zeroizing::new(aes_key),
            hmac_key: Zeroizing::new(hmac_key),
        }
    }

    /// Generate a fresh entry with cryptographically random key material.
    ///
    /// Uses the platform CSPRNG via `rand::rng()`, never a non-crypto PRNG
    /// (§9 calls out exactly this as a bug to avoid reproducing).
    pub fn generate(version: u32) -> Self {
        let mut aes_key = [0u8; 32];
        let mut hmac_key = [0u8; 64];
        rand::rng().fill_bytes(&mut aes_key);
        rand::rng().fill_bytes(&mut hmac_key);
        KeyEntry::new(version, aes_key, hmac_key)
    }

    /// This entry's version number.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The 32-byte AES key.
    pub fn aes_key(&self) -> &[u8; 32] {
        &self.aes_key
    }

    /// The 64-byte HMAC key.
    pub fn hmac_key(&self) -> &[u8; 64] {
        &self.hmac_key
    }
}

/// An ordered collection of [`KeyEntry`] values sharing one symbolic name.
///
/// `name` is either empty (meaning "default") or a name validated by
/// [`validate_key_name`]. Entries are immutable once loaded; the only
/// mutation is [`Keyfile::push`], which appends a strictly higher version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyfile {
    name: String,
    entries: Vec<KeyEntry>,
}

impl Keyfile {
    /// Build a keyfile from a name and an ordered set of entries.
    ///
    /// Validates the name (if non-empty) and rejects duplicate versions.
    pub fn new(name: String, entries: Vec<KeyEntry>) -> Result<Self, KeyfileError> {
        if !name.is_empty() {
            validate_key_name(&name)?;
        }
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.version()) {
                return Err(KeyfileError::Malformed(format!(
                    "duplicate key version {} in keyfile",
                    entry.version()
                )));
            }
        }
        Ok(Keyfile { name, entries })
    }

    /// This keyfile's symbolic name (empty string means "default").
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All entries, in the order they were loaded.
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// The entry whose version equals `version`, if present.
    pub fn entry(&self, version: u32) -> Option<&KeyEntry> {
        self.entries.iter().find(|e| e.version() == version)
    }

    /// The entry with the greatest version number.
    ///
    /// Fails with [`NoLatestEntry`] when the keyfile has zero entries, a
    /// distinct condition from any parsing error, since an empty keyfile is
    /// itself a valid value (§8 boundary behavior).
    pub fn latest(&self) -> Result<&KeyEntry, NoLatestEntry> {
        self.entries.iter().max_by_key(|e| e.version()).ok_or(NoLatestEntry)
    }

    /// Append a new entry, which must have a strictly higher version than
    /// every entry already present.
    pub fn push(&mut self, entry: KeyEntry) -> Result<(), KeyfileError> {
        if let Some(max) = self.entries.iter().map(KeyEntry::version).max() {
            if entry.version() <= max {
                return Err(KeyfileError::Malformed(format!(
                    "new entry version {} must exceed current latest version {max}",
                    entry.version()
                )));
            }
        }
        self.entries.push(entry);
        Ok(())
    }
}

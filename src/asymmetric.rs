//! The asymmetric envelope layer is an external collaborator, not something
//! this crate implements (§1 out-of-scope list): OpenPGP encrypt/decrypt,
//! ASCII-armor handling, and key ingestion all live on the caller's side of
//! this boundary. This module only defines the narrow interface the
//! keyring resolver calls through.

use std::fmt;

/// Opaque identifier for one recipient of a wrapped keyfile (typically a
/// GPG key id or fingerprint). The resolver treats this as an uninterpreted
/// token used to build `<recipient_id>.gpg` candidate filenames; it never
/// inspects the identifier's structure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecipientId(String);

impl RecipientId {
    /// Wrap a raw identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        RecipientId(id.into())
    }

    /// The identifier as it appears in a `<recipient_id>.gpg` file name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecipientId {
    fn from(id: String) -> Self {
        RecipientId(id)
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        RecipientId(id.to_string())
    }
}

/// Unwraps a `WrappedKeyfile` blob back into the serialized `Keyfile` bytes
/// it encloses, using whatever private keyring the implementor holds.
///
/// Implementors are responsible for ASCII-armor detection (by the literal
/// substring `BEGIN PGP MESSAGE`) and for trying whichever private key
/// material they have available; this crate never inspects `wrapped`
/// itself beyond handing it across this boundary.
pub trait AsymmetricDecryptor {
    /// The error type surfaced on a failed unwrap (wrong key, corrupted
    /// ciphertext, armor parse failure, ...). The resolver only logs this;
    /// it never propagates it to its own caller, so `Display` is all that
    /// is required of it.
    type Error: fmt::Display;

    /// Attempt to decrypt `wrapped` into the plaintext bytes of a
    /// serialized `Keyfile`.
    fn decrypt(&self, wrapped: &[u8]) -> Result<Vec<u8>, Self::Error>;
}

/// Wraps serialized `Keyfile` bytes for one or more recipients, optionally
/// also escrowing to a master key.
pub trait AsymmetricEncryptor {
    /// The error type surfaced on a failed wrap.
    type Error: fmt::Display;

    /// Encrypt `plaintext` (a serialized `Keyfile`) to `recipients`, and
    /// additionally to `optional_master` if supplied.
    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &[RecipientId],
        optional_master: Option<&RecipientId>,
    ) -> Result<Vec<u8>, Self::Error>;
}

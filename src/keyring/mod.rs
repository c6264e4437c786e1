//! The keyring resolver (component F): discover, unwrap, and validate
//! keyfiles from the on-disk `<keys_root>/<name>/<version>/<recipient_id>.gpg`
//! layout.
//!
//! # Reference
//! - `original_source/gpg.go`'s key-lookup and trial-decrypt loop.

pub mod store;

use std::io;

use tracing::{debug, instrument, warn};

pub use store::{KeyStore, MemoryKeyStore, RealKeyStore};

use crate::asymmetric::{AsymmetricDecryptor, RecipientId};
use crate::error::GitCryptError;
use crate::keyfile::{codec, validate_key_name, Keyfile};

/// Discover and unwrap every keyfile reachable under `store` for
/// `key_version`, trying each of `recipient_ids` in order per key name.
///
/// Returns one single-entry `Keyfile` per key name that yielded a
/// successful unwrap. Fails with [`GitCryptError::NoAvailableKey`] if no
/// name under `store` could be unwrapped by any recipient id.
#[instrument(level = "debug", skip(decryptor, store, recipient_ids), fields(key_version, recipients = recipient_ids.len()))]
pub fn resolve<D: AsymmetricDecryptor>(
    decryptor: &D,
    store: &impl KeyStore,
    key_version: u32,
    recipient_ids: &[RecipientId],
) -> Result<Vec<Keyfile>, GitCryptError> {
    let mut name_entries = store.list_dir("")?;
    name_entries.sort();

    let mut results = Vec::new();

    for dir_name in name_entries {
        let key_name = if dir_name == "default" {
            String::new()
        } else if validate_key_name(&dir_name).is_ok() {
            dir_name.clone()
        } else {
            debug!(name = %dir_name, "skipping malformed key directory name");
            continue;
        };

        let Some(plaintext) = unwrap_first_match(decryptor, store, &dir_name, key_version, recipient_ids) else {
            continue;
        };

        let parsed = codec::parse(&mut io::Cursor::new(plaintext))?;

        let entry = parsed.entry(key_version).cloned().ok_or_else(|| {
            GitCryptError::Malformed(format!(
                "wrapped keyfile for key '{key_name}' has no entry for version {key_version}"
            ))
        })?;

        if parsed.name() != key_name {
            return Err(GitCryptError::Malformed(format!(
                "wrapped keyfile claims name '{}' but was stored under '{key_name}'",
                parsed.name()
            )));
        }

        results.push(Keyfile::new(parsed.name().to_string(), vec![entry])?);
    }

    if results.is_empty() {
        return Err(GitCryptError::NoAvailableKey);
    }
    Ok(results)
}

/// Try every recipient id, in order, against `<dir_name>/<key_version>/<id>.gpg`.
/// Returns the first successfully-unwrapped plaintext, or `None` if every
/// candidate was missing or failed to unwrap.
fn unwrap_first_match<D: AsymmetricDecryptor>(
    decryptor: &D,
    store: &impl KeyStore,
    dir_name: &str,
    key_version: u32,
    recipient_ids: &[RecipientId],
) -> Option<Vec<u8>> {
    let version_dir = format!("{dir_name}/{key_version}");

    for recipient_id in recipient_ids {
        let candidate = format!("{version_dir}/{}.gpg", recipient_id.as_str());

        let wrapped = match store.open_read(&candidate) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(path = %candidate, error = %e, "could not read candidate keyfile");
                continue;
            }
        };

        match decryptor.decrypt(&wrapped) {
            Ok(plaintext) => {
                debug!(path = %candidate, "unwrapped keyfile");
                return Some(plaintext);
            }
            Err(e) => {
                warn!(path = %candidate, error = %e, "asymmetric unwrap failed, trying next recipient");
                continue;
            }
        }
    }
    None
}

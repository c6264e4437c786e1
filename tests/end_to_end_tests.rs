//! End-to-end scenarios exercised purely through the public API, covering
//! the encrypt/decrypt round trip, tamper detection, keyfile TLV
//! round-tripping, and keyring resolution.

use std::io::Cursor;

use gitcrypt_core::keyfile::codec;
use gitcrypt_core::keyring::{resolve, MemoryKeyStore};
use gitcrypt_core::{
    decrypt_file, encrypt_file, is_encrypted, AsymmetricDecryptor, GitCryptError, KeyEntry,
    Keyfile, RecipientId,
};

#[test]
fn all_zero_key_hello_plaintext_matches_known_nonce() {
    let entry = KeyEntry::new(0, [0u8; 32], [0u8; 64]);
    let mut encrypted = Vec::new();
    encrypt_file(&entry, Cursor::new(b"hello".to_vec()), &mut encrypted).unwrap();

    assert_eq!(encrypted.len(), 27);
    assert_eq!(
        &encrypted[10..22],
        &[0x9b, 0x6c, 0x11, 0x43, 0xb6, 0xb6, 0x23, 0x9a, 0xd3, 0x6b, 0x47, 0xba]
    );
}

#[test]
fn flipping_a_ciphertext_byte_is_detected_as_tampering() {
    let entry = KeyEntry::new(0, [0u8; 32], [0u8; 64]);
    let keyfile = Keyfile::new(String::new(), vec![entry.clone()]).unwrap();

    let mut encrypted = Vec::new();
    encrypt_file(&entry, Cursor::new(b"hello".to_vec()), &mut encrypted).unwrap();
    encrypted[22] ^= 0xFF;

    let mut out = Vec::new();
    let result = decrypt_file(&keyfile, 0, Cursor::new(encrypted), &mut out);
    assert!(matches!(result, Err(GitCryptError::Tampered)));
}

#[test]
fn truncated_nonce_fails_to_decrypt() {
    let keyfile = Keyfile::new(String::new(), vec![KeyEntry::generate(0)]).unwrap();
    let mut header = b"\x00GITCRYPT\x00".to_vec();
    header.extend_from_slice(&[0u8; 5]); // only 5 of 12 nonce bytes

    let mut out = Vec::new();
    let result = decrypt_file(&keyfile, 0, Cursor::new(header), &mut out);
    assert!(matches!(result, Err(GitCryptError::Io(_))));
}

#[test]
fn named_keyfile_round_trips_byte_for_byte() {
    let keyfile = Keyfile::new(
        "prod".to_string(),
        vec![KeyEntry::new(0, [0x11; 32], [0x22; 64])],
    )
    .unwrap();

    let bytes = codec::serialize(&keyfile);
    let parsed = codec::parse(&mut Cursor::new(bytes.clone())).unwrap();
    assert_eq!(parsed, keyfile);
    assert_eq!(codec::serialize(&parsed), bytes);
}

#[test]
fn unknown_critical_field_makes_keyfile_incompatible() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"\x00GITCRYPTKEY");
    bytes.extend_from_slice(&2u32.to_be_bytes()); // format_ver
    bytes.extend_from_slice(&2u32.to_be_bytes()); // field_id = 2, critical
    bytes.extend_from_slice(&3u32.to_be_bytes());
    bytes.extend_from_slice(b"abc");
    bytes.extend_from_slice(&0u32.to_be_bytes()); // header end

    let result = codec::parse(&mut Cursor::new(bytes));
    assert!(matches!(result, Err(gitcrypt_core::keyfile::KeyfileError::Incompatible(_))));
}

#[test]
fn unknown_noncritical_field_is_dropped_silently() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"\x00GITCRYPTKEY");
    bytes.extend_from_slice(&2u32.to_be_bytes());
    bytes.extend_from_slice(&7u32.to_be_bytes()); // field_id = 7, non-critical
    bytes.extend_from_slice(&16u32.to_be_bytes());
    bytes.extend_from_slice(&[0xAB; 16]);
    bytes.extend_from_slice(&0u32.to_be_bytes()); // header end

    let parsed = codec::parse(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(parsed.name(), "");
    assert!(parsed.entries().is_empty());
}

/// A fake asymmetric keyring: "wrapping" prefixes plaintext with the
/// identity it was meant for; "unwrapping" only succeeds for the owner's
/// own identity.
struct FakeKeyring {
    identity: RecipientId,
}

#[derive(Debug)]
struct NoMatchingKey;

impl std::fmt::Display for NoMatchingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no matching private key")
    }
}

impl AsymmetricDecryptor for FakeKeyring {
    type Error = NoMatchingKey;

    fn decrypt(&self, wrapped: &[u8]) -> Result<Vec<u8>, Self::Error> {
        let marker = format!("wrapped-for:{}:", self.identity.as_str());
        std::str::from_utf8(wrapped)
            .ok()
            .and_then(|s| s.strip_prefix(&marker))
            .map(|rest| rest.as_bytes().to_vec())
            .ok_or(NoMatchingKey)
    }
}

#[test]
fn resolver_fails_closed_when_recipient_has_no_matching_private_key() {
    let keyfile = Keyfile::new(String::new(), vec![KeyEntry::generate(0)]).unwrap();
    let mut wrapped = b"wrapped-for:someone-else:".to_vec();
    wrapped.extend(codec::serialize(&keyfile));

    let mut store = MemoryKeyStore::new();
    store.insert("default/0/unknown-recipient.gpg", wrapped);

    let decryptor = FakeKeyring {
        identity: RecipientId::new("me"),
    };
    let result = resolve(&decryptor, &store, 0, &[RecipientId::new("me")]);
    assert!(matches!(result, Err(GitCryptError::NoAvailableKey)));
}

#[test]
fn resolver_recovers_a_usable_keyfile_when_recipient_matches() {
    let original_entry = KeyEntry::generate(0);
    let keyfile = Keyfile::new(String::new(), vec![original_entry.clone()]).unwrap();
    let mut wrapped = b"wrapped-for:me:".to_vec();
    wrapped.extend(codec::serialize(&keyfile));

    let mut store = MemoryKeyStore::new();
    store.insert("default/0/me.gpg", wrapped);

    let decryptor = FakeKeyring {
        identity: RecipientId::new("me"),
    };
    let resolved = resolve(&decryptor, &store, 0, &[RecipientId::new("me")]).unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].entry(0).unwrap(), &original_entry);
}

#[test]
fn is_encrypted_detects_magic_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let encrypted_path = dir.path().join("secret.bin");
    let plain_path = dir.path().join("plain.bin");

    let entry = KeyEntry::generate(0);
    let mut out = Vec::new();
    encrypt_file(&entry, Cursor::new(b"top secret".to_vec()), &mut out).unwrap();
    std::fs::write(&encrypted_path, &out).unwrap();
    std::fs::write(&plain_path, b"just text").unwrap();

    assert!(is_encrypted(&encrypted_path));
    assert!(!is_encrypted(&plain_path));
    assert!(!is_encrypted(dir.path().join("does-not-exist.bin")));
}

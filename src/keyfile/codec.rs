//! TLV wire format for [`Keyfile`](super::Keyfile).
//!
//! ```text
//! preamble   : \x00 G I T C R Y P T K E Y           (12 bytes)
//! format_ver : u32 big-endian, MUST be 2            (4 bytes)
//! header     : sequence of {field_id:u32, len:u32, value:len bytes}
//!              terminated by field_id == 0
//! entries    : sequence of KeyEntry encodings, each
//!              itself a TLV sequence terminated by field_id == 0
//! ```
//!
//! Unknown fields with an even `field_id` are "critical": a reader that
//! doesn't understand them must refuse to proceed ([`KeyfileError::Incompatible`]).
//! Unknown fields with an odd `field_id` are "non-critical" and are skipped.
//!
//! # Reference
//! - `original_source/key.go` (`Key::Load`, `KeyEntry::Load`).

use std::io::{Read, Write};

use super::{validate_key_name, KeyEntry, Keyfile, KeyfileError};
use crate::util::{read_u32_be, write_u32_be};

const PREAMBLE: [u8; 12] = *b"\x00GITCRYPTKEY";
const FORMAT_VERSION: u32 = 2;

const HEADER_FIELD_END: u32 = 0;
const HEADER_FIELD_KEY_NAME: u32 = 1;

const ENTRY_FIELD_END: u32 = 0;
const ENTRY_FIELD_VERSION: u32 = 1;
const ENTRY_FIELD_AES_KEY: u32 = 3;
const ENTRY_FIELD_HMAC_KEY: u32 = 5;

/// Bound on the length of a skipped non-critical field (1 MiB, §4.4).
const MAX_SKIPPED_FIELD_LEN: u32 = 1 << 20;

/// Read a big-endian `u32`, returning `Ok(None)` only on a clean EOF before
/// any byte of this field was read (i.e. there is nothing more to parse).
/// A partial read (EOF mid-field) is a [`KeyfileError::Malformed`].
fn read_u32_opt<R: Read>(r: &mut R) -> Result<Option<u32>, KeyfileError> {
    let mut buf = [0u8; 4];
    let mut filled = 0usize;
    while filled < 4 {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return if filled == 0 {
                    Ok(None)
                } else {
                    Err(KeyfileError::Malformed(
                        "unexpected EOF reading a field id/length".into(),
                    ))
                };
            }
            Ok(n) => filled += n,
            Err(e) => return Err(KeyfileError::Io(e)),
        }
    }
    Ok(Some(read_u32_be(&buf)))
}

/// Like [`read_u32_opt`], but any EOF (even a clean one) is malformed: used
/// whenever the format requires another field to follow.
fn read_u32_required<R: Read>(r: &mut R, what: &str) -> Result<u32, KeyfileError> {
    read_u32_opt(r)?.ok_or_else(|| KeyfileError::Malformed(format!("unexpected EOF reading {what}")))
}

fn read_exact_owned<R: Read>(r: &mut R, len: usize, what: &str) -> Result<Vec<u8>, KeyfileError> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|_| KeyfileError::Malformed(format!("unexpected EOF reading {what}")))?;
    Ok(buf)
}

fn skip_unknown_field<R: Read>(r: &mut R, field_id: u32, len: u32) -> Result<(), KeyfileError> {
    if field_id % 2 == 0 {
        return Err(KeyfileError::Incompatible(format!(
            "unknown critical field_id {field_id}"
        )));
    }
    if len > MAX_SKIPPED_FIELD_LEN {
        return Err(KeyfileError::Malformed(format!(
            "non-critical field_id {field_id} has length {len} exceeding the 1 MiB skip bound"
        )));
    }
    let _ = read_exact_owned(r, len as usize, "a skipped non-critical field")?;
    Ok(())
}

fn parse_header<R: Read>(r: &mut R) -> Result<String, KeyfileError> {
    let mut name = String::new();
    let mut field_id = read_u32_required(r, "a header field id")?;
    while field_id != HEADER_FIELD_END {
        let len = read_u32_required(r, "a header field length")?;
        match field_id {
            HEADER_FIELD_KEY_NAME => {
                if len as usize > super::KEY_NAME_MAX_LEN {
                    return Err(KeyfileError::Malformed("key name field too long".into()));
                }
                if len == 0 {
                    name = String::new();
                } else {
                    let raw = read_exact_owned(r, len as usize, "the key name field")?;
                    let candidate = String::from_utf8(raw)
                        .map_err(|_| KeyfileError::Malformed("key name is not valid UTF-8".into()))?;
                    validate_key_name(&candidate)?;
                    name = candidate;
                }
            }
            _ => skip_unknown_field(r, field_id, len)?,
        }
        field_id = read_u32_required(r, "a header field id")?;
    }
    Ok(name)
}

fn parse_entry<R: Read>(r: &mut R, first_field_id: u32) -> Result<KeyEntry, KeyfileError> {
    let mut version: Option<u32> = None;
    let mut aes_key: Option<[u8; 32]> = None;
    let mut hmac_key: Option<[u8; 64]> = None;

    let mut field_id = first_field_id;
    while field_id != ENTRY_FIELD_END {
        let len = read_u32_required(r, "an entry field length")?;
        match field_id {
            ENTRY_FIELD_VERSION => {
                if len != 4 {
                    return Err(KeyfileError::Malformed(format!(
                        "entry version field has length {len}, expected 4"
                    )));
                }
                version = Some(read_u32_required(r, "the entry version value")?);
            }
            ENTRY_FIELD_AES_KEY => {
                if len != 32 {
                    return Err(KeyfileError::Malformed(format!(
                        "entry AES key field has length {len}, expected 32"
                    )));
                }
                let raw = read_exact_owned(r, 32, "the entry AES key")?;
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&raw);
                aes_key = Some(arr);
            }
            ENTRY_FIELD_HMAC_KEY => {
                if len != 64 {
                    return Err(KeyfileError::Malformed(format!(
                        "entry HMAC key field has length {len}, expected 64"
                    )));
                }
                let raw = read_exact_owned(r, 64, "the entry HMAC key")?;
                let mut arr = [0u8; 64];
                arr.copy_from_slice(&raw);
                hmac_key = Some(arr);
            }
            _ => skip_unknown_field(r, field_id, len)?,
        }
        field_id = read_u32_required(r, "an entry field id")?;
    }

    let version = version.ok_or_else(|| KeyfileError::Malformed("entry missing version field".into()))?;
    let aes_key = aes_key.ok_or_else(|| KeyfileError::Malformed("entry missing AES key field".into()))?;
    let hmac_key = hmac_key.ok_or_else(|| KeyfileError::Malformed("entry missing HMAC key field".into()))?;
    Ok(KeyEntry::new(version, aes_key, hmac_key))
}

/// Parse a [`Keyfile`] from a TLV byte stream.
pub fn parse<R: Read>(r: &mut R) -> Result<Keyfile, KeyfileError> {
    let mut preamble = [0u8; 12];
    r.read_exact(&mut preamble)
        .map_err(|_| KeyfileError::Malformed("truncated keyfile preamble".into()))?;
    if preamble != PREAMBLE {
        return Err(KeyfileError::Malformed("bad keyfile preamble".into()));
    }

    let format_ver = read_u32_required(r, "the format version")?;
    if format_ver != FORMAT_VERSION {
        return Err(KeyfileError::Incompatible(format!(
            "unsupported keyfile format version {format_ver}"
        )));
    }

    let name = parse_header(r)?;

    let mut entries = Vec::new();
    loop {
        let Some(field_id) = read_u32_opt(r)? else {
            break;
        };
        entries.push(parse_entry(r, field_id)?);
    }

    Keyfile::new(name, entries)
}

/// Serialize a [`Keyfile`] to its TLV byte representation.
pub fn serialize(keyfile: &Keyfile) -> Vec<u8> {
    let mut out = Vec::new();
    write_tlv(&mut out, keyfile).expect("writing to a Vec<u8> never fails");
    out
}

fn write_tlv<W: Write>(w: &mut W, keyfile: &Keyfile) -> std::io::Result<()> {
    w.write_all(&PREAMBLE)?;
    write_u32(w, FORMAT_VERSION)?;

    if !keyfile.name().is_empty() {
        write_u32(w, HEADER_FIELD_KEY_NAME)?;
        write_u32(w, keyfile.name().len() as u32)?;
        w.write_all(keyfile.name().as_bytes())?;
    }
    write_u32(w, HEADER_FIELD_END)?;

    for entry in keyfile.entries() {
        write_u32(w, ENTRY_FIELD_VERSION)?;
        write_u32(w, 4)?;
        write_u32(w, entry.version())?;

        write_u32(w, ENTRY_FIELD_AES_KEY)?;
        write_u32(w, 32)?;
        w.write_all(entry.aes_key())?;

        write_u32(w, ENTRY_FIELD_HMAC_KEY)?;
        write_u32(w, 64)?;
        w.write_all(entry.hmac_key())?;

        write_u32(w, ENTRY_FIELD_END)?;
    }

    Ok(())
}

fn write_u32<W: Write>(w: &mut W, value: u32) -> std::io::Result<()> {
    let mut buf = [0u8; 4];
    write_u32_be(&mut buf, value);
    w.write_all(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_named_keyfile_with_one_entry() {
        let keyfile = Keyfile::new(
            "prod".to_string(),
            vec![KeyEntry::new(0, [0x42; 32], [0x24; 64])],
        )
        .unwrap();

        let bytes = serialize(&keyfile);
        let parsed = parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, keyfile);
    }

    #[test]
    fn roundtrip_default_empty_keyfile() {
        let keyfile = Keyfile::new(String::new(), vec![]).unwrap();
        let bytes = serialize(&keyfile);
        let parsed = parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, keyfile);
        assert_eq!(parsed.name(), "");
    }

    #[test]
    fn roundtrip_multi_entry_keyfile() {
        let keyfile = Keyfile::new(
            String::new(),
            vec![
                KeyEntry::generate(0),
                KeyEntry::generate(1),
                KeyEntry::generate(2),
            ],
        )
        .unwrap();
        let bytes = serialize(&keyfile);
        let parsed = parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, keyfile);
    }

    #[test]
    fn unknown_critical_field_is_incompatible() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PREAMBLE);
        write_u32(&mut bytes, FORMAT_VERSION).unwrap();
        // Header: unknown critical field_id = 2, arbitrary length/value.
        write_u32(&mut bytes, 2).unwrap();
        write_u32(&mut bytes, 3).unwrap();
        bytes.extend_from_slice(b"abc");
        write_u32(&mut bytes, HEADER_FIELD_END).unwrap();

        let result = parse(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(KeyfileError::Incompatible(_))));
    }

    #[test]
    fn unknown_noncritical_field_is_skipped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PREAMBLE);
        write_u32(&mut bytes, FORMAT_VERSION).unwrap();
        // Header: unknown non-critical field_id = 7, len = 16, random payload.
        write_u32(&mut bytes, 7).unwrap();
        write_u32(&mut bytes, 16).unwrap();
        bytes.extend_from_slice(&[0xAB; 16]);
        write_u32(&mut bytes, HEADER_FIELD_KEY_NAME).unwrap();
        write_u32(&mut bytes, 4).unwrap();
        bytes.extend_from_slice(b"prod");
        write_u32(&mut bytes, HEADER_FIELD_END).unwrap();
        // No entries follow: the stream simply ends here (EOF).

        let parsed = parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.name(), "prod");
        assert_eq!(parsed.entries().len(), 0);
    }

    #[test]
    fn oversized_skip_length_is_malformed() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PREAMBLE);
        write_u32(&mut bytes, FORMAT_VERSION).unwrap();
        write_u32(&mut bytes, 7).unwrap();
        write_u32(&mut bytes, (1 << 20) + 1).unwrap();
        // No need to supply the (huge) payload: length check fails first.

        let result = parse(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(KeyfileError::Malformed(_))));
    }

    #[test]
    fn missing_sentinel_is_malformed() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PREAMBLE);
        write_u32(&mut bytes, FORMAT_VERSION).unwrap();
        write_u32(&mut bytes, HEADER_FIELD_KEY_NAME).unwrap();
        write_u32(&mut bytes, 4).unwrap();
        bytes.extend_from_slice(b"prod");
        // header never terminated with field_id == 0: abrupt EOF.

        let result = parse(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(KeyfileError::Malformed(_))));
    }

    #[test]
    fn bad_preamble_is_malformed() {
        let bytes = vec![0u8; 40];
        let result = parse(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(KeyfileError::Malformed(_))));
    }

    #[test]
    fn wrong_format_version_is_incompatible() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&PREAMBLE);
        write_u32(&mut bytes, 3).unwrap();
        let result = parse(&mut Cursor::new(bytes));
        assert!(matches!(result, Err(KeyfileError::Incompatible(_))));
    }
}

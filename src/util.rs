//! Byte-order and constant-time comparison utilities shared by the keyfile
//! codec and the file cipher driver.

use subtle::ConstantTimeEq;

/// Write `value` to `out[0..4]` as big-endian.
///
/// # Panics
///
/// Panics if `out` is shorter than 4 bytes.
pub fn write_u32_be(out: &mut [u8], value: u32) {
    out[0..4].copy_from_slice(&value.to_be_bytes());
}

/// Read a big-endian `u32` from `bytes[0..4]`.
///
/// # Panics
///
/// Panics if `bytes` is shorter than 4 bytes.
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[0..4]);
    u32::from_be_bytes(buf)
}

/// Compare two equal-length byte slices in constant time.
///
/// The result depends only on whether the slices are equal, never on the
/// position of the first differing byte. Slices of differing length are
/// always unequal (this length check is not itself required to be
/// constant-time: lengths are not secret in this crate's protocols).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

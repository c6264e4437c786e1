//! HMAC-SHA1 accumulator.
//!
//! Standard HMAC-SHA1 over a 64-byte key, exposed as a streaming
//! accumulator: [`write`](HmacSha1::write) any number of times, then
//! [`finalize`](HmacSha1::finalize) once to get the 20-byte MAC.
//!
//! Built on `ring::hmac`, using the legacy SHA-1 algorithm constant, since
//! this format predates HMAC-SHA256 and compatibility requires SHA-1 here.

use ring::hmac;

/// HMAC-SHA1 output size in bytes.
pub const MAC_SIZE: usize = 20;

/// A streaming HMAC-SHA1 accumulator over a 64-byte key.
pub struct HmacSha1 {
    context: hmac::Context,
}

impl HmacSha1 {
    /// Start a new accumulator keyed with `hmac_key` (the caller never
    /// truncates or pads the key; HMAC's key-handling takes care of that).
    pub fn new(hmac_key: &[u8]) -> Self {
        let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, hmac_key);
        HmacSha1 {
            context: hmac::Context::with_key(&key),
        }
    }

    /// Feed more bytes into the accumulator.
    pub fn write(&mut self, bytes: &[u8]) {
        self.context.update(bytes);
    }

    /// Consume the accumulator and return the 20-byte MAC.
    pub fn finalize(self) -> [u8; MAC_SIZE] {
        let tag = self.context.sign();
        let mut out = [0u8; MAC_SIZE];
        out.copy_from_slice(tag.as_ref());
        out
    }
}

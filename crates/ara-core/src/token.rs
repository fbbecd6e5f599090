//! Edit and consult tokens.

use rand_core::{OsRng, RngCore};

const TOKEN_BYTES: usize = 16;

/// A fresh 128-bit random token, hex-encoded.
pub fn generate() -> String {
  let mut bytes = [0u8; TOKEN_BYTES];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}

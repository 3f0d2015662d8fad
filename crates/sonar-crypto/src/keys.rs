use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand_core::{OsRng, RngCore};

/// Random bytes behind every token key.
pub const TOKEN_KEY_BYTES: usize = 32;

/// Generate a fresh auth token key.
/// 256 bits from the OS RNG, URL-safe base64 so it fits in a header unescaped.
pub fn generate_token_key() -> String {
    let mut key = [0u8; TOKEN_KEY_BYTES];
    OsRng.fill_bytes(&mut key);
    URL_SAFE_NO_PAD.encode(key)
}

//! HMAC-SHA256 body integrity.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the HMAC-SHA256 of `data` under `key`, lowercase hex encoded.
///
/// An empty key is valid and produces a deterministic digest.
pub fn compute(data: &[u8], key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a received hex digest against `data` in constant time.
///
/// Returns `false` for malformed hex as well as for a mismatch.
pub fn verify(data: &[u8], key: &str, received_hex: &str) -> bool {
    let Ok(received) = hex::decode(received_hex) else {
        return false;
    };

    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.verify_slice(&received).is_ok()
}

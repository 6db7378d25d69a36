//! Digest, MAC and base64 primitives used for request signing.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Length in bytes of a SHA-1 digest and an HMAC-SHA1 tag.
pub const DIGEST_LEN: usize = 20;

/// Plain SHA-1 digest of `bytes`.
pub fn sha1_digest(bytes: &[u8]) -> [u8; DIGEST_LEN] {
    Sha1::digest(bytes).into()
}

/// HMAC-SHA1 of `message` under `key`.
pub fn hmac_sha1(key: &[u8], message: &[u8]) -> Result<[u8; DIGEST_LEN]> {
    let mut mac = HmacSha1::new_from_slice(key)
        .map_err(|e| Error::protocol(format!("invalid HMAC key: {}", e)))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Standard base64 with padding and no line breaks.
pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64, ignoring any ASCII whitespace in the input.
pub fn b64_decode(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::protocol(format!("invalid base64: {}", e)))
}

/// Base64 SHA-1 digest, as carried in `<info-hash>`.
pub fn b64_sha1(bytes: &[u8]) -> String {
    b64_encode(&sha1_digest(bytes))
}

/// Base64 HMAC-SHA1, as carried in `<auth>` and `<hmacSig>`.
pub fn b64_hmac_sha1(key: &[u8], message: &[u8]) -> Result<String> {
    Ok(b64_encode(&hmac_sha1(key, message)?))
}

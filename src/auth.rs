//! Identity provider: HMAC-SHA256 signed bearer tokens.
//!
//! Token format: `<user_id>.<hex(hmac_sha256(secret, user_id))>`. The core
//! only needs "a call returns a user identity or indicates absence of one";
//! a missing or invalid token is absence.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

/// Sign a user id into a bearer token.
pub fn issue_token(secret: &[u8], user_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(user_id.as_bytes());
    let tag = mac.finalize().into_bytes();
    format!("{}.{}", user_id, hex::encode(tag))
}

/// Verify a bearer token. Returns the identity, or `None` for malformed or
/// tampered tokens.
pub fn verify_token(secret: &[u8], token: &str) -> Option<Identity> {
    let (user_id, sig_hex) = token.rsplit_once('.')?;
    if user_id.is_empty() {
        return None;
    }
    let sig = hex::decode(sig_hex).ok()?;

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(user_id.as_bytes());
    mac.verify_slice(&sig).ok()?;

    Some(Identity {
        user_id: user_id.to_string(),
    })
}

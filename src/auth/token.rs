//! Compact HMAC-signed bearer tokens.
//!
//! Format: `{user_id}.{role}.{expires_unix}.{hex_sig}` where the signature
//! covers everything before it. Token issuance belongs to the login flow of
//! the surrounding product; this module only needs to mint them for tests
//! and verify them on every request.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::{Identity, Role};

type HmacSha256 = Hmac<Sha256>;

/// Secret used to sign and verify bearer tokens. Injected through app state
/// so tests can run with a throwaway key.
#[derive(Clone)]
pub struct TokenKey(pub String);

#[derive(Debug, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

fn sign(key: &TokenKey, payload: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.0.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Mint a token for `user_id` with the given role, valid for `ttl_secs`.
pub fn issue(key: &TokenKey, user_id: i64, role: Role, ttl_secs: i64) -> String {
    let expires = time::OffsetDateTime::now_utc().unix_timestamp() + ttl_secs;
    let payload = format!("{user_id}.{role}.{expires}");
    let sig = sign(key, &payload);
    format!("{payload}.{sig}")
}

/// Validate signature and expiry, yielding the caller's identity.
pub fn verify(key: &TokenKey, token: &str) -> Result<Identity, TokenError> {
    let (payload, sig) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;

    // Mac::verify_slice is constant-time, unlike a string compare.
    let mut mac = HmacSha256::new_from_slice(key.0.as_bytes()).expect("hmac accepts any key length");
    mac.update(payload.as_bytes());
    let sig_bytes = hex::decode(sig).map_err(|_| TokenError::BadSignature)?;
    if mac.verify_slice(&sig_bytes).is_err() {
        return Err(TokenError::BadSignature);
    }

    let mut parts = payload.split('.');
    let user_id: i64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(TokenError::Malformed)?;
    let role: Role = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(TokenError::Malformed)?;
    let expires: i64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or(TokenError::Malformed)?;
    if parts.next().is_some() {
        return Err(TokenError::Malformed);
    }

    if time::OffsetDateTime::now_utc().unix_timestamp() >= expires {
        return Err(TokenError::Expired);
    }

    Ok(Identity { user_id, role })
}

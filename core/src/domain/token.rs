//! HMAC-SHA1 capability tokens (§4.4/§6).
//!
//! `<base64(HMAC-SHA1(pfn ⟂ userId ⟂ expiry ⟂ write, secret))>@<expiry>@<writeFlag>`,
//! where `⟂` is the literal `0x1D` byte. Verification recomputes the HMAC
//! and compares in constant time via `subtle`, matching the teacher's
//! already-present `subtle` dependency (there pulled in for an RSA/JWT
//! verifier; reused here for its actual purpose in this codebase).

use crate::domain::errors::TokenError;
use crate::domain::value::{Value, ValueMap};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

const FIELD_SEP: u8 = 0x1D;

/// Default lifetime for a capability token issued by `whereToRead`/
/// `whereToWrite` (§4.5); long enough to cover opening and streaming a
/// single pfn, short enough that a leaked token doesn't linger.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 300;

/// Reserved subject for disk-to-disk tunnelling (§4.4, §SUPPLEMENTED 5):
/// accepted by `validate_token` regardless of the configured `TokenId` mode.
pub const TUNNEL_ROOT: &str = "root";
pub const TUNNEL_GENERIC: &str = "generic";

pub fn is_tunnel_subject(user_id: &str) -> bool {
    user_id == TUNNEL_ROOT || user_id == TUNNEL_GENERIC
}

fn mac_input(pfn: &str, user_id: &str, expiry: i64, write: bool) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(pfn.as_bytes());
    buf.push(FIELD_SEP);
    buf.extend_from_slice(user_id.as_bytes());
    buf.push(FIELD_SEP);
    buf.extend_from_slice(expiry.to_string().as_bytes());
    buf.push(FIELD_SEP);
    buf.extend_from_slice(if write { b"1" } else { b"0" });
    buf
}

fn sign(pfn: &str, user_id: &str, expiry: i64, write: bool, secret: &[u8]) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(&mac_input(pfn, user_id, expiry, write));
    let tag = mac.finalize().into_bytes();
    base64::engine::general_purpose::STANDARD.encode(tag)
}

/// §4.4 `generateToken`.
pub fn generate_token(user_id: &str, pfn: &str, secret: &[u8], ttl_secs: i64, write: bool, now: i64) -> String {
    let expiry = now + ttl_secs;
    let sig = sign(pfn, user_id, expiry, write, secret);
    format!("{sig}@{expiry}@{}", if write { 1 } else { 0 })
}

/// Issues a `DEFAULT_TOKEN_TTL_SECS` capability token for `pfn` and packs it
/// into a `Chunk.extra`-shaped map under `"token"`/`"user_id"`, the keys
/// `validate_token`'s callers read back out (§4.5's issue-then-verify loop).
pub fn issue_token_extra(user_id: &str, pfn: &str, secret: &[u8], write: bool, now: i64) -> ValueMap {
    let tok = generate_token(user_id, pfn, secret, DEFAULT_TOKEN_TTL_SECS, write, now);
    let mut extra = ValueMap::new();
    extra.insert("token".to_owned(), Value::Str(tok));
    extra.insert("user_id".to_owned(), Value::Str(user_id.to_owned()));
    extra
}

/// §4.4 `validateToken`. `now` is passed in rather than read from the
/// system clock so the expiry boundary is testable (scenario 5).
pub fn validate_token(
    token: &str,
    user_id: &str,
    pfn: &str,
    secret: &[u8],
    want_write: bool,
    now: i64,
) -> Result<(), TokenError> {
    let mut parts = token.rsplitn(3, '@');
    let write_flag_str = parts.next().ok_or_else(|| TokenError::Malformed(token.into()))?;
    let expiry_str = parts.next().ok_or_else(|| TokenError::Malformed(token.into()))?;
    let sig = parts.next().ok_or_else(|| TokenError::Malformed(token.into()))?;

    let expiry: i64 = expiry_str
        .parse()
        .map_err(|_| TokenError::Malformed(format!("bad expiry in {token:?}")))?;
    let write_flag = match write_flag_str {
        "1" => true,
        "0" => false,
        _ => return Err(TokenError::Malformed(format!("bad write flag in {token:?}"))),
    };

    let expected = sign(pfn, user_id, expiry, write_flag, secret);
    let sig_matches: bool = bool::from(expected.as_bytes().ct_eq(sig.as_bytes()));
    if !sig_matches {
        return Err(TokenError::InvalidSignature);
    }
    if expiry <= now {
        return Err(TokenError::Expired);
    }
    if (write_flag as u8) < (want_write as u8) {
        return Err(TokenError::WrongMode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_token_round_trips() {
        let secret = b"shared-secret";
        let tok = generate_token("alice", "/pfn/x", secret, 60, false, 1_000);
        assert!(validate_token(&tok, "alice", "/pfn/x", secret, false, 1_030).is_ok());
    }

    #[test]
    fn scenario_5_token_expiry() {
        let secret = b"secret";
        let tok = generate_token("alice", "/pfn/x", secret, 1, false, 1_000);
        let err = validate_token(&tok, "alice", "/pfn/x", secret, false, 1_002).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
    }

    #[test]
    fn wrong_user_or_pfn_rejected() {
        let secret = b"secret";
        let tok = generate_token("alice", "/pfn/x", secret, 60, false, 1_000);
        assert!(validate_token(&tok, "bob", "/pfn/x", secret, false, 1_010).is_err());
        assert!(validate_token(&tok, "alice", "/pfn/y", secret, false, 1_010).is_err());
    }

    #[test]
    fn write_token_satisfies_read_request_but_not_vice_versa() {
        let secret = b"secret";
        let write_tok = generate_token("alice", "/pfn/x", secret, 60, true, 1_000);
        assert!(validate_token(&write_tok, "alice", "/pfn/x", secret, false, 1_010).is_ok());
        assert!(validate_token(&write_tok, "alice", "/pfn/x", secret, true, 1_010).is_ok());

        let read_tok = generate_token("alice", "/pfn/x", secret, 60, false, 1_000);
        assert!(validate_token(&read_tok, "alice", "/pfn/x", secret, true, 1_010).is_err());
    }

    #[test]
    fn tunnel_subjects_recognised() {
        assert!(is_tunnel_subject("root"));
        assert!(is_tunnel_subject("generic"));
        assert!(!is_tunnel_subject("alice"));
    }
}

//! Stateless signed session tokens and the cookies that carry them.
//!
//! A token is `base64(user_id|username|role|expires_unix|base64(hmac))` where the
//! HMAC-SHA256 covers the first four fields. Nothing is stored server side: a token
//! stays valid until it expires, and logout only clears the client's cookie.

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use cookie::{time::OffsetDateTime, Cookie, SameSite};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "glou_session";
pub const CSRF_COOKIE: &str = "glou_csrf";
pub const CSRF_HEADER: &str = "x-csrf-token";

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// Session and CSRF cookie lifetime.
pub const SESSION_TTL_DAYS: i64 = 7;

const DELIMITER: char = '|';

/// Decoded fields of a valid session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: i64,
    pub username: String,
    pub role: String,
}

/// Issues and verifies session tokens with a server-held secret.
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
}

impl SessionCodec {
    pub fn new(secret: &[u8]) -> anyhow::Result<Self> {
        if secret.is_empty() {
            anyhow::bail!("session secret must not be empty");
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow::anyhow!("invalid session secret: {}", e))?;
        Ok(Self { mac })
    }

    /// Builds a codec from the configured secret, or from a random per-process
    /// secret when none is configured (development only; validated in `config`).
    pub fn from_config_secret(secret: &str) -> anyhow::Result<Self> {
        if secret.is_empty() {
            tracing::warn!(
                "No security.session_secret configured: using a random secret, sessions will not survive a restart"
            );
            let mut random = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut random);
            return Self::new(&random);
        }
        Self::new(secret.as_bytes())
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    pub fn issue(&self, user_id: i64, username: &str, role: &str, expires_at: DateTime<Utc>) -> String {
        let payload = format!("{user_id}|{username}|{role}|{}", expires_at.timestamp());
        let signature = STANDARD.encode(self.sign(&payload));
        STANDARD.encode(format!("{payload}{DELIMITER}{signature}"))
    }

    /// Issues a token with the standard lifetime. An empty role becomes `user`.
    pub fn issue_default(&self, user_id: i64, username: &str, role: &str) -> String {
        let role = if role.is_empty() { ROLE_USER } else { role };
        self.issue(user_id, username, role, Utc::now() + Duration::days(SESSION_TTL_DAYS))
    }

    /// Verifies signature and expiry. Every failure yields `None`, whatever the cause.
    pub fn validate(&self, token: &str) -> Option<SessionClaims> {
        self.validate_at(token, Utc::now().timestamp())
    }

    fn validate_at(&self, token: &str, now_unix: i64) -> Option<SessionClaims> {
        let raw = STANDARD.decode(token).ok()?;
        let raw = String::from_utf8(raw).ok()?;
        let parts: Vec<&str> = raw.split(DELIMITER).collect();
        if parts.len() != 5 {
            return None;
        }

        let expected = self.sign(&parts[..4].join("|"));
        let provided = STANDARD.decode(parts[4]).ok()?;
        if !bool::from(expected.ct_eq(&provided)) {
            return None;
        }

        let expires_at: i64 = parts[3].parse().ok()?;
        if now_unix > expires_at {
            return None;
        }
        let user_id: i64 = parts[0].parse().ok()?;

        Some(SessionClaims { user_id, username: parts[1].to_string(), role: parts[2].to_string() })
    }
}

fn base_cookie(name: &'static str, value: String, http_only: bool, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(http_only)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(cookie::time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

fn removal_cookie(name: &'static str, http_only: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(http_only)
        .same_site(SameSite::Strict)
        .max_age(cookie::time::Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    base_cookie(SESSION_COOKIE, token, true, secure)
}

pub fn clear_session_cookie() -> Cookie<'static> {
    removal_cookie(SESSION_COOKIE, true)
}

/// The CSRF cookie must stay readable by client script, which echoes it in `X-CSRF-Token`.
pub fn csrf_cookie(value: String, secure: bool) -> Cookie<'static> {
    base_cookie(CSRF_COOKIE, value, false, secure)
}

pub fn clear_csrf_cookie() -> Cookie<'static> {
    removal_cookie(CSRF_COOKIE, false)
}

/// 32 random bytes, hex encoded.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn new_csrf_token() -> String {
    random_token()
}

/// Looks up a cookie value across all `Cookie` request headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|hv| hv.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn codec() -> SessionCodec {
        SessionCodec::new(b"0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn test_round_trip() {
        let codec = codec();
        let token = codec.issue(42, "alice", ROLE_ADMIN, Utc::now() + Duration::hours(1));
        let claims = codec.validate(&token).unwrap();
        assert_eq!(
            claims,
            SessionClaims { user_id: 42, username: "alice".to_string(), role: "admin".to_string() }
        );
    }

    #[test]
    fn test_round_trip_various_inputs() {
        let codec = codec();
        for (uid, name, role) in [(1, "bob", "user"), (-7, "j-doe_2", "admin"), (i64::MAX, "x", "user")] {
            let token = codec.issue(uid, name, role, Utc::now() + Duration::days(1));
            let claims = codec.validate(&token).unwrap();
            assert_eq!((claims.user_id, claims.username.as_str(), claims.role.as_str()), (uid, name, role));
        }
    }

    #[test]
    fn test_issue_default_role() {
        let codec = codec();
        let token = codec.issue_default(3, "carol", "");
        assert_eq!(codec.validate(&token).unwrap().role, ROLE_USER);
    }

    #[test]
    fn test_tampered_bytes_rejected() {
        let codec = codec();
        let token = codec.issue(42, "alice", ROLE_ADMIN, Utc::now() + Duration::hours(1));
        let raw = STANDARD.decode(&token).unwrap();
        for i in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            let forged = STANDARD.encode(&tampered);
            assert!(codec.validate(&forged).is_none(), "byte {} flip accepted", i);
        }
    }

    #[test]
    fn test_role_escalation_rejected() {
        let codec = codec();
        let token = codec.issue(5, "mallory", ROLE_USER, Utc::now() + Duration::hours(1));
        let raw = String::from_utf8(STANDARD.decode(&token).unwrap()).unwrap();
        let forged = STANDARD.encode(raw.replacen("|user|", "|admin|", 1));
        assert!(codec.validate(&forged).is_none());
    }

    #[test]
    fn test_expired_rejected() {
        let codec = codec();
        let token = codec.issue(42, "alice", ROLE_ADMIN, Utc::now() - Duration::seconds(1));
        assert!(codec.validate(&token).is_none());
    }

    #[test]
    fn test_expiry_boundary() {
        let codec = codec();
        let exp = Utc::now() + Duration::hours(1);
        let token = codec.issue(1, "a", ROLE_USER, exp);
        assert!(codec.validate_at(&token, exp.timestamp()).is_some());
        assert!(codec.validate_at(&token, exp.timestamp() + 1).is_none());
    }

    #[test]
    fn test_malformed_rejected() {
        let codec = codec();
        assert!(codec.validate("").is_none());
        assert!(codec.validate("not base64 !!!").is_none());
        assert!(codec.validate(&STANDARD.encode("1|a|user|9999999999")).is_none());
        assert!(codec.validate(&STANDARD.encode("1|a|b|user|9999999999|sig")).is_none());
    }

    #[test]
    fn test_delimiter_in_username_fails_closed() {
        let codec = codec();
        let token = codec.issue(1, "a|b", ROLE_USER, Utc::now() + Duration::hours(1));
        assert!(codec.validate(&token).is_none());
    }

    #[test]
    fn test_non_numeric_user_id_rejected() {
        let codec = codec();
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let payload = format!("abc|alice|admin|{}", exp);
        let sig = STANDARD.encode(codec.sign(&payload));
        let token = STANDARD.encode(format!("{}|{}", payload, sig));
        assert!(codec.validate(&token).is_none());
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = codec().issue(42, "alice", ROLE_ADMIN, Utc::now() + Duration::hours(1));
        let other = SessionCodec::new(b"another-secret-another-secret-00").unwrap();
        assert!(other.validate(&token).is_none());
    }

    /// There is no server-side revocation: a token captured before logout keeps
    /// validating until it expires.
    #[test]
    fn test_logout_does_not_revoke_token() {
        let codec = codec();
        let token = codec.issue_default(42, "alice", ROLE_ADMIN);
        let _logout = clear_session_cookie();
        assert!(codec.validate(&token).is_some());
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(SessionCodec::new(b"").is_err());
    }

    #[test]
    fn test_cookie_attributes() {
        let session = session_cookie("tok".to_string(), true).to_string();
        assert!(session.starts_with("glou_session=tok"));
        assert!(session.contains("HttpOnly"));
        assert!(session.contains("SameSite=Strict"));
        assert!(session.contains("Secure"));
        assert!(session.contains("Path=/"));
        assert!(session.contains("Max-Age=604800"));

        let csrf = csrf_cookie("abc".to_string(), false).to_string();
        assert!(csrf.starts_with("glou_csrf=abc"));
        assert!(!csrf.contains("HttpOnly"));
        assert!(!csrf.contains("Secure"));

        let cleared = clear_session_cookie().to_string();
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; glou_csrf=xyz"));
        headers.append(header::COOKIE, HeaderValue::from_static("glou_session=tok=="));
        assert_eq!(read_cookie(&headers, CSRF_COOKIE).as_deref(), Some("xyz"));
        assert_eq!(read_cookie(&headers, SESSION_COOKIE).as_deref(), Some("tok=="));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_csrf_token_shape() {
        let a = new_csrf_token();
        let b = new_csrf_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hex::decode(&a).unwrap().len(), 32);
        assert_ne!(a, b);
    }
}

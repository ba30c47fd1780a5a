//! OKX WebSocket Authentication
//!
//! Private channels require a `login` command before subscribing.
//!
//! # Signature
//!
//! ```text
//! prehash = timestamp + "GET" + "/users/self/verify" + ""
//! sign    = base64(HMAC-SHA256(secret_key, prehash))
//! ```
//!
//! `timestamp` is Unix time in seconds. The server answers with a `login`
//! event asynchronously; the login command itself only fails if it cannot
//! be signed or written.
//!
//! # References
//!
//! - [Login](https://www.okx.com/docs-v5/en/#overview-websocket-login)

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::messages::{LoginArg, LoginRequest};
use crate::application::ports::SendError;

// =============================================================================
// Constants
// =============================================================================

/// HTTP verb bound into the login signature.
pub const LOGIN_METHOD: &str = "GET";

/// Request path bound into the login signature.
pub const LOGIN_PATH: &str = "/users/self/verify";

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credentials are incomplete.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Signature could not be computed.
    #[error("failed to sign login request: {0}")]
    Signing(String),

    /// Login command could not be written.
    #[error("failed to send login request: {0}")]
    Send(#[from] SendError),
}

// =============================================================================
// Credentials
// =============================================================================

/// OKX API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
    passphrase: String,
}

impl Credentials {
    /// Create new credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if any field is empty.
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let api_key = api_key.into();
        let secret_key = secret_key.into();
        let passphrase = passphrase.into();

        if api_key.is_empty() {
            return Err(AuthError::InvalidCredentials("API key is empty".to_string()));
        }
        if secret_key.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "secret key is empty".to_string(),
            ));
        }
        if passphrase.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "passphrase is empty".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            secret_key,
            passphrase,
        })
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Get the passphrase.
    #[must_use]
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Sign `timestamp + METHOD + path + body` with the secret key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if the MAC cannot be keyed.
    pub fn sign(
        &self,
        timestamp: &str,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        mac.update(pre_hash(timestamp, method, path, body).as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Build the login command for `timestamp` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Signing`] if the signature cannot be computed.
    pub fn login_request(&self, timestamp: &str) -> Result<LoginRequest, AuthError> {
        let sign = self.sign(timestamp, LOGIN_METHOD, LOGIN_PATH, "")?;
        Ok(LoginRequest::new(LoginArg {
            api_key: self.api_key.clone(),
            passphrase: self.passphrase.clone(),
            timestamp: timestamp.to_string(),
            sign,
        }))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &redact(&self.api_key))
            .field("secret_key", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{prefix}...")
}

/// Canonical string the signature covers.
#[must_use]
pub fn pre_hash(timestamp: &str, method: &str, path: &str, body: &str) -> String {
    format!("{timestamp}{}{path}{body}", method.to_uppercase())
}

/// Current Unix time in seconds, as sent in the login command.
#[must_use]
pub fn login_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials::new("985d5b66-57ce-40fb", "secret", "passphrase").unwrap()
    }

    #[test]
    fn credentials_reject_empty_fields() {
        assert!(Credentials::new("", "s", "p").is_err());
        assert!(Credentials::new("k", "", "p").is_err());
        assert!(Credentials::new("k", "s", "").is_err());
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let debug = format!("{:?}", credentials());
        assert!(debug.contains("985d..."));
        assert!(!debug.contains("secret\""));
        assert!(!debug.contains("passphrase\""));
    }

    #[test]
    fn pre_hash_uppercases_method() {
        assert_eq!(
            pre_hash("1538054050", "get", LOGIN_PATH, ""),
            "1538054050GET/users/self/verify"
        );
    }

    #[test]
    fn sign_matches_reference_hmac() {
        let creds = Credentials::new("k", "key", "p").unwrap();
        let reference = creds
            .sign("", "", "The quick brown fox jumps over the lazy dog", "")
            .unwrap();
        assert_eq!(reference, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn sign_login_prehash() {
        let sign = credentials()
            .sign("1538054050", LOGIN_METHOD, LOGIN_PATH, "")
            .unwrap();
        assert_eq!(sign, "Gj2hQIVKFcXbiwCak8SmVOu5mxPCizWDdmUAhbx8Z+s=");
    }

    #[test]
    fn login_request_carries_signature() {
        let creds = credentials();
        let request = creds.login_request("1538054050").unwrap();
        assert_eq!(request.op, "login");
        let arg = &request.args[0];
        assert_eq!(arg.api_key, "985d5b66-57ce-40fb");
        assert_eq!(arg.timestamp, "1538054050");
        assert_eq!(
            arg.sign,
            creds.sign("1538054050", "GET", LOGIN_PATH, "").unwrap()
        );
    }

    #[test]
    fn login_timestamp_is_unix_seconds() {
        let ts: i64 = login_timestamp().parse().unwrap();
        assert!(ts > 1_600_000_000 && ts < 100_000_000_000);
    }
}

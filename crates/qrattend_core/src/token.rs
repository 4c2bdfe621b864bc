//! Signed, time-bound QR tokens.
//!
//! # Responsibility
//! - Issue `"<user_id>:<issued_at>:<hex_hmac_sha256>"` tokens for a user.
//! - Verify scanned tokens against a secret and a tolerance window.
//!
//! # Invariants
//! - Tokens are stateless; nothing is persisted on issue or verify.
//! - Signatures are compared in constant time.
//! - Every verification failure collapses to `None`; callers cannot tell a
//!   malformed token from an expired or forged one.
//! - Only the age upper bound is enforced. A token stamped in the future is
//!   accepted as long as its signature holds.

use crate::model::user::UserId;
use hmac::{Hmac, Mac};
use log::debug;
use sha2::Sha256;
use std::error::Error;
use std::fmt::{Display, Formatter};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const FIELD_SEPARATOR: char = ':';
/// Hex length of an HMAC-SHA-256 digest.
pub const SIGNATURE_HEX_LEN: usize = 64;
pub const DEFAULT_EXPIRATION_SECS: u64 = 60;
pub const DEFAULT_TOLERANCE_SECS: u64 = 60;

/// Input errors raised while issuing a token or building a signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    InvalidUserId(UserId),
    EmptySecret,
    NonPositiveWindow { name: &'static str },
    /// The MAC backend refused the key.
    Key(String),
}

impl Display for TokenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUserId(value) => {
                write!(f, "user id must be a positive integer, got {value}")
            }
            Self::EmptySecret => write!(f, "token secret key must not be empty"),
            Self::NonPositiveWindow { name } => {
                write!(f, "{name} must be a positive number of seconds")
            }
            Self::Key(reason) => write!(f, "token secret key rejected: {reason}"),
        }
    }
}

impl Error for TokenError {}

/// Structured view of a token's three wire fields.
///
/// Parsing checks shape only; it says nothing about signature or age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrToken {
    pub user_id: UserId,
    pub issued_at: i64,
    pub signature: String,
}

impl QrToken {
    /// Splits a wire token into fields.
    ///
    /// Returns `None` unless there are exactly three fields, the id is a
    /// positive integer and the timestamp is an integer.
    pub fn parse(token: &str) -> Option<Self> {
        let (user_field, issued_field, signature) = split_fields(token)?;
        let issued_at = issued_field.parse::<i64>().ok()?;
        let user_id = parse_user_id(user_field)?;
        Some(Self {
            user_id,
            issued_at,
            signature: signature.to_string(),
        })
    }
}

impl Display for QrToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.user_id, self.issued_at, self.signature)
    }
}

/// Issues a signed token for `user_id` stamped with `now` (unix seconds).
pub fn issue(user_id: UserId, secret_key: &str, now: i64) -> Result<String, TokenError> {
    if user_id <= 0 {
        return Err(TokenError::InvalidUserId(user_id));
    }
    if secret_key.trim().is_empty() {
        return Err(TokenError::EmptySecret);
    }

    let payload = format!("{user_id}{FIELD_SEPARATOR}{now}");
    let signature = sign(secret_key, &payload)?;
    Ok(format!("{payload}{FIELD_SEPARATOR}{signature}"))
}

/// Verifies a scanned token and returns the embedded user id.
///
/// A token is accepted when it has three fields, an integer timestamp no
/// older than `tolerance_secs` relative to `now`, a signature matching
/// `secret_key`, and a positive integer user id.
pub fn verify(token: &str, secret_key: &str, tolerance_secs: u64, now: i64) -> Option<UserId> {
    let Some((user_field, issued_field, signature)) = split_fields(token) else {
        debug!("event=token_verify module=token status=rejected reason=malformed");
        return None;
    };
    let Ok(issued_at) = issued_field.parse::<i64>() else {
        debug!("event=token_verify module=token status=rejected reason=malformed");
        return None;
    };

    let tolerance = i64::try_from(tolerance_secs).unwrap_or(i64::MAX);
    if now.saturating_sub(issued_at) > tolerance {
        debug!("event=token_verify module=token status=rejected reason=expired");
        return None;
    }

    if secret_key.trim().is_empty() {
        debug!("event=token_verify module=token status=rejected reason=empty_secret");
        return None;
    }

    let Ok(expected) = sign(
        secret_key,
        &format!("{user_field}{FIELD_SEPARATOR}{issued_field}"),
    ) else {
        debug!("event=token_verify module=token status=rejected reason=key");
        return None;
    };
    if !signatures_match(&expected, signature) {
        debug!("event=token_verify module=token status=rejected reason=signature");
        return None;
    }

    let user_id = parse_user_id(user_field);
    if user_id.is_none() {
        debug!("event=token_verify module=token status=rejected reason=user_id");
    }
    user_id
}

/// Validated signing configuration: secret plus issue/verify windows.
///
/// `expiration` is the freshness interval advertised to whoever displays
/// the code; `tolerance` is the maximum age accepted on scan.
#[derive(Clone)]
pub struct TokenSigner {
    secret_key: String,
    expiration_secs: u64,
    tolerance_secs: u64,
}

impl TokenSigner {
    pub fn new(
        secret_key: impl Into<String>,
        expiration_secs: u64,
        tolerance_secs: u64,
    ) -> Result<Self, TokenError> {
        let secret_key = secret_key.into();
        if secret_key.trim().is_empty() {
            return Err(TokenError::EmptySecret);
        }
        if expiration_secs == 0 {
            return Err(TokenError::NonPositiveWindow { name: "expiration" });
        }
        if tolerance_secs == 0 {
            return Err(TokenError::NonPositiveWindow { name: "tolerance" });
        }
        Ok(Self {
            secret_key,
            expiration_secs,
            tolerance_secs,
        })
    }

    /// Signer with default windows.
    pub fn with_secret(secret_key: impl Into<String>) -> Result<Self, TokenError> {
        Self::new(secret_key, DEFAULT_EXPIRATION_SECS, DEFAULT_TOLERANCE_SECS)
    }

    pub fn expiration_secs(&self) -> u64 {
        self.expiration_secs
    }

    pub fn tolerance_secs(&self) -> u64 {
        self.tolerance_secs
    }

    pub fn issue(&self, user_id: UserId, now: i64) -> Result<String, TokenError> {
        issue(user_id, &self.secret_key, now)
    }

    pub fn verify(&self, token: &str, now: i64) -> Option<UserId> {
        verify(token, &self.secret_key, self.tolerance_secs, now)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret_key", &"<redacted>")
            .field("expiration_secs", &self.expiration_secs)
            .field("tolerance_secs", &self.tolerance_secs)
            .finish()
    }
}

fn split_fields(token: &str) -> Option<(&str, &str, &str)> {
    let mut parts = token.split(FIELD_SEPARATOR);
    let user_field = parts.next()?;
    let issued_field = parts.next()?;
    let signature = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((user_field, issued_field, signature))
}

fn parse_user_id(value: &str) -> Option<UserId> {
    value.parse::<UserId>().ok().filter(|id| *id > 0)
}

fn sign(secret_key: &str, payload: &str) -> Result<String, TokenError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret_key.as_bytes())
        .map_err(|err| TokenError::Key(err.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn signatures_match(expected: &str, supplied: &str) -> bool {
    if expected.len() != supplied.len() {
        return false;
    }
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

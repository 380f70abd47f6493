/// Access and refresh token rules
///
/// Every validation runs the same checks in the same order and stops at
/// the first failure: type, then expiry, then subject format. A wrong-type
/// token therefore reports `TypeMismatch` even when it is also expired.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::auth::claims::{ParsedToken, TokenType};
use crate::auth::codec::TokenCodec;
use crate::error::TokenError;

/// Access token lifetime: 6 hours
pub const ACCESS_TOKEN_TTL_SECS: i64 = 6 * 60 * 60;

/// Refresh token lifetime: 120 days
pub const REFRESH_TOKEN_TTL_SECS: i64 = 120 * 24 * 60 * 60;

/// Token operations used by the handlers and the session middleware.
pub trait TokenService: Send + Sync {
    /// Sign a refresh token for `user_id`, which must be a valid UUID.
    fn create_refresh(&self, user_id: &str) -> Result<String, TokenError>;

    /// Mint an access token for the subject of a valid refresh token. The
    /// refresh token stays usable: refresh tokens are multi-use.
    fn create_access(&self, refresh_token: &str) -> Result<String, TokenError>;

    /// Return the subject of a valid access token.
    fn authenticate(&self, access_token: &str) -> Result<Uuid, TokenError>;

    /// Confirm a refresh token is legitimate before consulting the store.
    fn validate_refresh(&self, refresh_token: &str) -> Result<Uuid, TokenError>;
}

/// `TokenService` backed by signed JWTs.
#[derive(Clone)]
pub struct JwtTokenService {
    codec: TokenCodec,
}

impl JwtTokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            codec: TokenCodec::new(secret),
        }
    }

    fn mint(&self, subject: Uuid, token_type: TokenType) -> Result<String, TokenError> {
        let ttl = match token_type {
            TokenType::Access => ACCESS_TOKEN_TTL_SECS,
            TokenType::Refresh => REFRESH_TOKEN_TTL_SECS,
        };
        let now = Utc::now();
        self.codec.sign(subject, token_type, now, now + Duration::seconds(ttl))
    }

    fn validated(&self, token: &str, expected: TokenType) -> Result<Uuid, TokenError> {
        let parsed = self.codec.parse(token)?;
        check(&parsed, expected)
    }
}

/// Policy checks on verified claims, in their required order.
fn check(parsed: &ParsedToken, expected: TokenType) -> Result<Uuid, TokenError> {
    if parsed.token_type() != Some(expected) {
        return Err(TokenError::TypeMismatch);
    }
    if parsed.is_expired_at(Utc::now()) {
        return Err(TokenError::Expired);
    }
    parse_user_id(&parsed.subject)
}

fn parse_user_id(user_id: &str) -> Result<Uuid, TokenError> {
    Uuid::parse_str(user_id).map_err(|_| TokenError::InvalidUserId)
}

impl TokenService for JwtTokenService {
    fn create_refresh(&self, user_id: &str) -> Result<String, TokenError> {
        let subject = parse_user_id(user_id)?;
        self.mint(subject, TokenType::Refresh)
    }

    fn create_access(&self, refresh_token: &str) -> Result<String, TokenError> {
        let subject = self.validated(refresh_token, TokenType::Refresh)?;
        self.mint(subject, TokenType::Access)
    }

    fn authenticate(&self, access_token: &str) -> Result<Uuid, TokenError> {
        self.validated(access_token, TokenType::Access)
    }

    fn validate_refresh(&self, refresh_token: &str) -> Result<Uuid, TokenError> {
        self.validated(refresh_token, TokenType::Refresh)
    }
}

/// JWT Claims structure
///
/// The issuer claim carries the token type, so an access token and a
/// refresh token for the same user differ in `iss` and lifetime only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of token, encoded as the `iss` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }

    pub fn from_issuer(issuer: &str) -> Option<Self> {
        match issuer {
            "access" => Some(TokenType::Access),
            "refresh" => Some(TokenType::Refresh),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire claims of every token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issuer, i.e. the token type
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token ID; two tokens minted in the same second still differ
    #[serde(default)]
    pub jti: String,
}

impl Claims {
    pub fn new(
        subject: Uuid,
        token_type: TokenType,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: subject.to_string(),
            iss: token_type.as_str().to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }
}

/// Claims whose signature has been verified but which have not yet been
/// checked against any policy (type, expiry, subject format).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedToken {
    pub subject: String,
    pub issuer: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl ParsedToken {
    /// `None` when the issuer is not a known token type.
    pub fn token_type(&self) -> Option<TokenType> {
        TokenType::from_issuer(&self.issuer)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.expires_at
    }
}

impl From<Claims> for ParsedToken {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            issuer: claims.iss,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

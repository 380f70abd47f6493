/// Error Handling Module
///
/// Every failure the authentication core can produce, grouped by the layer
/// that raises it:
/// 1. Token errors (codec and token service, pure and side-effect free)
/// 2. Credential store errors (user lookup, refresh token persistence)
/// 3. The unified `AppError` handed to actix-web, also wrapping the input
///    validation errors from `validators`
/// 4. Its HTTP mapping

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

pub use crate::validators::ValidationError;

// ============================================================================
// 1. TOKEN ERRORS
// ============================================================================

/// Errors raised while signing, parsing or validating a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token's declared type is not the one the operation requires.
    TypeMismatch,
    /// The token is past its `exp` instant.
    Expired,
    /// The subject is not a syntactically valid UUID.
    InvalidUserId,
    /// Signature or integrity check failed.
    SignatureInvalid,
    /// Structure could not be decoded or required claims are absent.
    Malformed,
    /// Claims could not be serialized or signed.
    Encoding(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::TypeMismatch => write!(f, "token type is not valid"),
            TokenError::Expired => write!(f, "the token is expired"),
            TokenError::InvalidUserId => write!(f, "user ID is not valid"),
            TokenError::SignatureInvalid => write!(f, "token signature is invalid"),
            TokenError::Malformed => write!(f, "token is malformed"),
            TokenError::Encoding(msg) => write!(f, "token encoding failed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

// ============================================================================
// 2. CREDENTIAL STORE ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Unknown email or password mismatch; the two are indistinguishable.
    InvalidCredentials,
    /// The refresh token is absent from the store or was revoked.
    NotRegistered,
    NotFound(String),
    /// The backing store failed (connection, query, poisoned lock...).
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::InvalidCredentials => write!(f, "email and password do not match"),
            StoreError::NotRegistered => write!(f, "refresh token is not registered"),
            StoreError::NotFound(what) => write!(f, "not found: {}", what),
            StoreError::Storage(msg) => write!(f, "storage failure: {}", msg),
        }
    }
}

impl StdError for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Storage(err.to_string())
    }
}

// ============================================================================
// 3. UNIFIED APPLICATION ERROR TYPE
// ============================================================================

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Token(TokenError),
    Store(StoreError),
    /// Revoke was asked for a refresh token the store does not hold.
    RevokeTargetNotFound,
    /// A handler needed an authenticated session but none was injected.
    Unauthenticated,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::Store(e) => write!(f, "{}", e),
            AppError::RevokeTargetNotFound => write!(f, "refresh token is not registered"),
            AppError::Unauthenticated => write!(f, "no authenticated session"),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

// ============================================================================
// 4. HTTP RESPONSE MAPPING
// ============================================================================

/// Error body returned by every handler failure
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID, also present in the server log line
    pub error_id: String,
    pub message: String,
    /// Stable code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl AppError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Token(e) => match e {
                TokenError::TypeMismatch => "TOKEN_TYPE_MISMATCH",
                TokenError::Expired => "TOKEN_EXPIRED",
                TokenError::InvalidUserId => "INVALID_USER_ID",
                TokenError::SignatureInvalid => "SIGNATURE_INVALID",
                TokenError::Malformed => "MALFORMED_TOKEN",
                TokenError::Encoding(_) => "TOKEN_ENCODING_ERROR",
            },
            AppError::Store(e) => match e {
                StoreError::InvalidCredentials => "INVALID_CREDENTIALS",
                StoreError::NotRegistered => "NOT_REGISTERED",
                StoreError::NotFound(_) => "NOT_FOUND",
                StoreError::Storage(_) => "STORAGE_FAILURE",
            },
            AppError::RevokeTargetNotFound => "NOT_REGISTERED",
            AppError::Unauthenticated => "UNAUTHENTICATED",
        }
    }

    /// Message safe to show to the client. Internal details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AppError::Token(TokenError::Encoding(_))
            | AppError::Store(StoreError::Storage(_)) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    fn log(&self, error_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(error_id = error_id, error = %e, "Validation error");
            }
            AppError::Store(StoreError::InvalidCredentials) => {
                tracing::warn!(error_id = error_id, "Invalid credentials attempt");
            }
            AppError::Token(TokenError::Encoding(msg)) => {
                tracing::error!(error_id = error_id, error = %msg, "Token encoding failed");
            }
            AppError::Store(StoreError::Storage(msg)) => {
                tracing::error!(error_id = error_id, error = %msg, "Credential store failure");
            }
            other => {
                tracing::warn!(error_id = error_id, error = %other, "Authentication error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Token(TokenError::Encoding(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Store(e) => match e {
                StoreError::InvalidCredentials | StoreError::NotRegistered => {
                    StatusCode::UNAUTHORIZED
                }
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::RevokeTargetNotFound => StatusCode::NOT_FOUND,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        self.log(&error_id);

        let status = self.status_code();
        let body = ErrorResponse::new(
            error_id,
            self.public_message(),
            self.code().to_string(),
            status.as_u16(),
        );

        HttpResponse::build(status).json(body)
    }
}

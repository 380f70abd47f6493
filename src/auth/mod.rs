/// Authentication module
///
/// Token signing and validation, password verification, auth cookies and
/// the per-request session state machine.

pub mod claims;
pub mod codec;
pub mod cookies;
pub mod password;
pub mod session;
pub mod tokens;

use std::sync::Arc;

use crate::store::CredentialStore;

pub use claims::{Claims, ParsedToken, TokenType};
pub use codec::TokenCodec;
pub use session::{AuthenticatedSession, RejectReason, SessionGate, SessionOutcome};
pub use tokens::{JwtTokenService, TokenService, ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};

/// Collaborators shared by the token-exchange handlers and the session
/// middleware.
#[derive(Clone)]
pub struct AuthService {
    pub tokens: Arc<dyn TokenService>,
    pub store: Arc<dyn CredentialStore>,
}

impl AuthService {
    pub fn new(tokens: Arc<dyn TokenService>, store: Arc<dyn CredentialStore>) -> Self {
        Self { tokens, store }
    }
}

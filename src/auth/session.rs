/// Per-request session resolution
///
/// A request starts without a session, is authenticated from its cookies
/// and ends either `Authenticated` or `Rejected`:
///
/// 1. A valid `access_token` authenticates directly.
/// 2. Otherwise a `refresh_token` that is valid and still registered mints
///    a new access token (silent refresh).
/// 3. In both paths the stored role is fetched and, when the route
///    requires one, compared against it.
///
/// The gate knows nothing about HTTP; the middleware turns its outcome
/// into cookies, redirects and request extensions.

use std::fmt;
use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpMessage, HttpRequest};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthService;
use crate::error::{AppError, StoreError, TokenError};

/// Identity of the caller for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedSession {
    pub user_id: Uuid,
    pub role: String,
}

/// Handlers take `AuthenticatedSession` (or `Option<AuthenticatedSession>`
/// behind an optional session) as an argument.
impl FromRequest for AuthenticatedSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthenticatedSession>()
                .cloned()
                .ok_or(AppError::Unauthenticated),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Neither a usable access token nor a refresh token was presented.
    NoCredentials,
    /// The refresh token could not mint an access token.
    Refresh(TokenError),
    /// The refresh token verifies but is absent from the store.
    NotRegistered,
    RoleMismatch { required: String, actual: String },
    Store(StoreError),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoCredentials => write!(f, "no credentials"),
            RejectReason::Refresh(e) => write!(f, "refresh failed: {}", e),
            RejectReason::NotRegistered => write!(f, "refresh token is not registered"),
            RejectReason::RoleMismatch { required, actual } => {
                write!(f, "role mismatch: required {}, found {}", required, actual)
            }
            RejectReason::Store(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Authenticated {
        session: AuthenticatedSession,
        /// Access token minted by a silent refresh, to be set as a cookie.
        refreshed_access: Option<String>,
    },
    Rejected {
        reason: RejectReason,
        /// Both token cookies must be cleared on the way out.
        clear_cookies: bool,
    },
}

impl SessionOutcome {
    fn rejected(reason: RejectReason) -> Self {
        let clear_cookies = matches!(
            reason,
            RejectReason::RoleMismatch { .. } | RejectReason::Store(StoreError::NotFound(_))
        );
        SessionOutcome::Rejected {
            reason,
            clear_cookies,
        }
    }
}

#[derive(Clone)]
pub struct SessionGate {
    auth: AuthService,
    required_role: Option<String>,
}

impl SessionGate {
    /// Gate that only admits users whose stored role is `required_role`.
    pub fn requiring(auth: AuthService, required_role: impl Into<String>) -> Self {
        Self {
            auth,
            required_role: Some(required_role.into()),
        }
    }

    /// Gate that admits any authenticated user with their stored role.
    pub fn any_role(auth: AuthService) -> Self {
        Self {
            auth,
            required_role: None,
        }
    }

    pub fn required_role(&self) -> Option<&str> {
        self.required_role.as_deref()
    }

    pub async fn resolve(&self, access_token: Option<&str>, refresh_token: Option<&str>) -> SessionOutcome {
        if let Some(access_token) = access_token {
            match self.auth.tokens.authenticate(access_token) {
                Ok(user_id) => return self.authorize(user_id, None).await,
                Err(e) => {
                    tracing::debug!(error = %e, "Access token rejected, attempting silent refresh");
                }
            }
        }

        let Some(refresh_token) = refresh_token else {
            return SessionOutcome::rejected(RejectReason::NoCredentials);
        };

        let access_token = match self.auth.tokens.create_access(refresh_token) {
            Ok(token) => token,
            Err(e) => return SessionOutcome::rejected(RejectReason::Refresh(e)),
        };

        match self.auth.store.is_registered(refresh_token).await {
            Ok(()) => {}
            Err(StoreError::NotRegistered) => {
                return SessionOutcome::rejected(RejectReason::NotRegistered)
            }
            Err(e) => return SessionOutcome::rejected(RejectReason::Store(e)),
        }

        let user_id = match self.auth.tokens.authenticate(&access_token) {
            Ok(user_id) => user_id,
            Err(e) => return SessionOutcome::rejected(RejectReason::Refresh(e)),
        };

        tracing::debug!(user_id = %user_id, "Access token silently refreshed");
        self.authorize(user_id, Some(access_token)).await
    }

    /// The stored role is checked on the direct and the refreshed path alike.
    async fn authorize(&self, user_id: Uuid, refreshed_access: Option<String>) -> SessionOutcome {
        let role = match self.auth.store.get_role(user_id).await {
            Ok(role) => role,
            Err(e) => return SessionOutcome::rejected(RejectReason::Store(e)),
        };

        if let Some(required) = &self.required_role {
            if *required != role {
                return SessionOutcome::rejected(RejectReason::RoleMismatch {
                    required: required.clone(),
                    actual: role,
                });
            }
        }

        SessionOutcome::Authenticated {
            session: AuthenticatedSession { user_id, role },
            refreshed_access,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use crate::auth::{Claims, JwtTokenService, TokenCodec, TokenService, TokenType};
    use crate::store::{CredentialStore, InMemoryCredentialStore};

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    struct Fixture {
        store: Arc<InMemoryCredentialStore>,
        tokens: Arc<JwtTokenService>,
        user_id: Uuid,
    }

    impl Fixture {
        fn new(role: &str) -> Self {
            let store = Arc::new(InMemoryCredentialStore::with_hash_cost(4));
            let user_id = store.add_user("a@b.com", "secret", role).unwrap();
            Self {
                store,
                tokens: Arc::new(JwtTokenService::new(SECRET)),
                user_id,
            }
        }

        fn auth(&self) -> AuthService {
            AuthService::new(self.tokens.clone(), self.store.clone())
        }

        async fn registered_refresh(&self) -> String {
            let refresh = self.tokens.create_refresh(&self.user_id.to_string()).unwrap();
            self.store.save(&refresh).await.unwrap();
            refresh
        }

        fn expired_access(&self) -> String {
            let now = Utc::now();
            TokenCodec::new(SECRET)
                .sign_claims(&Claims {
                    sub: self.user_id.to_string(),
                    iss: TokenType::Access.as_str().to_string(),
                    iat: (now - Duration::hours(7)).timestamp(),
                    exp: (now - Duration::hours(1)).timestamp(),
                    jti: Uuid::new_v4().to_string(),
                })
                .unwrap()
        }
    }

    #[tokio::test]
    async fn valid_access_token_authenticates_without_refresh() {
        let fx = Fixture::new("verified");
        let refresh = fx.registered_refresh().await;
        let access = fx.tokens.create_access(&refresh).unwrap();

        let outcome = SessionGate::requiring(fx.auth(), "verified")
            .resolve(Some(&access), None)
            .await;

        assert_eq!(
            outcome,
            SessionOutcome::Authenticated {
                session: AuthenticatedSession { user_id: fx.user_id, role: "verified".to_string() },
                refreshed_access: None,
            }
        );
    }

    #[tokio::test]
    async fn no_cookies_is_rejected() {
        let fx = Fixture::new("verified");
        let outcome = SessionGate::requiring(fx.auth(), "verified").resolve(None, None).await;

        assert_eq!(
            outcome,
            SessionOutcome::Rejected { reason: RejectReason::NoCredentials, clear_cookies: false }
        );
    }

    #[tokio::test]
    async fn expired_access_falls_back_to_registered_refresh() {
        let fx = Fixture::new("verified");
        let refresh = fx.registered_refresh().await;

        let outcome = SessionGate::requiring(fx.auth(), "verified")
            .resolve(Some(&fx.expired_access()), Some(&refresh))
            .await;

        match outcome {
            SessionOutcome::Authenticated { session, refreshed_access: Some(access) } => {
                assert_eq!(session.user_id, fx.user_id);
                assert_eq!(fx.tokens.authenticate(&access).unwrap(), fx.user_id);
            }
            other => panic!("expected a refreshed session, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_access_cookie_uses_refresh() {
        let fx = Fixture::new("verified");
        let refresh = fx.registered_refresh().await;

        let outcome = SessionGate::requiring(fx.auth(), "verified")
            .resolve(None, Some(&refresh))
            .await;

        assert!(matches!(
            outcome,
            SessionOutcome::Authenticated { refreshed_access: Some(_), .. }
        ));
    }

    #[tokio::test]
    async fn revoked_refresh_is_rejected() {
        let fx = Fixture::new("verified");
        let refresh = fx.registered_refresh().await;
        fx.store.revoke(&refresh).await.unwrap();

        let outcome = SessionGate::requiring(fx.auth(), "verified")
            .resolve(Some(&fx.expired_access()), Some(&refresh))
            .await;

        assert_eq!(
            outcome,
            SessionOutcome::Rejected { reason: RejectReason::NotRegistered, clear_cookies: false }
        );
    }

    #[tokio::test]
    async fn access_token_in_refresh_cookie_is_rejected() {
        let fx = Fixture::new("verified");
        let refresh = fx.registered_refresh().await;
        let access = fx.tokens.create_access(&refresh).unwrap();

        let outcome = SessionGate::requiring(fx.auth(), "verified")
            .resolve(None, Some(&access))
            .await;

        assert_eq!(
            outcome,
            SessionOutcome::Rejected {
                reason: RejectReason::Refresh(TokenError::TypeMismatch),
                clear_cookies: false,
            }
        );
    }

    #[tokio::test]
    async fn role_mismatch_clears_cookies() {
        let fx = Fixture::new("verified");
        let refresh = fx.registered_refresh().await;
        let access = fx.tokens.create_access(&refresh).unwrap();

        let outcome = SessionGate::requiring(fx.auth(), "dev")
            .resolve(Some(&access), Some(&refresh))
            .await;

        assert_eq!(
            outcome,
            SessionOutcome::Rejected {
                reason: RejectReason::RoleMismatch {
                    required: "dev".to_string(),
                    actual: "verified".to_string(),
                },
                clear_cookies: true,
            }
        );
    }

    #[tokio::test]
    async fn refreshed_session_still_checks_stored_role() {
        let fx = Fixture::new("verified");
        let refresh = fx.registered_refresh().await;

        let outcome = SessionGate::requiring(fx.auth(), "dev")
            .resolve(None, Some(&refresh))
            .await;

        assert!(matches!(
            outcome,
            SessionOutcome::Rejected { reason: RejectReason::RoleMismatch { .. }, clear_cookies: true }
        ));
    }

    #[tokio::test]
    async fn any_role_gate_reports_stored_role() {
        let fx = Fixture::new("dev");
        let refresh = fx.registered_refresh().await;
        let access = fx.tokens.create_access(&refresh).unwrap();

        let outcome = SessionGate::any_role(fx.auth()).resolve(Some(&access), None).await;

        assert!(matches!(
            outcome,
            SessionOutcome::Authenticated { session, .. } if session.role == "dev"
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_rejected_and_cookies_cleared() {
        let fx = Fixture::new("verified");
        let stranger = fx.tokens.create_refresh(&Uuid::new_v4().to_string()).unwrap();
        let access = fx.tokens.create_access(&stranger).unwrap();

        let outcome = SessionGate::any_role(fx.auth()).resolve(Some(&access), None).await;

        assert!(matches!(
            outcome,
            SessionOutcome::Rejected { reason: RejectReason::Store(StoreError::NotFound(_)), clear_cookies: true }
        ));
    }
}

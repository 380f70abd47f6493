/// Session Authentication Middleware
///
/// Resolves the session from the `access_token` / `refresh_token` cookies,
/// silently re-mints the access token when only the refresh token is still
/// good, and injects an `AuthenticatedSession` into request extensions for
/// route handlers. Failures never surface as an error body: a required
/// session redirects to the login path, an optional one lets the request
/// through anonymously.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::LOCATION,
    Error, HttpMessage, HttpResponse,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::auth::cookies::{removal_cookies, token_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::{AuthService, SessionGate, SessionOutcome};

#[derive(Clone)]
enum OnReject {
    /// 303 to the login path
    Redirect(String),
    /// Proceed without a session
    Continue,
}

/// Session middleware for cookie-authenticated scopes
pub struct SessionMiddleware {
    gate: SessionGate,
    on_reject: OnReject,
}

impl SessionMiddleware {
    /// Admit only users whose stored role is `required_role`; everyone else
    /// is redirected to `login_path`.
    pub fn require(
        auth: AuthService,
        required_role: impl Into<String>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            gate: SessionGate::requiring(auth, required_role),
            on_reject: OnReject::Redirect(login_path.into()),
        }
    }

    /// Authenticate when possible, never reject. Handlers extract
    /// `Option<AuthenticatedSession>`.
    pub fn optional(auth: AuthService) -> Self {
        Self {
            gate: SessionGate::any_role(auth),
            on_reject: OnReject::Continue,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
            gate: Rc::new(self.gate.clone()),
            on_reject: self.on_reject.clone(),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    gate: Rc<SessionGate>,
    on_reject: OnReject,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let gate = Rc::clone(&self.gate);
        let on_reject = self.on_reject.clone();

        Box::pin(async move {
            let access_token = req.cookie(ACCESS_COOKIE).map(|c| c.value().to_string());
            let refresh_token = req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string());

            match gate
                .resolve(access_token.as_deref(), refresh_token.as_deref())
                .await
            {
                SessionOutcome::Authenticated {
                    session,
                    refreshed_access,
                } => {
                    tracing::debug!(
                        user_id = %session.user_id,
                        role = %session.role,
                        "Session authenticated"
                    );
                    req.extensions_mut().insert(session);

                    let mut res = service.call(req).await?;
                    if let Some(token) = refreshed_access {
                        let cookie = token_cookie(ACCESS_COOKIE, token);
                        if let Err(e) = res.response_mut().add_cookie(&cookie) {
                            tracing::error!(error = %e, "Failed to set refreshed access cookie");
                        }
                    }
                    Ok(res.map_into_left_body())
                }
                SessionOutcome::Rejected {
                    reason,
                    clear_cookies,
                } => {
                    tracing::info!(
                        path = %req.path(),
                        required_role = ?gate.required_role(),
                        reason = %reason,
                        "Session rejected"
                    );

                    match on_reject {
                        OnReject::Continue => {
                            let mut res = service.call(req).await?;
                            if clear_cookies {
                                for cookie in removal_cookies() {
                                    if let Err(e) = res.response_mut().add_cookie(&cookie) {
                                        tracing::error!(error = %e, "Failed to clear token cookie");
                                    }
                                }
                            }
                            Ok(res.map_into_left_body())
                        }
                        OnReject::Redirect(login_path) => {
                            let mut response = HttpResponse::SeeOther();
                            response.insert_header((LOCATION, login_path));
                            if clear_cookies {
                                for cookie in removal_cookies() {
                                    response.cookie(cookie);
                                }
                            }
                            Ok(req.into_response(response.finish()).map_into_right_body())
                        }
                    }
                }
            }
        })
    }
}

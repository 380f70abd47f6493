/// Token-exchange Routes
///
/// Login, access-token refresh, refresh-token revocation and logout.

use actix_web::{http::header::LOCATION, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::cookies::{removal_cookies, token_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::auth::AuthService;
use crate::configuration::ApplicationSettings;
use crate::error::{AppError, StoreError};
use crate::validators::{is_present_token, is_valid_email, is_valid_password};

/// htmx client-side redirect header
pub const HX_LOCATION: &str = "HX-Location";

/// Login form
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Refresh and revoke request body
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// POST /auth/login
///
/// Verify email and password, mint a refresh and an access token, register
/// the refresh token and hand both out as cookies.
///
/// # Errors
/// - 400: Invalid email format, empty or overlong password
/// - 401: Unknown email or wrong password (same response for both)
/// - 500: Store failure
pub async fn login(
    form: web::Form<LoginForm>,
    auth: web::Data<AuthService>,
    settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;

    let user_id = auth.store.resolve_user(&email, &form.password).await?;

    let refresh_token = auth.tokens.create_refresh(&user_id.to_string())?;
    let access_token = auth.tokens.create_access(&refresh_token)?;
    auth.store.save(&refresh_token).await?;

    tracing::info!(user_id = %user_id, "User logged in");

    Ok(HttpResponse::Ok()
        .cookie(token_cookie(ACCESS_COOKIE, access_token))
        .cookie(token_cookie(REFRESH_COOKIE, refresh_token))
        .insert_header((HX_LOCATION, settings.home_path.as_str()))
        .finish())
}

/// POST /auth/refresh
///
/// Exchange a registered refresh token for a new access token. The refresh
/// token stays valid.
///
/// # Errors
/// - 400: Empty refresh token
/// - 401: Invalid, expired or revoked refresh token
/// - 500: Store failure
pub async fn refresh(
    body: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    is_present_token(&body.refresh_token)?;

    let user_id = auth.tokens.validate_refresh(&body.refresh_token)?;
    auth.store.is_registered(&body.refresh_token).await?;
    let access_token = auth.tokens.create_access(&body.refresh_token)?;

    tracing::debug!(user_id = %user_id, "Access token refreshed");

    Ok(HttpResponse::Ok().json(AccessTokenResponse { access_token }))
}

/// POST /auth/revoke
///
/// # Errors
/// - 400: Empty refresh token
/// - 401: Invalid or expired refresh token
/// - 404: Refresh token is not registered
/// - 500: Store failure
pub async fn revoke(
    body: web::Json<RefreshRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    is_present_token(&body.refresh_token)?;

    let user_id = auth.tokens.validate_refresh(&body.refresh_token)?;
    auth.store
        .revoke(&body.refresh_token)
        .await
        .map_err(|e| match e {
            StoreError::NotRegistered => AppError::RevokeTargetNotFound,
            other => AppError::Store(other),
        })?;

    tracing::info!(user_id = %user_id, "Refresh token revoked");

    Ok(HttpResponse::Ok().finish())
}

/// POST /auth/logout
///
/// Always succeeds: the refresh cookie is revoked when possible, both token
/// cookies are cleared and the client is sent home.
pub async fn logout(
    req: HttpRequest,
    auth: web::Data<AuthService>,
    settings: web::Data<ApplicationSettings>,
) -> HttpResponse {
    if let Some(cookie) = req.cookie(REFRESH_COOKIE) {
        if let Err(e) = auth.store.revoke(cookie.value()).await {
            tracing::warn!(error = %e, "Failed to revoke refresh token on logout");
        }
    }

    let mut response = HttpResponse::SeeOther();
    response.insert_header((LOCATION, settings.home_path.as_str()));
    for cookie in removal_cookies() {
        response.cookie(cookie);
    }
    response.finish()
}

//! Cookie builders for the token pair.

use actix_web::cookie::time::{Duration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};

/// Cookie name for the access token (short-lived, 6 hours).
pub const ACCESS_COOKIE: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 120 days).
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Build a `Secure`, `HttpOnly`, `SameSite=Lax` cookie scoped to `/`.
pub fn token_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

/// Build the cookie that makes the browser drop `name`: empty value,
/// zero max-age and an expiry in the past.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::now_utc() - Duration::hours(1))
        .finish()
}

/// Removal cookies for both tokens.
pub fn removal_cookies() -> [Cookie<'static>; 2] {
    [removal_cookie(REFRESH_COOKIE), removal_cookie(ACCESS_COOKIE)]
}

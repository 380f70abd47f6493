use actix_web::HttpResponse;
use serde_json::json;

use crate::auth::AuthenticatedSession;

/// GET /api/session
///
/// Only reachable through the role-checking session middleware.
pub async fn current_session(session: AuthenticatedSession) -> HttpResponse {
    HttpResponse::Ok().json(session)
}

/// GET /whoami
///
/// Behind the optional session middleware; anonymous callers are visitors.
pub async fn whoami(session: Option<AuthenticatedSession>) -> HttpResponse {
    match session {
        Some(session) => HttpResponse::Ok().json(session),
        None => HttpResponse::Ok().json(json!({ "role": "visitor" })),
    }
}

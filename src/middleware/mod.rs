/// Middleware module
///
/// Cookie-based session authentication for protected scopes.

mod session_middleware;

pub use session_middleware::SessionMiddleware;

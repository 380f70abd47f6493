mod auth;
mod health_check;
mod session;

pub use auth::{login, logout, refresh, revoke, AccessTokenResponse, LoginForm, RefreshRequest, HX_LOCATION};
pub use health_check::health_check;
pub use session::{current_session, whoami};

//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span and the Sentry scope)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Rate limiting on the auth routes (governor)
//!
//! Authentication is enforced per handler by the extractors in [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{
    RequireAdmin, RequireAuth, clear_current_user, clear_pending_login, pending_login,
    set_current_user, set_pending_login,
};
pub use rate_limit::{auth_rate_limiter, rate_limit_response};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;

//! Bearer token authentication: issuing tokens, tracking their sessions,
//! limiting log-in attempts and attaching identities to requests.

mod client_ip;
mod identity;
mod log_in;
mod log_out;
mod login_limiter;
mod middleware;
mod register;
mod session;
mod sessions;
mod token;

pub use identity::{AuthenticatedUser, SessionToken};
pub use log_in::post_log_in;
pub use log_out::post_log_out;
pub use login_limiter::LoginLimiter;
pub use middleware::authenticate;
pub use register::register_user;
pub use session::{SessionManager, SessionSweeper};
pub use sessions::get_session_stats;
pub use token::TokenProvider;

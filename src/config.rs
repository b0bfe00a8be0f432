//! Configuration for token sessions and log-in rate limiting.

use std::time::Duration;

/// How long a session may sit idle before its token is considered expired.
pub const DEFAULT_SESSION_EXPIRATION: Duration = Duration::from_secs(1800);
/// How often expired sessions are swept from memory.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);
/// The issuer written into, and required of, every token.
pub const DEFAULT_TOKEN_ISSUER: &str = "personal";

/// The settings for authenticating users.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    /// The sliding expiration window, measured from the last use of a token.
    pub session_expiration: Duration,
    /// The interval between sweeps of expired sessions.
    pub sweep_interval: Duration,
    /// The issuer claim for tokens.
    pub token_issuer: String,
    /// The number of consecutive failed log-ins after which a client IP is blocked.
    pub max_login_attempts: u32,
    /// How long a client IP stays blocked after its most recent failed log-in.
    pub login_block_duration: Duration,
    /// Whether to take the client IP from the `X-Forwarded-For` header.
    ///
    /// Only enable this when the server sits behind a proxy that sets the header.
    pub trust_forwarded_for: bool,
}

impl AuthConfig {
    /// Create a config with the given log-in limits and defaults for everything else.
    pub fn new(max_login_attempts: u32, login_block_duration: Duration) -> Self {
        Self {
            session_expiration: DEFAULT_SESSION_EXPIRATION,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            token_issuer: DEFAULT_TOKEN_ISSUER.to_owned(),
            max_login_attempts,
            login_block_duration,
            trust_forwarded_for: false,
        }
    }
}

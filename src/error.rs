use std::time::Duration;

pub type ChallengeResult<T> = Result<T, ChallengeError>;

#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("invalid domain: '{0}'")]
    InvalidDomain(String),

    #[error("zone not found: {0}")]
    ZoneNotFound(String),

    #[error("no matching zone for '{fqdn}' after {tried} candidates")]
    NoMatchingZone { fqdn: String, tried: usize },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("invalid credentials: {0}")]
    Credentials(String),

    #[error("environment variable missing: {0}")]
    EnvMissing(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ChallengeError {
    /// Whether this error only means "no zone rooted at this name".
    #[must_use]
    pub const fn is_zone_not_found(&self) -> bool {
        matches!(self, Self::ZoneNotFound(_))
    }

    /// Whether this error must stop a fallback loop.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_zone_not_found()
    }
}

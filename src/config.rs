use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::dns::DEFAULT_TIMEOUT;
use crate::dns::dynu::{DEFAULT_TTL, DYNU_API};
use crate::error::{ChallengeError, ChallengeResult};

/// Key holding the API key in a credentials file.
pub const TOKEN_KEY: &str = "dns_dynu_auth_token";

/// Environment variable consulted when no credentials file is given.
pub const TOKEN_ENV: &str = "DYNU_API_KEY";

/// Seconds to wait for DNS propagation after adding a record.
pub const DEFAULT_PROPAGATION_SECONDS: u64 = 120;

/// Dynu API credentials.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl Credentials {
    /// Read a certbot-style credentials file:
    ///
    /// ```ini
    /// dns_dynu_auth_token = 0123-abcd
    /// ```
    pub fn from_file(path: &Path) -> ChallengeResult<Self> {
        if !path.exists() {
            return Err(ChallengeError::FileNotFound(path.display().to_string()));
        }
        warn_if_exposed(path);

        let content = fs::read_to_string(path)?;
        let token = parse_value(&content, TOKEN_KEY)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ChallengeError::Credentials(format!(
                    "missing {TOKEN_KEY} in {}",
                    path.display()
                ))
            })?;

        Ok(Self { token })
    }

    /// Read the API key from `DYNU_API_KEY`.
    pub fn from_env() -> ChallengeResult<Self> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Self {
                token: t.trim().to_string(),
            })
            .ok_or_else(|| {
                ChallengeError::EnvMissing(format!(
                    "{TOKEN_ENV} not set. Create an API key at: \
                     https://www.dynu.com/ControlPanel/APICredentials"
                ))
            })
    }

    /// Load from `path` when given, else from the environment.
    pub fn load(path: Option<&Path>) -> ChallengeResult<Self> {
        path.map_or_else(Self::from_env, Self::from_file)
    }
}

/// Find `key = value` in a flat INI-style file.
///
/// Blank lines, `#`/`;` comments and `[section]` headers are skipped.
/// The first occurrence wins. Matching quotes around the value are
/// stripped.
#[must_use]
pub fn parse_value(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(['#', ';', '[']))
        .filter_map(|l| l.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| unquote(v.trim()).to_string())
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(unix)]
fn warn_if_exposed(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Ok(meta) = fs::metadata(path) {
        let mode = meta.permissions().mode();
        if mode & 0o077 != 0 {
            tracing::warn!(
                path = %path.display(),
                mode = %format!("{:o}", mode & 0o777),
                "credentials file is accessible by other users, consider chmod 600"
            );
        }
    }
}

#[cfg(not(unix))]
fn warn_if_exposed(_path: &Path) {}

/// Runtime settings for the hooks.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bound on each provider call.
    pub timeout: Duration,
    /// Wait after adding a record, before returning to the ACME
    /// client.
    pub propagation: Duration,
    /// Smallest zone, in labels, the fallback may probe.
    pub min_zone_labels: usize,
    pub api_base: String,
    pub ttl: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            propagation: Duration::from_secs(DEFAULT_PROPAGATION_SECONDS),
            min_zone_labels: 1,
            api_base: DYNU_API.to_string(),
            ttl: DEFAULT_TTL,
        }
    }
}

impl Settings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn propagation(mut self, propagation: Duration) -> Self {
        self.propagation = propagation;
        self
    }

    #[must_use]
    pub const fn min_zone_labels(mut self, labels: usize) -> Self {
        self.min_zone_labels = labels;
        self
    }

    #[must_use]
    pub fn api_base(mut self, url: &str) -> Self {
        self.api_base = url.to_string();
        self
    }

    #[must_use]
    pub const fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

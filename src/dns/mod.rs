pub mod dynu;
pub mod memory;

use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::ChallengeResult;

/// Default bound on a single provider call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Stand-in deadline for timeouts too large to add to `Instant::now()`.
const MAX_DEADLINE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Per-call bounds handed to every [`ZoneApi`] request.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Upper bound for one `ZoneApi` call, however many requests it
    /// makes. Exceeding it is a fatal
    /// [`Timeout`](crate::error::ChallengeError::Timeout).
    pub timeout: Duration,
    /// Aborts the request when fired.
    pub cancel: CancelToken,
}

impl CallOptions {
    /// The instant a call started now must be done by.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        let now = Instant::now();
        now.checked_add(self.timeout).unwrap_or_else(|| now + MAX_DEADLINE)
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
        }
    }
}

/// A DNS provider that can create and delete TXT records in a named
/// zone.
///
/// Both verbs report
/// [`ZoneNotFound`](crate::error::ChallengeError::ZoneNotFound) when
/// the account holds no zone named exactly `zone`. Every other error
/// is a real failure.
pub trait ZoneApi {
    /// Human readable provider name for logs.
    fn name(&self) -> &str;

    /// Create TXT record `name` (relative to `zone`) holding
    /// `content`.
    fn create_txt_record(
        &self,
        zone: &str,
        name: &str,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()>;

    /// Delete TXT record `name` (relative to `zone`) holding
    /// `content`.
    fn delete_txt_record(
        &self,
        zone: &str,
        name: &str,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()>;
}

impl<T: ZoneApi + ?Sized> ZoneApi for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn create_txt_record(
        &self,
        zone: &str,
        name: &str,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        (**self).create_txt_record(zone, name, content, opts)
    }

    fn delete_txt_record(
        &self,
        zone: &str,
        name: &str,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        (**self).delete_txt_record(zone, name, content, opts)
    }
}

/// Join a zone-relative record name with its zone.
///
/// Example: `("_acme-challenge.my", "domain.com")` ->
/// `"_acme-challenge.my.domain.com"`. An empty name is the zone apex.
#[must_use]
pub fn absolute_name(name: &str, zone: &str) -> String {
    if name.is_empty() {
        zone.to_string()
    } else {
        format!("{name}.{zone}")
    }
}

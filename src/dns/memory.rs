use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::dns::{CallOptions, ZoneApi};
use crate::error::{ChallengeError, ChallengeResult};

/// Failure a [`MemoryZoneApi`] zone can be scripted to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Auth,
    RateLimited,
    Transport,
    Timeout,
}

impl Failure {
    fn into_error(self, zone: &str, timeout: Duration) -> ChallengeError {
        match self {
            Self::Auth => ChallengeError::Auth(format!("invalid API key for zone {zone}")),
            Self::RateLimited => ChallengeError::RateLimited(format!("too many requests for {zone}")),
            Self::Transport => ChallengeError::Transport(format!("connection reset while on {zone}")),
            Self::Timeout => ChallengeError::Timeout(timeout),
        }
    }
}

/// In-memory provider holding a fixed set of zones.
///
/// Zones not registered with [`zone`](Self::zone) answer
/// `ZoneNotFound`. Used for offline simulation and as a test double.
#[derive(Debug, Default)]
pub struct MemoryZoneApi {
    zones: Mutex<BTreeMap<String, Vec<(String, String)>>>,
    failures: HashMap<String, Failure>,
}

impl MemoryZoneApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host a zone. Names are compared case-insensitively.
    #[must_use]
    pub fn zone(self, zone: &str) -> Self {
        self.lock().entry(zone.to_ascii_lowercase()).or_default();
        self
    }

    /// Make every request against `zone` fail with `failure`,
    /// whether or not the zone is hosted.
    #[must_use]
    pub fn fail(mut self, zone: &str, failure: Failure) -> Self {
        self.failures.insert(zone.to_ascii_lowercase(), failure);
        self
    }

    /// TXT records currently held in `zone` as `(name, content)`.
    #[must_use]
    pub fn records(&self, zone: &str) -> Vec<(String, String)> {
        self.lock()
            .get(&zone.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<(String, String)>>> {
        self.zones.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_zone<T>(
        &self,
        zone: &str,
        opts: &CallOptions,
        f: impl FnOnce(&mut Vec<(String, String)>) -> T,
    ) -> ChallengeResult<T> {
        let key = zone.to_ascii_lowercase();
        if let Some(failure) = self.failures.get(&key) {
            return Err(failure.into_error(zone, opts.timeout));
        }
        let mut zones = self.lock();
        let records = zones
            .get_mut(&key)
            .ok_or_else(|| ChallengeError::ZoneNotFound(zone.to_string()))?;
        Ok(f(records))
    }
}

impl ZoneApi for MemoryZoneApi {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn create_txt_record(
        &self,
        zone: &str,
        name: &str,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        if opts.cancel.is_cancelled() {
            return Err(ChallengeError::Cancelled);
        }
        self.with_zone(zone, opts, |records| {
            let record = (name.to_string(), content.to_string());
            if !records.contains(&record) {
                records.push(record);
            }
        })
    }

    fn delete_txt_record(
        &self,
        zone: &str,
        name: &str,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        if opts.cancel.is_cancelled() {
            return Err(ChallengeError::Cancelled);
        }
        self.with_zone(zone, opts, |records| {
            records.retain(|(n, c)| !(n == name && c == content));
        })
    }
}

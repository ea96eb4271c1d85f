//! Challenge record provisioning with zone fallback.
//!
//! [`RecordProvisioner`] walks the [`ZoneResolver`] candidates for a
//! domain, most specific first, and asks its [`ZoneApi`] to write
//! (or remove) the TXT record in each zone until one accepts it.
//! Only [`ChallengeError::ZoneNotFound`] moves the walk forward; any
//! other error ends the call immediately.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::dns::{self, CallOptions, ZoneApi};
use crate::error::{ChallengeError, ChallengeResult};
use crate::zone::{Candidate, ZoneResolver};

/// Which provider verb a call used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create_txt_record"),
            Self::Delete => f.write_str("delete_txt_record"),
        }
    }
}

/// How a single provider call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    ZoneNotFound,
    Failed(String),
}

/// One attempted provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub verb: Verb,
    pub zone: String,
    pub record_name: String,
    pub content: String,
    pub outcome: Outcome,
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {}, {})",
            self.verb, self.zone, self.record_name, self.content
        )?;
        match &self.outcome {
            Outcome::Ok => f.write_str(" -> ok"),
            Outcome::ZoneNotFound => f.write_str(" -> zone not found"),
            Outcome::Failed(e) => write!(f, " -> {e}"),
        }
    }
}

/// Observer of every provider call a [`RecordProvisioner`] makes.
pub trait CallRecorder: Send + Sync {
    fn record(&self, call: &Call);
}

impl<T: CallRecorder + ?Sized> CallRecorder for Arc<T> {
    fn record(&self, call: &Call) {
        (**self).record(call);
    }
}

/// Recorder that keeps every call in order.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<Call>>,
}

impl CallLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CallRecorder for CallLog {
    fn record(&self, call: &Call) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());
    }
}

/// Where a successful call landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Zone that accepted the call.
    pub zone: String,
    /// Record name relative to `zone`.
    pub record_name: String,
    /// Provider calls made, including the successful one.
    pub attempts: usize,
}

impl Provisioned {
    /// Absolute name of the record.
    #[must_use]
    pub fn fqdn(&self) -> String {
        dns::absolute_name(&self.record_name, &self.zone)
    }
}

/// Creates and deletes ACME challenge TXT records, falling back to
/// ancestor zones until the provider accepts one.
pub struct RecordProvisioner<A> {
    api: A,
    resolver: ZoneResolver,
    timeout: Duration,
    cancel: CancelToken,
    recorder: Option<Box<dyn CallRecorder>>,
}

impl<A: ZoneApi> RecordProvisioner<A> {
    #[must_use]
    pub fn new(api: A) -> Self {
        Self {
            api,
            resolver: ZoneResolver::new(),
            timeout: dns::DEFAULT_TIMEOUT,
            cancel: CancelToken::new(),
            recorder: None,
        }
    }

    /// Bound on each provider call.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn resolver(mut self, resolver: ZoneResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Abort calls when `token` is cancelled.
    #[must_use]
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn recorder(mut self, recorder: impl CallRecorder + 'static) -> Self {
        self.recorder = Some(Box::new(recorder));
        self
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Create TXT `record_name` for `fqdn` holding `content` in the
    /// most specific zone the provider has.
    pub fn add_challenge_record(
        &self,
        fqdn: &str,
        record_name: &str,
        content: &str,
    ) -> ChallengeResult<Provisioned> {
        self.walk(Verb::Create, fqdn, record_name, content)
    }

    /// Delete TXT `record_name` for `fqdn` holding `content` from the
    /// most specific zone the provider has.
    pub fn delete_challenge_record(
        &self,
        fqdn: &str,
        record_name: &str,
        content: &str,
    ) -> ChallengeResult<Provisioned> {
        self.walk(Verb::Delete, fqdn, record_name, content)
    }

    fn walk(
        &self,
        verb: Verb,
        fqdn: &str,
        record_name: &str,
        content: &str,
    ) -> ChallengeResult<Provisioned> {
        let candidates = self.resolver.candidates(fqdn, record_name)?;
        let opts = CallOptions {
            timeout: self.timeout,
            cancel: self.cancel.clone(),
        };
        let domain = candidates.fqdn().to_string();
        let mut tried = 0;

        for candidate in candidates {
            if self.cancel.is_cancelled() {
                tracing::warn!(%domain, attempt = tried, "cancelled before next zone");
                return Err(ChallengeError::Cancelled);
            }
            tried += 1;

            let result = self.attempt(verb, &candidate, content, &opts);
            self.record(verb, &candidate, content, &result);

            match result {
                Ok(()) => {
                    tracing::info!(
                        provider = self.api.name(),
                        %verb,
                        zone = %candidate.zone,
                        record = %candidate.record_name,
                        attempt = tried,
                        "challenge record {}",
                        if verb == Verb::Create { "created" } else { "deleted" }
                    );
                    return Ok(Provisioned {
                        zone: candidate.zone,
                        record_name: candidate.record_name,
                        attempts: tried,
                    });
                }
                Err(e) if e.is_zone_not_found() => {
                    tracing::debug!(zone = %candidate.zone, attempt = tried, "zone not found, trying parent");
                }
                Err(e) => {
                    tracing::error!(zone = %candidate.zone, attempt = tried, error = %e, "provider call failed");
                    return Err(e);
                }
            }
        }

        tracing::warn!(%domain, tried, "no zone accepted the record");
        Err(ChallengeError::NoMatchingZone {
            fqdn: domain,
            tried,
        })
    }

    fn attempt(
        &self,
        verb: Verb,
        candidate: &Candidate,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        tracing::debug!(%verb, zone = %candidate.zone, record = %candidate.record_name, "probing zone");
        match verb {
            Verb::Create => {
                self.api
                    .create_txt_record(&candidate.zone, &candidate.record_name, content, opts)
            }
            Verb::Delete => {
                self.api
                    .delete_txt_record(&candidate.zone, &candidate.record_name, content, opts)
            }
        }
    }

    fn record(
        &self,
        verb: Verb,
        candidate: &Candidate,
        content: &str,
        result: &ChallengeResult<()>,
    ) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let outcome = match result {
            Ok(()) => Outcome::Ok,
            Err(e) if e.is_zone_not_found() => Outcome::ZoneNotFound,
            Err(e) => Outcome::Failed(e.to_string()),
        };
        recorder.record(&Call {
            verb,
            zone: candidate.zone.clone(),
            record_name: candidate.record_name.clone(),
            content: content.to_string(),
            outcome,
        });
    }
}

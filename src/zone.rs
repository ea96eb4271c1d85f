//! Zone resolution by label fallback.
//!
//! A provider account often holds only an ancestor zone of the
//! certificate domain. [`candidates`] lists every zone the domain
//! could live in, from the full name down to its last label, along
//! with the record name rewritten to be relative to that zone.
//!
//! ```rust
//! use dynu_dns01::zone::candidates;
//!
//! let plan: Vec<_> = candidates("api.my.domain.com", "_acme-challenge")
//!     .unwrap()
//!     .map(|c| (c.zone, c.record_name))
//!     .collect();
//!
//! assert_eq!(plan[2].0, "domain.com");
//! assert_eq!(plan[2].1, "_acme-challenge.api.my");
//! ```

use std::fmt;

use crate::error::{ChallengeError, ChallengeResult};

/// A validated, lowercased domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fqdn {
    labels: Vec<String>,
}

impl Fqdn {
    /// Parse a domain name.
    ///
    /// Surrounding whitespace and one trailing dot are trimmed and
    /// labels are ASCII-lowercased. An empty name or an empty label
    /// is rejected with [`ChallengeError::InvalidDomain`].
    pub fn parse(input: &str) -> ChallengeResult<Self> {
        let trimmed = input.trim();
        let name = trimmed.strip_suffix('.').unwrap_or(trimmed);

        if name.is_empty() {
            return Err(ChallengeError::InvalidDomain(input.to_string()));
        }

        let labels: Vec<String> = name.split('.').map(str::to_ascii_lowercase).collect();
        if labels.iter().any(String::is_empty) {
            return Err(ChallengeError::InvalidDomain(input.to_string()));
        }

        Ok(Self { labels })
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }
}

impl fmt::Display for Fqdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels.join("."))
    }
}

impl std::str::FromStr for Fqdn {
    type Err = ChallengeError;

    fn from_str(s: &str) -> ChallengeResult<Self> {
        Self::parse(s)
    }
}

/// One zone to probe, and the record name relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Zone name, e.g. `domain.com`.
    pub zone: String,
    /// Record name inside `zone`, e.g. `_acme-challenge.my`.
    pub record_name: String,
    /// Number of leading labels moved from the zone into the
    /// record name.
    pub depth: usize,
}

/// Rewrite `record_name` for a zone that dropped the `dropped`
/// leading labels of the domain.
#[must_use]
pub fn adjust_record_name(record_name: &str, dropped: &[String]) -> String {
    if dropped.is_empty() {
        return record_name.to_string();
    }
    let prefix = dropped.join(".");
    if record_name.is_empty() {
        prefix
    } else {
        format!("{record_name}.{prefix}")
    }
}

/// Lazy sequence of [`Candidate`]s, most specific first.
#[derive(Debug, Clone)]
pub struct Candidates {
    fqdn: Fqdn,
    record_name: String,
    next: usize,
    end: usize,
}

impl Candidates {
    /// Build the sequence for an already parsed domain.
    ///
    /// `min_zone_labels` stops the sequence before zones shorter
    /// than that many labels. `1` probes all the way down to the
    /// last label. The full domain is always yielded, whatever the
    /// floor.
    #[must_use]
    pub fn new(fqdn: Fqdn, record_name: &str, min_zone_labels: usize) -> Self {
        let count = fqdn.label_count();
        let floor = min_zone_labels.clamp(1, count);
        Self {
            record_name: record_name.to_string(),
            next: 0,
            end: count - floor + 1,
            fqdn,
        }
    }

    #[must_use]
    pub const fn fqdn(&self) -> &Fqdn {
        &self.fqdn
    }

    /// Candidates not yet yielded.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.end - self.next
    }
}

impl Iterator for Candidates {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        if self.next >= self.end {
            return None;
        }
        let depth = self.next;
        self.next += 1;

        let labels = self.fqdn.labels();
        Some(Candidate {
            zone: labels[depth..].join("."),
            record_name: adjust_record_name(&self.record_name, &labels[..depth]),
            depth,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for Candidates {}

/// Every zone `fqdn` could belong to, from the full name down to its
/// last label.
pub fn candidates(fqdn: &str, record_name: &str) -> ChallengeResult<Candidates> {
    Ok(Candidates::new(Fqdn::parse(fqdn)?, record_name, 1))
}

/// Resolves candidate sequences with a configurable depth floor.
#[derive(Debug, Clone, Copy)]
pub struct ZoneResolver {
    min_zone_labels: usize,
}

impl Default for ZoneResolver {
    fn default() -> Self {
        Self { min_zone_labels: 1 }
    }
}

impl ZoneResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Never probe zones with fewer than `labels` labels.
    ///
    /// The default of `1` probes bare TLDs such as `com` or `uk`.
    /// Raising it skips those calls but changes which zones can
    /// match.
    #[must_use]
    pub const fn min_zone_labels(mut self, labels: usize) -> Self {
        self.min_zone_labels = labels;
        self
    }

    #[must_use]
    pub const fn floor(&self) -> usize {
        self.min_zone_labels
    }

    pub fn candidates(&self, fqdn: &str, record_name: &str) -> ChallengeResult<Candidates> {
        Ok(Candidates::new(
            Fqdn::parse(fqdn)?,
            record_name,
            self.min_zone_labels,
        ))
    }
}

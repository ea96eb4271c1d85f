//! ACME DNS-01 challenge records for Dynu.
//!
//! A Dynu account does not need a zone for every name a certificate
//! covers: a zone for `domain.com` can hold the challenge record of
//! `api.my.domain.com`, as long as the record is named
//! `_acme-challenge.api.my` inside it. This crate finds that zone by
//! trying the most specific name first and stepping towards the root
//! each time the provider reports that no such zone exists.
//!
//! # Overview
//!
//! - [`zone`] lists the candidate zones for a domain and rewrites
//!   the record name for each one. It is pure and has no I/O.
//! - [`RecordProvisioner`] drives those candidates against a
//!   [`ZoneApi`](dns::ZoneApi) until one zone accepts the record.
//! - [`Dynu`] talks to the Dynu REST API; [`MemoryZoneApi`] is an
//!   offline stand-in.
//! - [`cli`] wires everything into certbot manual hooks.
//!
//! # Examples
//!
//! ## Fallback against an offline provider
//!
//! ```rust
//! use dynu_dns01::{MemoryZoneApi, RecordProvisioner};
//!
//! let provisioner = RecordProvisioner::new(MemoryZoneApi::new().zone("domain.com"));
//!
//! let placed = provisioner
//!     .add_challenge_record("api.my.domain.com", "_acme-challenge", "token")
//!     .unwrap();
//!
//! assert_eq!(placed.zone, "domain.com");
//! assert_eq!(placed.record_name, "_acme-challenge.api.my");
//! assert_eq!(placed.attempts, 3);
//! ```
//!
//! ## Dynu
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use dynu_dns01::{Credentials, Dynu, RecordProvisioner};
//!
//! fn main() -> anyhow::Result<()> {
//!     let creds = Credentials::from_env()?;
//!     let provisioner = RecordProvisioner::new(Dynu::new(&creds.token))
//!         .timeout(Duration::from_secs(20));
//!
//!     provisioner.add_challenge_record("my.domain.com", "_acme-challenge", "token")?;
//!     // ... let the ACME server validate ...
//!     provisioner.delete_challenge_record("my.domain.com", "_acme-challenge", "token")?;
//!     Ok(())
//! }
//! ```
//!
//! ## certbot hooks
//!
//! ```sh
//! certbot certonly --manual --preferred-challenges dns \
//!   --manual-auth-hook "dynu-dns01 auth --credentials /etc/dynu.ini" \
//!   --manual-cleanup-hook "dynu-dns01 cleanup --credentials /etc/dynu.ini" \
//!   -d my.domain.com
//! ```

#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cancel;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod dns;
pub mod error;
pub mod logging;
pub mod provisioner;
pub mod zone;

pub use cancel::CancelToken;
pub use config::{Credentials, Settings};
pub use dns::ZoneApi;
pub use dns::dynu::Dynu;
pub use dns::memory::MemoryZoneApi;
pub use error::{ChallengeError, ChallengeResult};
pub use provisioner::{CallLog, RecordProvisioner};
pub use zone::ZoneResolver;

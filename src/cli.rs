use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::cmd;
use crate::config::{Credentials, DEFAULT_PROPAGATION_SECONDS, Settings};
use crate::dns::dynu::{DEFAULT_TTL, DYNU_API, Dynu};
use crate::dns::memory::MemoryZoneApi;
use crate::error::{ChallengeError, ChallengeResult};
use crate::provisioner::{CallLog, RecordProvisioner, Verb};
use crate::zone::ZoneResolver;

/// Record name used by ACME DNS-01 challenges.
pub const ACME_RECORD_NAME: &str = "_acme-challenge";

#[derive(Debug, Parser)]
#[command(name = "dynu-dns01")]
#[command(about = "ACME DNS-01 challenge records for Dynu")]
pub struct Cli {
    /// Credentials file holding `dns_dynu_auth_token = ...`
    #[arg(long, global = true, env = "DYNU_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Seconds before a single API request is abandoned
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,

    /// Never probe zones with fewer labels than this
    #[arg(long, global = true, default_value_t = 1)]
    pub min_zone_labels: usize,

    /// Dynu API root
    #[arg(long, global = true, default_value = DYNU_API)]
    pub api_base: String,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Domain and token of one challenge, as handed over by certbot's
/// manual hooks.
#[derive(Debug, Args)]
pub struct Challenge {
    /// Domain being validated
    #[arg(long, env = "CERTBOT_DOMAIN")]
    pub domain: String,

    /// Validation token to publish
    #[arg(long, env = "CERTBOT_VALIDATION")]
    pub validation: String,

    /// Record name relative to the domain
    #[arg(long, default_value = ACME_RECORD_NAME)]
    pub record_name: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Publish the challenge TXT record (certbot --manual-auth-hook)
    Auth {
        #[command(flatten)]
        challenge: Challenge,

        /// Seconds to wait for DNS propagation after publishing
        #[arg(long, default_value_t = DEFAULT_PROPAGATION_SECONDS)]
        propagation_seconds: u64,

        /// TTL of the created record
        #[arg(long, default_value_t = DEFAULT_TTL)]
        ttl: u32,
    },

    /// Remove the challenge TXT record (certbot --manual-cleanup-hook)
    Cleanup {
        #[command(flatten)]
        challenge: Challenge,
    },

    /// Print the zones that would be probed for a domain
    Candidates {
        domain: String,

        #[arg(long, default_value = ACME_RECORD_NAME)]
        record_name: String,
    },

    /// Run add and delete against an offline provider holding only
    /// the given zones, printing every call
    Simulate {
        domain: String,

        /// Zone the simulated account holds (repeatable)
        #[arg(long = "zone", required = true)]
        zones: Vec<String>,

        #[arg(long, default_value = ACME_RECORD_NAME)]
        record_name: String,

        #[arg(long, default_value = "test-validation-token")]
        validation: String,
    },
}

impl Cli {
    /// Settings derived from the global flags.
    #[must_use]
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::new()
            .timeout(Duration::from_secs(self.timeout))
            .min_zone_labels(self.min_zone_labels)
            .api_base(&self.api_base);
        if let Command::Auth {
            propagation_seconds,
            ttl,
            ..
        } = &self.command
        {
            settings = settings
                .propagation(Duration::from_secs(*propagation_seconds))
                .ttl(*ttl);
        }
        settings
    }

    /// Dispatch the parsed command, writing user-facing output to
    /// `out`.
    pub fn execute(&self, out: &mut impl Write) -> ChallengeResult<()> {
        let settings = self.settings();

        match &self.command {
            Command::Auth { challenge, .. } => self.cmd_auth(challenge, &settings, out),
            Command::Cleanup { challenge } => self.cmd_cleanup(challenge, &settings, out),
            Command::Candidates {
                domain,
                record_name,
            } => cmd_candidates(domain, record_name, &settings, out),
            Command::Simulate {
                domain,
                zones,
                record_name,
                validation,
            } => cmd_simulate(domain, zones, record_name, validation, &settings, out),
        }
    }

    fn dynu_provisioner(&self, settings: &Settings) -> ChallengeResult<RecordProvisioner<Dynu>> {
        if !cmd::command_exists("curl") {
            return Err(ChallengeError::CommandNotFound("curl".into()));
        }
        let creds = Credentials::load(self.credentials.as_deref())?;
        let dynu = Dynu::new(&creds.token)
            .api_base(&settings.api_base)
            .ttl(settings.ttl);

        Ok(RecordProvisioner::new(dynu)
            .timeout(settings.timeout)
            .resolver(ZoneResolver::new().min_zone_labels(settings.min_zone_labels)))
    }

    fn cmd_auth(
        &self,
        challenge: &Challenge,
        settings: &Settings,
        out: &mut impl Write,
    ) -> ChallengeResult<()> {
        let provisioner = self.dynu_provisioner(settings)?;
        let placed = provisioner.add_challenge_record(
            &challenge.domain,
            &challenge.record_name,
            &challenge.validation,
        )?;
        writeln!(out, "TXT record set: {} (zone {})", placed.fqdn(), placed.zone)?;

        if !settings.propagation.is_zero() {
            tracing::info!(
                seconds = settings.propagation.as_secs(),
                "waiting for DNS propagation"
            );
            thread::sleep(settings.propagation);
        }
        Ok(())
    }

    fn cmd_cleanup(
        &self,
        challenge: &Challenge,
        settings: &Settings,
        out: &mut impl Write,
    ) -> ChallengeResult<()> {
        let provisioner = self.dynu_provisioner(settings)?;
        let removed = provisioner.delete_challenge_record(
            &challenge.domain,
            &challenge.record_name,
            &challenge.validation,
        )?;
        writeln!(
            out,
            "TXT record removed: {} (zone {})",
            removed.fqdn(),
            removed.zone
        )?;
        Ok(())
    }
}

fn cmd_candidates(
    domain: &str,
    record_name: &str,
    settings: &Settings,
    out: &mut impl Write,
) -> ChallengeResult<()> {
    let resolver = ZoneResolver::new().min_zone_labels(settings.min_zone_labels);
    for candidate in resolver.candidates(domain, record_name)? {
        writeln!(
            out,
            "{}\t{}",
            candidate.zone,
            if candidate.record_name.is_empty() {
                "@"
            } else {
                &candidate.record_name
            }
        )?;
    }
    Ok(())
}

fn cmd_simulate(
    domain: &str,
    zones: &[String],
    record_name: &str,
    validation: &str,
    settings: &Settings,
    out: &mut impl Write,
) -> ChallengeResult<()> {
    let api = zones
        .iter()
        .fold(MemoryZoneApi::new(), |api, zone| api.zone(zone));
    let log = Arc::new(CallLog::new());
    let provisioner = RecordProvisioner::new(api)
        .timeout(settings.timeout)
        .resolver(ZoneResolver::new().min_zone_labels(settings.min_zone_labels))
        .recorder(Arc::clone(&log));

    let mut last = Ok(());
    for verb in [Verb::Create, Verb::Delete] {
        log.clear();
        let (step, result) = match verb {
            Verb::Create => (
                "add",
                provisioner.add_challenge_record(domain, record_name, validation),
            ),
            Verb::Delete => (
                "delete",
                provisioner.delete_challenge_record(domain, record_name, validation),
            ),
        };

        writeln!(out, "{step} {record_name} for {domain}:")?;
        for call in log.calls() {
            writeln!(out, "  {call}")?;
        }
        match result {
            Ok(placed) => writeln!(
                out,
                "  result: ok in zone {} after {} call(s)",
                placed.zone, placed.attempts
            )?,
            Err(e) => {
                writeln!(out, "  result: {e}")?;
                last = Err(e);
            }
        }
    }
    last
}

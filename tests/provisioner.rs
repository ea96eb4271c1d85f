use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dynu_dns01::CancelToken;
use dynu_dns01::dns::memory::{Failure, MemoryZoneApi};
use dynu_dns01::dns::{CallOptions, ZoneApi};
use dynu_dns01::error::{ChallengeError, ChallengeResult};
use dynu_dns01::provisioner::{Call, CallLog, Outcome, RecordProvisioner, Verb};
use dynu_dns01::zone::ZoneResolver;

const NAME: &str = "_acme-challenge";
const TOKEN: &str = "test-validation-token";

fn provisioner(api: MemoryZoneApi) -> (RecordProvisioner<MemoryZoneApi>, Arc<CallLog>) {
    let log = Arc::new(CallLog::new());
    let p = RecordProvisioner::new(api).recorder(Arc::clone(&log));
    (p, log)
}

fn zones(log: &CallLog) -> Vec<String> {
    log.calls().into_iter().map(|c| c.zone).collect()
}

#[test]
fn subdomain_uses_parent_zone() {
    let (p, log) = provisioner(MemoryZoneApi::new().zone("domain.com"));

    let placed = p.add_challenge_record("my.domain.com", NAME, TOKEN).unwrap();

    assert_eq!(placed.zone, "domain.com");
    assert_eq!(placed.record_name, "_acme-challenge.my");
    assert_eq!(placed.attempts, 2);
    assert_eq!(placed.fqdn(), "_acme-challenge.my.domain.com");

    let calls = log.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].outcome, Outcome::ZoneNotFound);
    assert_eq!(
        calls[1],
        Call {
            verb: Verb::Create,
            zone: "domain.com".into(),
            record_name: "_acme-challenge.my".into(),
            content: TOKEN.into(),
            outcome: Outcome::Ok,
        }
    );
    assert_eq!(
        p.api().records("domain.com"),
        vec![("_acme-challenge.my".to_string(), TOKEN.to_string())]
    );
}

#[test]
fn deep_subdomain_uses_apex_zone() {
    let (p, log) = provisioner(MemoryZoneApi::new().zone("domain.com"));

    let placed = p
        .add_challenge_record("api.my.domain.com", NAME, TOKEN)
        .unwrap();

    assert_eq!(placed.record_name, "_acme-challenge.api.my");
    assert_eq!(
        zones(&log),
        vec!["api.my.domain.com", "my.domain.com", "domain.com"]
    );
}

#[test]
fn apex_succeeds_first_try() {
    let (p, log) = provisioner(MemoryZoneApi::new().zone("domain.com"));

    let placed = p.add_challenge_record("domain.com", NAME, TOKEN).unwrap();

    assert_eq!(placed.record_name, NAME);
    assert_eq!(placed.attempts, 1);
    assert_eq!(log.calls().len(), 1);
}

#[test]
fn most_specific_zone_wins() {
    let (p, log) = provisioner(
        MemoryZoneApi::new()
            .zone("domain.com")
            .zone("my.domain.com"),
    );

    let placed = p
        .add_challenge_record("api.my.domain.com", NAME, TOKEN)
        .unwrap();

    assert_eq!(placed.zone, "my.domain.com");
    assert_eq!(placed.record_name, "_acme-challenge.api");
    assert_eq!(zones(&log), vec!["api.my.domain.com", "my.domain.com"]);
    assert!(p.api().records("domain.com").is_empty());
}

#[test]
fn exhaustion_reports_no_matching_zone() {
    let (p, log) = provisioner(MemoryZoneApi::new().zone("example.com"));

    let err = p.add_challenge_record("a.b.c.d", NAME, TOKEN).unwrap_err();

    assert!(matches!(
        err,
        ChallengeError::NoMatchingZone { ref fqdn, tried: 4 } if fqdn == "a.b.c.d"
    ));
    assert_eq!(zones(&log), vec!["a.b.c.d", "b.c.d", "c.d", "d"]);
    assert!(
        log.calls()
            .iter()
            .all(|c| c.outcome == Outcome::ZoneNotFound)
    );
}

#[test]
fn auth_error_stops_immediately() {
    let (p, log) = provisioner(
        MemoryZoneApi::new()
            .zone("example.org")
            .fail("sub.example.org", Failure::Auth),
    );

    let err = p
        .add_challenge_record("sub.example.org", NAME, TOKEN)
        .unwrap_err();

    assert!(matches!(err, ChallengeError::Auth(_)));
    assert_eq!(log.calls().len(), 1);
    assert!(p.api().records("example.org").is_empty());
}

#[test]
fn fatal_error_mid_walk_is_not_skipped() {
    let (p, log) = provisioner(
        MemoryZoneApi::new()
            .zone("domain.com")
            .fail("my.domain.com", Failure::RateLimited),
    );

    let err = p
        .add_challenge_record("api.my.domain.com", NAME, TOKEN)
        .unwrap_err();

    assert!(matches!(err, ChallengeError::RateLimited(_)));
    assert_eq!(zones(&log), vec!["api.my.domain.com", "my.domain.com"]);
    assert!(matches!(log.calls()[1].outcome, Outcome::Failed(_)));
}

#[test]
fn timeout_does_not_advance() {
    let (p, log) = provisioner(
        MemoryZoneApi::new()
            .zone("domain.com")
            .fail("my.domain.com", Failure::Timeout),
    );
    let p = p.timeout(Duration::from_millis(1500));

    let err = p
        .add_challenge_record("my.domain.com", NAME, TOKEN)
        .unwrap_err();

    assert!(matches!(err, ChallengeError::Timeout(t) if t == Duration::from_millis(1500)));
    assert_eq!(err.to_string(), "request timed out after 1.5s");
    assert_eq!(log.calls().len(), 1);
}

#[test]
fn delete_walks_the_same_zones() {
    let (p, log) = provisioner(MemoryZoneApi::new().zone("domain.com"));

    p.add_challenge_record("my.domain.com", NAME, TOKEN).unwrap();
    log.clear();
    let removed = p
        .delete_challenge_record("my.domain.com", NAME, TOKEN)
        .unwrap();

    assert_eq!(removed.zone, "domain.com");
    assert_eq!(removed.record_name, "_acme-challenge.my");
    let calls = log.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.verb == Verb::Delete));
    assert!(p.api().records("domain.com").is_empty());
}

#[test]
fn delete_exhaustion_reports_no_matching_zone() {
    let (p, _) = provisioner(MemoryZoneApi::new());

    let err = p
        .delete_challenge_record("my.domain.com", NAME, TOKEN)
        .unwrap_err();

    assert!(matches!(err, ChallengeError::NoMatchingZone { tried: 3, .. }));
}

#[test]
fn repeated_add_is_not_fatal() {
    let (p, _) = provisioner(MemoryZoneApi::new().zone("domain.com"));

    p.add_challenge_record("my.domain.com", NAME, TOKEN).unwrap();
    p.add_challenge_record("my.domain.com", NAME, TOKEN).unwrap();

    assert_eq!(p.api().records("domain.com").len(), 1);
}

#[test]
fn invalid_domain_makes_no_calls() {
    let (p, log) = provisioner(MemoryZoneApi::new().zone("domain.com"));

    let err = p.add_challenge_record("my..domain.com", NAME, TOKEN).unwrap_err();

    assert!(matches!(err, ChallengeError::InvalidDomain(_)));
    assert!(log.calls().is_empty());
}

#[test]
fn case_insensitive_zone_match() {
    let (p, _) = provisioner(MemoryZoneApi::new().zone("Domain.COM"));

    let placed = p.add_challenge_record("WWW.domain.com.", NAME, TOKEN).unwrap();

    assert_eq!(placed.zone, "domain.com");
    assert_eq!(placed.record_name, "_acme-challenge.www");
}

#[test]
fn floor_limits_probing() {
    let log = Arc::new(CallLog::new());
    let p = RecordProvisioner::new(MemoryZoneApi::new())
        .resolver(ZoneResolver::new().min_zone_labels(2))
        .recorder(Arc::clone(&log));

    let err = p.add_challenge_record("a.b.co.uk", NAME, TOKEN).unwrap_err();

    assert!(matches!(err, ChallengeError::NoMatchingZone { tried: 3, .. }));
    assert_eq!(zones(&log), vec!["a.b.co.uk", "b.co.uk", "co.uk"]);
}

/// Provider double that answers per zone and remembers every
/// request, including the options it was given.
#[derive(Default)]
struct Scripted {
    accept: Vec<String>,
    cancel_on_call: Option<CancelToken>,
    seen: Mutex<Vec<(String, Duration)>>,
}

impl Scripted {
    fn answer(&self, zone: &str, opts: &CallOptions) -> ChallengeResult<()> {
        self.seen
            .lock()
            .unwrap()
            .push((zone.to_string(), opts.timeout));
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        if self.accept.iter().any(|z| z == zone) {
            Ok(())
        } else {
            Err(ChallengeError::ZoneNotFound(zone.to_string()))
        }
    }
}

impl ZoneApi for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn create_txt_record(
        &self,
        zone: &str,
        _name: &str,
        _content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        self.answer(zone, opts)
    }

    fn delete_txt_record(
        &self,
        zone: &str,
        _name: &str,
        _content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        self.answer(zone, opts)
    }
}

#[test]
fn no_calls_after_success() {
    let api = Scripted {
        accept: vec!["my.domain.com".into(), "domain.com".into()],
        ..Scripted::default()
    };
    let p = RecordProvisioner::new(api);

    p.add_challenge_record("api.my.domain.com", NAME, TOKEN).unwrap();

    let seen: Vec<String> = p
        .api()
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|(z, _)| z.clone())
        .collect();
    assert_eq!(seen, vec!["api.my.domain.com", "my.domain.com"]);
}

#[test]
fn timeout_is_passed_to_every_call() {
    let p = RecordProvisioner::new(Scripted::default()).timeout(Duration::from_secs(7));

    let _ = p.add_challenge_record("a.b.c", NAME, TOKEN);

    let seen = p.api().seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(_, t)| *t == Duration::from_secs(7)));
}

#[test]
fn cancel_stops_before_next_candidate() {
    let token = CancelToken::new();
    let api = Scripted {
        cancel_on_call: Some(token.clone()),
        ..Scripted::default()
    };
    let p = RecordProvisioner::new(api).cancel_token(token);

    let err = p
        .add_challenge_record("api.my.domain.com", NAME, TOKEN)
        .unwrap_err();

    assert!(matches!(err, ChallengeError::Cancelled));
    assert_eq!(p.api().seen.lock().unwrap().len(), 1);
}

#[test]
fn boxed_api_works_as_provider() {
    let api: Box<dyn ZoneApi> = Box::new(MemoryZoneApi::new().zone("domain.com"));
    let p = RecordProvisioner::new(api);

    let placed = p.add_challenge_record("my.domain.com", NAME, TOKEN).unwrap();
    assert_eq!(placed.zone, "domain.com");
}

#[test]
fn providers_run_concurrently() {
    let p = Arc::new(RecordProvisioner::new(
        MemoryZoneApi::new().zone("domain.com").zone("example.org"),
    ));

    let handles: Vec<_> = ["a.domain.com", "b.example.org", "c.d.domain.com"]
        .into_iter()
        .map(|fqdn| {
            let p = Arc::clone(&p);
            std::thread::spawn(move || p.add_challenge_record(fqdn, NAME, TOKEN))
        })
        .collect();

    let results: HashMap<String, String> = handles
        .into_iter()
        .map(|h| {
            let placed = h.join().unwrap().unwrap();
            (placed.record_name, placed.zone)
        })
        .collect();

    assert_eq!(results["_acme-challenge.a"], "domain.com");
    assert_eq!(results["_acme-challenge.b"], "example.org");
    assert_eq!(results["_acme-challenge.c.d"], "domain.com");
}

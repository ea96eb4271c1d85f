use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::cmd;
use crate::dns::{self, CallOptions, ZoneApi};
use crate::error::{ChallengeError, ChallengeResult};

pub const DYNU_API: &str = "https://api.dynu.com/v2";

/// Default TTL of challenge records, in seconds.
pub const DEFAULT_TTL: u32 = 60;

/// curl exit code for an expired `--max-time`.
const CURL_TIMEOUT: i32 = 28;

/// Dynu DNS provider using the Dynu REST API via curl.
///
/// The API key is fed to curl on stdin so it never shows up in the
/// process list.
#[derive(Clone)]
pub struct Dynu {
    token: String,
    api_base: String,
    ttl: u32,
}

impl std::fmt::Debug for Dynu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dynu")
            .field("token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// A zone as listed by `GET /dns`.
#[derive(Debug, Clone, Deserialize)]
pub struct DynuDomain {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct DomainList {
    #[serde(default)]
    domains: Vec<DynuDomain>,
}

/// A record as listed by `GET /dns/{id}/record`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynuRecord {
    pub id: u64,
    #[serde(default)]
    pub node_name: String,
    pub record_type: String,
    #[serde(default)]
    pub text_data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordList {
    #[serde(default)]
    dns_records: Vec<DynuRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewTxtRecord<'a> {
    node_name: &'a str,
    record_type: &'static str,
    text_data: &'a str,
    ttl: u32,
    state: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

impl Dynu {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            api_base: DYNU_API.to_string(),
            ttl: DEFAULT_TTL,
        }
    }

    /// Point at another API root, e.g. a local mock server.
    #[must_use]
    pub fn api_base(mut self, url: &str) -> Self {
        self.api_base = url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Make an API request via curl and return the response body of
    /// a 2xx answer.
    ///
    /// curl only gets the time left until `deadline`, so every request
    /// made for one verb shares the caller's timeout.
    fn api_request(
        &self,
        method: &str,
        path: &str,
        body: Option<&str>,
        opts: &CallOptions,
        deadline: Instant,
    ) -> ChallengeResult<String> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ChallengeError::Timeout(opts.timeout));
        }

        let url = format!("{}{path}", self.api_base);
        // curl treats 0 as "no limit".
        let max_time = format!("{:.3}", remaining.as_secs_f64().max(0.001));

        let mut args = vec![
            "-s",
            "-S",
            "--max-time",
            max_time.as_str(),
            "-X",
            method,
            "-H",
            "@-",
            "-H",
            "Accept: application/json",
            "-w",
            "\n%{http_code}",
        ];
        if let Some(b) = body {
            args.extend(["-H", "Content-Type: application/json", "-d", b]);
        }
        args.push(url.as_str());

        tracing::debug!(%method, %url, "dynu request");
        let headers = format!("API-Key: {}\n", self.token);
        let output = cmd::run_cancellable("curl", &args, headers.as_bytes(), &opts.cancel)?;

        match output.status.code() {
            Some(0) => {}
            Some(CURL_TIMEOUT) => return Err(ChallengeError::Timeout(opts.timeout)),
            _ => {
                return Err(ChallengeError::Transport(format!(
                    "curl {method} {url}: {}",
                    output.stderr.trim()
                )));
            }
        }

        let (body, status) = split_status(&output.stdout)?;
        classify_response(status, body)
    }

    fn list_domains(
        &self,
        opts: &CallOptions,
        deadline: Instant,
    ) -> ChallengeResult<Vec<DynuDomain>> {
        let response = self.api_request("GET", "/dns", None, opts, deadline)?;
        let parsed: DomainList = serde_json::from_str(&response)?;
        Ok(parsed.domains)
    }

    fn zone_id(&self, zone: &str, opts: &CallOptions, deadline: Instant) -> ChallengeResult<u64> {
        let domains = self.list_domains(opts, deadline)?;
        find_zone(&domains, zone).ok_or_else(|| ChallengeError::ZoneNotFound(zone.to_string()))
    }

    fn list_records(
        &self,
        zone_id: u64,
        opts: &CallOptions,
        deadline: Instant,
    ) -> ChallengeResult<Vec<DynuRecord>> {
        let path = format!("/dns/{zone_id}/record");
        let response = self.api_request("GET", &path, None, opts, deadline)?;
        let parsed: RecordList = serde_json::from_str(&response)?;
        Ok(parsed.dns_records)
    }
}

impl ZoneApi for Dynu {
    fn name(&self) -> &'static str {
        "Dynu"
    }

    fn create_txt_record(
        &self,
        zone: &str,
        name: &str,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        let deadline = opts.deadline();
        let zone_id = self.zone_id(zone, opts, deadline)?;
        let existing = self.list_records(zone_id, opts, deadline)?;

        if !matching_txt_records(&existing, name, content).is_empty() {
            tracing::info!(
                record = %dns::absolute_name(name, zone),
                "TXT record already present"
            );
            return Ok(());
        }

        let body = serde_json::to_string(&NewTxtRecord {
            node_name: name,
            record_type: "TXT",
            text_data: content,
            ttl: self.ttl,
            state: true,
        })?;
        self.api_request(
            "POST",
            &format!("/dns/{zone_id}/record"),
            Some(&body),
            opts,
            deadline,
        )?;

        tracing::info!(record = %dns::absolute_name(name, zone), "TXT record created");
        Ok(())
    }

    fn delete_txt_record(
        &self,
        zone: &str,
        name: &str,
        content: &str,
        opts: &CallOptions,
    ) -> ChallengeResult<()> {
        let deadline = opts.deadline();
        let zone_id = self.zone_id(zone, opts, deadline)?;
        let existing = self.list_records(zone_id, opts, deadline)?;
        let ids = matching_txt_records(&existing, name, content);

        if ids.is_empty() {
            tracing::info!(
                record = %dns::absolute_name(name, zone),
                "no TXT record to delete"
            );
            return Ok(());
        }

        for record_id in ids {
            self.api_request(
                "DELETE",
                &format!("/dns/{zone_id}/record/{record_id}"),
                None,
                opts,
                deadline,
            )?;
            tracing::info!(
                record = %dns::absolute_name(name, zone),
                id = record_id,
                "TXT record deleted"
            );
        }
        Ok(())
    }
}

/// Split curl's `-w "\n%{http_code}"` trailer off the body.
pub fn split_status(stdout: &str) -> ChallengeResult<(&str, u16)> {
    let (body, code) = stdout.rsplit_once('\n').unwrap_or(("", stdout));
    let status = code.trim().parse::<u16>().map_err(|_| {
        ChallengeError::Transport(format!("unreadable HTTP status '{}'", code.trim()))
    })?;
    Ok((body, status))
}

/// Map an HTTP status and body to the error taxonomy.
pub fn classify_response(status: u16, body: &str) -> ChallengeResult<String> {
    if (200..300).contains(&status) {
        return Ok(body.to_string());
    }

    let detail = serde_json::from_str::<ApiError>(body)
        .ok()
        .and_then(|e| match (e.kind, e.message) {
            (Some(k), Some(m)) => Some(format!("{k}: {m}")),
            (None, Some(m)) => Some(m),
            (Some(k), None) => Some(k),
            (None, None) => None,
        })
        .unwrap_or_else(|| body.trim().to_string());
    let detail = format!("HTTP {status}: {detail}");

    Err(match status {
        0 => ChallengeError::Transport("no response from server".into()),
        401 | 403 => ChallengeError::Auth(detail),
        429 => ChallengeError::RateLimited(detail),
        _ => ChallengeError::Transport(detail),
    })
}

/// Find the id of the zone named exactly `zone`.
#[must_use]
pub fn find_zone(domains: &[DynuDomain], zone: &str) -> Option<u64> {
    let zone = zone.trim_end_matches('.');
    domains
        .iter()
        .find(|d| d.name.trim_end_matches('.').eq_ignore_ascii_case(zone))
        .map(|d| d.id)
}

/// Ids of TXT records named `name` holding `content`.
#[must_use]
pub fn matching_txt_records(records: &[DynuRecord], name: &str, content: &str) -> Vec<u64> {
    records
        .iter()
        .filter(|r| {
            r.record_type.eq_ignore_ascii_case("TXT")
                && r.node_name.eq_ignore_ascii_case(name)
                && r.text_data == content
        })
        .map(|r| r.id)
        .collect()
}

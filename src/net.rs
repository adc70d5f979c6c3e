use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::model::{parse_poll, ApiAircraft};
use crate::plans::AmendRequest;
use tracing::{debug, error, info, warn};

/// One poll attempt. Generations increase per attempt, successful or not, so
/// the refresh cycle can refuse anything older than what it committed.
#[derive(Debug)]
pub struct FetchOutcome {
    pub generation: u64,
    pub result: Result<Vec<ApiAircraft>, String>,
    pub rejected: usize,
}

impl FetchOutcome {
    pub fn ok(generation: u64, records: Vec<ApiAircraft>) -> Self {
        Self {
            generation,
            result: Ok(records),
            rejected: 0,
        }
    }

    pub fn err(generation: u64, message: impl Into<String>) -> Self {
        Self {
            generation,
            result: Err(message.into()),
            rejected: 0,
        }
    }
}

#[derive(Clone, Debug)]
struct SourceState {
    url: String,
    attempts: u32,
    backoff_until: Option<Instant>,
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Optional API key sent as a custom header on every backend request.
#[derive(Clone, Debug, Default)]
pub struct ApiAuth {
    pub key: Option<String>,
    pub header: Option<String>,
}

impl ApiAuth {
    fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        match (self.key.as_deref(), self.header.as_deref()) {
            (Some(key), Some(header)) if !key.trim().is_empty() && !header.trim().is_empty() => {
                req.header(header.trim(), key.trim())
            }
            _ => req,
        }
    }
}

pub(crate) fn http_client(insecure: bool, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .danger_accept_invalid_certs(insecure)
        .timeout(timeout)
        .build()
}

pub fn spawn_fetcher(
    urls: Vec<String>,
    refresh: Duration,
    insecure: bool,
    auth: ApiAuth,
    tx: Sender<FetchOutcome>,
) {
    thread::spawn(move || {
        info!("entry poller started");
        let mut generation = 0u64;
        let mut sources: Vec<SourceState> = urls
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .map(|url| SourceState {
                url,
                attempts: 0,
                backoff_until: None,
            })
            .collect();
        if sources.is_empty() {
            let _ = tx.send(FetchOutcome::err(1, "No entry URLs configured"));
            return;
        }
        let client = match http_client(insecure, REQUEST_TIMEOUT) {
            Ok(client) => client,
            Err(err) => {
                error!("client error: {err}");
                let _ = tx.send(FetchOutcome::err(1, format!("Client error: {err}")));
                return;
            }
        };

        let sleep = if refresh.is_zero() {
            Duration::from_millis(200)
        } else {
            refresh
        };

        let mut current = 0usize;
        loop {
            let now = Instant::now();
            generation += 1;

            // Skip sources still backing off.
            let mut checked = 0usize;
            while checked < sources.len()
                && sources
                    .get(current)
                    .and_then(|s| s.backoff_until)
                    .is_some_and(|until| until > now)
            {
                current = (current + 1) % sources.len();
                checked += 1;
            }

            let src = &mut sources[current];
            let outcome = match fetch_once(&client, &src.url, &auth) {
                FetchResult::Ok(body) => match parse_poll(body) {
                    Ok((records, rejected)) => {
                        src.attempts = 0;
                        src.backoff_until = None;
                        if rejected > 0 {
                            debug!("{rejected} malformed records in poll {generation}");
                        }
                        FetchOutcome {
                            generation,
                            result: Ok(records),
                            rejected,
                        }
                    }
                    Err(message) => FetchOutcome::err(generation, message),
                },
                FetchResult::Err {
                    message,
                    retry_after,
                } => {
                    src.attempts = src.attempts.saturating_add(1);
                    let backoff = retry_after.unwrap_or_else(|| backoff_duration(src.attempts));
                    src.backoff_until = Some(now + backoff);
                    if sources.len() > 1 {
                        current = (current + 1) % sources.len();
                        debug!(
                            "switching to source {} (backoff {:?})",
                            sources[current].url, backoff
                        );
                    }
                    FetchOutcome::err(generation, message)
                }
            };

            if tx.send(outcome).is_err() {
                debug!("receiver dropped, exiting poller");
                break;
            }
            thread::sleep(sleep);
        }
    });
}

fn fetch_once(client: &Client, url: &str, auth: &ApiAuth) -> FetchResult {
    let resp = match auth.apply(client.get(url)).send() {
        Ok(resp) => resp,
        Err(err) => {
            return FetchResult::Err {
                message: err.to_string(),
                retry_after: None,
            }
        }
    };

    let status = resp.status();
    if !status.is_success() {
        let retry_after = retry_after_header(resp.headers());
        return FetchResult::Err {
            message: format!("HTTP {}", status),
            retry_after,
        };
    }

    match resp.json::<Value>() {
        Ok(body) => FetchResult::Ok(body),
        Err(err) => FetchResult::Err {
            message: err.to_string(),
            retry_after: None,
        },
    }
}

#[derive(Debug)]
enum FetchResult {
    Ok(Value),
    Err {
        message: String,
        retry_after: Option<Duration>,
    },
}

fn retry_after_header(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after_value)
}

fn parse_retry_after_value(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// 1 s doubling per failed attempt, capped at 60 s, plus under a second of
/// per-attempt spread.
fn backoff_duration(attempts: u32) -> Duration {
    match attempts {
        0 => Duration::ZERO,
        n => {
            let secs = (1u64 << (n - 1).min(6)).min(60);
            let spread = Duration::from_millis(u64::from(n) * 173 % 1000);
            Duration::from_secs(secs).saturating_add(spread)
        }
    }
}

/// Live-amend writer: POSTs each request's flight plan to `amend_url`.
pub fn spawn_amend_sender(
    amend_url: String,
    insecure: bool,
    auth: ApiAuth,
    rx: Receiver<AmendRequest>,
) {
    thread::spawn(move || {
        info!("amend sender started");
        let Ok(client) = http_client(insecure, REQUEST_TIMEOUT)
            .inspect_err(|err| error!("amend client error: {err}"))
        else {
            return;
        };
        while let Ok(request) = rx.recv() {
            match post_amendment(&client, &amend_url, &auth, &request) {
                Ok(()) => info!("amended {} (cid {})", request.aircraft_id, request.cid),
                Err(err) => warn!("amend of {} failed: {err}", request.aircraft_id),
            }
        }
        debug!("amend channel closed, exiting sender");
    });
}

fn post_amendment(
    client: &Client,
    url: &str,
    auth: &ApiAuth,
    request: &AmendRequest,
) -> Result<(), String> {
    let resp = auth
        .apply(client.post(url).json(request))
        .send()
        .map_err(|err| err.to_string())?;
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(format!("HTTP {}", status))
    }
}

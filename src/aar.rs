use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::model::AarProcedure;
use crate::net::http_client;

#[derive(Clone, Debug)]
pub enum AarMessage {
    Loaded {
        cid: u64,
        procedures: Vec<AarProcedure>,
    },
    Failed {
        cid: u64,
        error: String,
    },
}

/// AAR candidate lists fetched so far, keyed by cid, plus the cids with a
/// request in flight. Read by derivation, filled by the fetcher thread.
#[derive(Debug, Default)]
pub struct AarCache {
    lists: HashMap<u64, Vec<AarProcedure>>,
    pending: HashSet<u64>,
}

impl AarCache {
    pub fn get(&self, cid: u64) -> Option<&Vec<AarProcedure>> {
        self.lists.get(&cid)
    }

    pub fn is_pending(&self, cid: u64) -> bool {
        self.pending.contains(&cid)
    }

    /// Marks `cid` as requested. Returns false when already cached or pending.
    pub fn mark_pending(&mut self, cid: u64) -> bool {
        if self.lists.contains_key(&cid) {
            return false;
        }
        self.pending.insert(cid)
    }

    /// Drops the pending mark for a request that never reached the fetcher,
    /// so a later tick asks again.
    pub fn unmark(&mut self, cid: u64) -> bool {
        self.pending.remove(&cid)
    }

    pub fn apply(&mut self, message: AarMessage) {
        match message {
            AarMessage::Loaded { cid, procedures } => {
                debug!("aar list for cid {cid}: {} procedures", procedures.len());
                self.pending.remove(&cid);
                self.lists.insert(cid, procedures);
            }
            AarMessage::Failed { cid, error } => {
                warn!("aar fetch failed for cid {cid}: {error}");
                // cleared so the next tick asks again if the entry still lacks a list
                self.pending.remove(&cid);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

pub fn spawn_aar_fetcher(
    base_url: String,
    artcc_id: String,
    insecure: bool,
    timeout: Duration,
    tx: Sender<AarMessage>,
    rx: Receiver<Vec<u64>>,
) {
    thread::spawn(move || {
        info!("aar fetcher started");
        let client = match http_client(insecure, timeout) {
            Ok(client) => client,
            Err(err) => {
                error!("aar client error: {err}");
                return;
            }
        };

        while let Ok(batch) = rx.recv() {
            for cid in batch {
                let message = match fetch_aar(&client, &base_url, &artcc_id, cid) {
                    Ok(procedures) => AarMessage::Loaded { cid, procedures },
                    Err(error) => AarMessage::Failed { cid, error },
                };
                if tx.send(message).is_err() {
                    debug!("receiver dropped, exiting aar fetcher");
                    return;
                }
            }
        }
    });
}

fn fetch_aar(
    client: &reqwest::blocking::Client,
    base_url: &str,
    artcc_id: &str,
    cid: u64,
) -> Result<Vec<AarProcedure>, String> {
    let url = format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        artcc_id.trim().to_ascii_lowercase(),
        cid
    );
    let resp = client.get(url).send().map_err(|err| err.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("AAR HTTP {}", status));
    }
    let body: Value = resp.json().map_err(|err| err.to_string())?;
    Ok(parse_aar_list(body))
}

fn parse_aar_list(body: Value) -> Vec<AarProcedure> {
    let array = match &body {
        Value::Array(array) => array.as_slice(),
        Value::Object(obj) => ["aars", "aar_list", "data", "results"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(|v| v.as_array()))
            .map(|v| v.as_slice())
            .unwrap_or(&[]),
        _ => &[],
    };
    array.iter().filter_map(parse_aar_object).collect()
}

fn parse_aar_object(value: &Value) -> Option<AarProcedure> {
    let obj = value.as_object()?;
    let aar_id = extract_string(obj, &["aarId", "aar_id", "procedureId", "id"])?;
    Some(AarProcedure {
        aar_id,
        triggered_fix: extract_string(obj, &["triggeredFix", "tfix", "triggered_fix"])
            .unwrap_or_default(),
        amendment: extract_string(obj, &["amendment", "aar_amendment"]).unwrap_or_default(),
        route: extract_string(obj, &["route", "aar_route", "truncatedRoute"]).unwrap_or_default(),
    })
}

fn extract_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = map.get(*key) {
            if let Some(text) = value.as_str() {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

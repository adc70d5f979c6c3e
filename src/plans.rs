use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::mpsc::Sender;
use tracing::debug;

use crate::model::{Entry, Flightplan};

pub const DEFAULT_PLAN_TTL_SECS: u64 = 120;

/// A proposed amendment held client-side until the controller acts on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub cid: u64,
    pub aircraft_id: String,
    pub command_string: String,
    pub amended_flightplan: Flightplan,
    pub expiration_time: DateTime<Utc>,
}

impl Plan {
    pub fn trial(
        entry: &Entry,
        amended: Flightplan,
        frd: &str,
        ttl: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let command_string =
            amendment_command(&entry.aircraft_id, frd, &amended.route, &amended.destination);
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::seconds(120));
        Self {
            cid: entry.cid,
            aircraft_id: entry.aircraft_id.clone(),
            command_string,
            amended_flightplan: amended,
            expiration_time: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time <= now
    }
}

/// `AM <id> FIX <frd> TIM EXX00 RTE <route><destination>`
pub fn amendment_command(aircraft_id: &str, frd: &str, route: &str, destination: &str) -> String {
    format!(
        "AM {} FIX {} TIM EXX00 RTE {}{}",
        aircraft_id.trim(),
        frd.trim(),
        route.trim(),
        destination.trim()
    )
}

/// Whole seconds left before `expiration`, never negative.
pub fn remaining_secs(expiration: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (expiration - now).num_seconds().max(0) as u64
}

/// `m:ss`, clamped at `0:00` once expired.
pub fn format_time(expiration: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = remaining_secs(expiration, now);
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Insertion-ordered queue of trial plans with a single selected row.
#[derive(Debug, Clone, Default)]
pub struct PlanQueue {
    plans: Vec<Plan>,
    selected: Option<usize>,
}

impl PlanQueue {
    pub fn enqueue(&mut self, plan: Plan) {
        debug!("trial plan queued: {}", plan.command_string);
        self.plans.push(plan);
    }

    /// Out-of-range indices are ignored. The selection follows its row or is
    /// cleared when that row goes away.
    pub fn remove(&mut self, index: usize) -> Option<Plan> {
        if index >= self.plans.len() {
            return None;
        }
        let plan = self.plans.remove(index);
        self.selected = match self.selected {
            Some(sel) if sel == index => None,
            Some(sel) if sel > index => Some(sel - 1),
            other => other,
        };
        Some(plan)
    }

    /// Returns false when the index is out of range; the selection is unchanged.
    pub fn set_selected(&mut self, index: Option<usize>) -> bool {
        match index {
            Some(i) if i >= self.plans.len() => false,
            _ => {
                self.selected = index;
                true
            }
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_plan(&self) -> Option<&Plan> {
        self.selected.and_then(|i| self.plans.get(i))
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn remaining(&self, index: usize, now: DateTime<Utc>) -> Option<String> {
        self.plans
            .get(index)
            .map(|plan| format_time(plan.expiration_time, now))
    }

    pub fn expired(&self, now: DateTime<Utc>) -> Vec<usize> {
        self.plans
            .iter()
            .enumerate()
            .filter(|(_, plan)| plan.is_expired(now))
            .map(|(i, _)| i)
            .collect()
    }

    /// Drops expired plans; returns how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired = self.expired(now);
        for index in expired.iter().rev() {
            self.remove(*index);
        }
        expired.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmendMode {
    Trial,
    Amend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendRequest {
    pub cid: u64,
    pub aircraft_id: String,
    pub flightplan: Flightplan,
}

/// Live-amend path: hands an amended flight plan to the backend writer.
pub trait AmendSink {
    fn amend(&mut self, request: AmendRequest) -> Result<(), String>;
}

/// Forwards requests to the amend sender thread.
#[derive(Debug, Clone)]
pub struct ChannelAmendSink {
    tx: Sender<AmendRequest>,
}

impl ChannelAmendSink {
    pub fn new(tx: Sender<AmendRequest>) -> Self {
        Self { tx }
    }
}

impl AmendSink for ChannelAmendSink {
    fn amend(&mut self, request: AmendRequest) -> Result<(), String> {
        self.tx
            .send(request)
            .map_err(|_| "amend sender stopped".to_string())
    }
}

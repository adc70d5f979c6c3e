use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::mpsc::{Receiver, SendError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::aar::AarMessage;
use crate::model::Flightplan;
use crate::net::FetchOutcome;
use crate::plans::{AmendMode, AmendRequest, AmendSink, ChannelAmendSink};
use crate::refresh::RefreshCycle;
use crate::shared::Envelope;
use crate::store::{AmendError, StateStore};

struct NoAmendEndpoint;

impl AmendSink for NoAmendEndpoint {
    fn amend(&mut self, _request: AmendRequest) -> Result<(), String> {
        Err("no amend endpoint configured".to_string())
    }
}

/// Receivers and senders linking the runtime loop to its worker threads.
pub struct Channels {
    pub fetch_rx: Receiver<FetchOutcome>,
    pub aar_rx: Option<Receiver<AarMessage>>,
    pub aar_req_tx: Option<Sender<Vec<u64>>>,
    pub peer_rx: Option<Receiver<Envelope>>,
    pub amend_tx: Option<Sender<AmendRequest>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub ticks: usize,
    pub aar_updates: usize,
    pub remote_events: usize,
    pub pruned_plans: usize,
}

pub struct Runtime {
    store: StateStore,
    refresh: RefreshCycle,
    channels: Channels,
    amend: Option<ChannelAmendSink>,
    auto_expire_plans: bool,
    status_every: Option<Duration>,
    last_status: Instant,
}

impl Runtime {
    pub fn new(store: StateStore, refresh: RefreshCycle, channels: Channels) -> Self {
        let amend = channels.amend_tx.clone().map(ChannelAmendSink::new);
        Self {
            store,
            refresh,
            channels,
            amend,
            auto_expire_plans: false,
            status_every: None,
            last_status: Instant::now(),
        }
    }

    pub fn with_auto_expire(mut self, enabled: bool) -> Self {
        self.auto_expire_plans = enabled;
        self
    }

    /// Zero disables the periodic status line.
    pub fn with_status_interval(mut self, every: Duration) -> Self {
        self.status_every = (!every.is_zero()).then_some(every);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut StateStore {
        &mut self.store
    }

    pub fn refresh(&self) -> &RefreshCycle {
        &self.refresh
    }

    /// Drains every channel without blocking. Errors only when the entry
    /// poller has gone away.
    pub fn pump(&mut self) -> Result<PumpStats> {
        let mut stats = PumpStats::default();

        if let Some(rx) = &self.channels.aar_rx {
            while let Ok(message) = rx.try_recv() {
                self.refresh.apply_aar(message);
                stats.aar_updates += 1;
            }
        }

        loop {
            match self.channels.fetch_rx.try_recv() {
                Ok(outcome) => {
                    stats.ticks += 1;
                    if let Some(report) = self.refresh.tick(&mut self.store, outcome) {
                        if !report.aar_requests.is_empty() {
                            self.request_aar(report.aar_requests);
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(anyhow!("entry poller stopped"));
                }
            }
        }

        if let Some(rx) = &self.channels.peer_rx {
            while let Ok(envelope) = rx.try_recv() {
                if self.store.apply_remote(envelope) {
                    stats.remote_events += 1;
                }
            }
        }

        if self.auto_expire_plans {
            stats.pruned_plans = self.store.prune_expired_plans(Utc::now());
        }

        if let Some(every) = self.status_every {
            if self.last_status.elapsed() >= every {
                self.log_status();
                self.last_status = Instant::now();
            }
        }
        Ok(stats)
    }

    fn request_aar(&mut self, cids: Vec<u64>) {
        let undelivered = match &self.channels.aar_req_tx {
            Some(tx) => match tx.send(cids) {
                Ok(()) => return,
                Err(SendError(cids)) => {
                    warn!("aar fetcher stopped; {} requests will be retried", cids.len());
                    cids
                }
            },
            None => cids,
        };
        self.refresh.release_aar(&undelivered);
    }

    pub fn run(mut self, tick_rate: Duration) -> Result<()> {
        info!("runtime loop started");
        loop {
            let stats = self.pump()?;
            if stats != PumpStats::default() {
                debug!("pump: {stats:?}");
            }
            thread::sleep(tick_rate);
        }
    }

    /// Live amendments go to the amend sender; trial plans stay local.
    pub fn commit_amendment(
        &mut self,
        mode: AmendMode,
        aircraft_id: &str,
        amended: Flightplan,
    ) -> Result<(), AmendError> {
        let now = Utc::now();
        match self.amend.as_mut() {
            Some(sink) => self
                .store
                .commit_amendment(mode, aircraft_id, amended, sink, now),
            None => self
                .store
                .commit_amendment(mode, aircraft_id, amended, &mut NoAmendEndpoint, now),
        }
    }

    pub fn status_line(&self) -> String {
        let store = &self.store;
        let last_commit = store
            .last_commit()
            .map(|at| at.format("%H:%M:%SZ").to_string())
            .unwrap_or_else(|| "never".to_string());
        let sharing = if store.bus().is_attached() { "on" } else { "off" };
        format!(
            "generation {} (committed {last_commit}) | entries {} | acl {} | dep {} | plans {} | aar cached {} | sharing {sharing} | last error {}",
            store.generation(),
            store.entries().len(),
            store.acl_entries().len(),
            store.dep_entries().len(),
            store.plans().len(),
            self.refresh.aar().len(),
            store.last_error().unwrap_or("none"),
        )
    }

    fn log_status(&self) {
        info!("{}", self.status_line());
    }
}

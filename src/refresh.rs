//! Refresh tick: derive every polled record against the committed table in
//! parallel, build the next table off to the side, then swap it in.

use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::aar::{AarCache, AarMessage};
use crate::derive::{derive_entry, DerivationContext, Derived, DeriveError};
use crate::filters::ListFilters;
use crate::model::EntryTable;
use crate::net::FetchOutcome;
use crate::store::StateStore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub generation: u64,
    pub derived: usize,
    /// Records dropped by the poll parser or by derivation.
    pub skipped: usize,
    /// Entries kept although the poll did not return them.
    pub carried: usize,
    pub evicted: usize,
    /// cids newly queued for an AAR fetch.
    pub aar_requests: Vec<u64>,
}

pub struct RefreshCycle {
    filters: Box<dyn ListFilters>,
    evict_after_polls: u32,
    aar: AarCache,
}

impl RefreshCycle {
    /// `evict_after_polls == 0` keeps absent entries forever.
    pub fn new(filters: Box<dyn ListFilters>, evict_after_polls: u32) -> Self {
        Self {
            filters,
            evict_after_polls,
            aar: AarCache::default(),
        }
    }

    pub fn aar(&self) -> &AarCache {
        &self.aar
    }

    pub fn apply_aar(&mut self, message: AarMessage) {
        self.aar.apply(message);
    }

    /// Returns undelivered AAR requests to the unrequested state.
    pub fn release_aar(&mut self, cids: &[u64]) {
        for cid in cids {
            self.aar.unmark(*cid);
        }
    }

    /// Returns `None` when nothing was committed: a stale generation or a
    /// failed fetch.
    pub fn tick(&mut self, store: &mut StateStore, outcome: FetchOutcome) -> Option<TickReport> {
        let generation = outcome.generation;
        if generation <= store.generation() {
            debug!(
                "dropping stale poll {generation} (committed {})",
                store.generation()
            );
            return None;
        }
        let records = match outcome.result {
            Ok(records) => records,
            Err(err) => {
                warn!("poll {generation} failed: {err}");
                store.set_fetch_error(err);
                return None;
            }
        };

        let committed = store.entries();
        let results: Vec<Result<Derived, DeriveError>> = {
            let ctx = DerivationContext::from_sectors(store.sectors());
            let filters = self.filters.as_ref();
            let aar = &self.aar;
            records
                .par_iter()
                .map(|raw| {
                    let current = raw.key().and_then(|key| committed.get(&key));
                    derive_entry(raw, current, &ctx, filters, aar)
                })
                .collect()
        };

        let mut report = TickReport {
            generation,
            skipped: outcome.rejected,
            ..TickReport::default()
        };
        let mut next: EntryTable = (*committed).clone();
        let mut seen: HashSet<String> = HashSet::with_capacity(results.len());
        let mut wants_aar: Vec<u64> = Vec::new();
        for result in results {
            match result {
                Ok(derived) => {
                    if derived.position_missing {
                        debug!("{} has no position this poll", derived.entry.aircraft_id);
                    }
                    if derived.needs_aar {
                        wants_aar.push(derived.entry.cid);
                    }
                    seen.insert(derived.entry.aircraft_id.clone());
                    next.insert(derived.entry.aircraft_id.clone(), derived.entry);
                    report.derived += 1;
                }
                Err(err) => {
                    debug!("skipping record: {err}");
                    if let Some(id) = err.aircraft_id() {
                        seen.insert(id.to_string());
                    }
                    report.skipped += 1;
                }
            }
        }

        let limit = self.evict_after_polls;
        next.retain(|id, entry| {
            if seen.contains(id) {
                return true;
            }
            entry.missed_polls = entry.missed_polls.saturating_add(1);
            if limit > 0 && entry.missed_polls > limit {
                debug!("evicting {id} after {} missed polls", entry.missed_polls);
                report.evicted += 1;
                false
            } else {
                report.carried += 1;
                true
            }
        });

        if !store.commit_entries(next, generation) {
            return None;
        }

        for cid in wants_aar {
            if self.aar.mark_pending(cid) {
                report.aar_requests.push(cid);
            }
        }
        info!(
            "poll {generation}: {} derived, {} skipped, {} carried, {} evicted",
            report.derived, report.skipped, report.carried, report.evicted
        );
        Some(report)
    }
}

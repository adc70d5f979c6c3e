//! The single owner of committed state: the entry table, window/selection
//! state, the trial plan queue and the shared UI bus. All mutation goes
//! through the methods here.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{AckStatus, Entry, EntryTable, Flightplan};
use crate::plans::{AmendMode, AmendRequest, AmendSink, Plan, PlanQueue, DEFAULT_PLAN_TTL_SECS};
use crate::sectors::SectorData;
use crate::shared::{Broadcast, Envelope, SharedUiBus, SharedUiEvent};
use crate::windows::{
    AppWindow, Asel, EdstWindow, OutageEntry, RouteMenuState, WindowPosition, WindowState,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmendError {
    #[error("no entry for {0}")]
    UnknownAircraft(String),
    #[error("amend rejected: {0}")]
    Sink(String),
}

/// Partial update applied by `update_entry`; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub route: Option<String>,
    pub altitude: Option<String>,
    pub equipment: Option<String>,
    pub aircraft_type: Option<String>,
    pub destination: Option<String>,
    pub spa: Option<bool>,
}

#[derive(Debug)]
pub struct StateStore {
    entries: Arc<EntryTable>,
    generation: u64,
    last_error: Option<String>,
    last_commit: Option<DateTime<Utc>>,
    sectors: SectorData,
    ui: WindowState,
    plans: PlanQueue,
    bus: SharedUiBus,
    plan_ttl: Duration,
}

impl StateStore {
    pub fn new(sectors: SectorData, bus: SharedUiBus) -> Self {
        Self {
            entries: Arc::new(EntryTable::new()),
            generation: 0,
            last_error: None,
            last_commit: None,
            sectors,
            ui: WindowState::new(),
            plans: PlanQueue::default(),
            bus,
            plan_ttl: Duration::from_secs(DEFAULT_PLAN_TTL_SECS),
        }
    }

    pub fn with_plan_ttl(mut self, ttl: Duration) -> Self {
        self.plan_ttl = ttl;
        self
    }

    // ---- entries ----

    /// Committed table snapshot. Cheap to clone and never mutated in place by
    /// a refresh.
    pub fn entries(&self) -> Arc<EntryTable> {
        Arc::clone(&self.entries)
    }

    pub fn entry(&self, aircraft_id: &str) -> Option<&Entry> {
        self.entries.get(aircraft_id)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_commit(&self) -> Option<DateTime<Utc>> {
        self.last_commit
    }

    pub fn set_fetch_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Swaps in a fully built table. Stale generations are refused.
    pub fn commit_entries(&mut self, table: EntryTable, generation: u64) -> bool {
        if generation <= self.generation {
            debug!(
                "refusing commit of generation {generation} (have {})",
                self.generation
            );
            return false;
        }
        self.entries = Arc::new(table);
        self.generation = generation;
        self.last_error = None;
        self.last_commit = Some(Utc::now());
        true
    }

    /// Entries shown on the aircraft list, sorted by aircraft id.
    pub fn acl_entries(&self) -> Vec<&Entry> {
        self.sorted_entries(|e| e.acl_display)
    }

    pub fn dep_entries(&self) -> Vec<&Entry> {
        self.sorted_entries(|e| e.dep_display)
    }

    fn sorted_entries(&self, keep: impl Fn(&Entry) -> bool) -> Vec<&Entry> {
        let mut list: Vec<&Entry> = self.entries.values().filter(|e| keep(e)).collect();
        list.sort_by(|a, b| a.aircraft_id.cmp(&b.aircraft_id));
        list
    }

    /// Copy-on-write edit of one committed entry. Earlier snapshots handed
    /// out by `entries()` are unaffected.
    fn edit_entry(&mut self, aircraft_id: &str, edit: impl FnOnce(&mut Entry)) -> bool {
        if !self.entries.contains_key(aircraft_id) {
            debug!("entry action on unknown aircraft {aircraft_id}");
            return false;
        }
        let table = Arc::make_mut(&mut self.entries);
        match table.get_mut(aircraft_id) {
            Some(entry) => {
                edit(entry);
                true
            }
            None => false,
        }
    }

    pub fn toggle_spa(&mut self, aircraft_id: &str) -> bool {
        self.edit_entry(aircraft_id, |e| e.spa = !e.spa)
    }

    pub fn delete_acl_entry(&mut self, aircraft_id: &str) -> bool {
        let removed = self.edit_entry(aircraft_id, |e| {
            e.acl_display = false;
            e.acl_deleted = true;
        });
        if removed && self.ui.asel_for(EdstWindow::Acl).is_some_and(|a| a.aircraft_id == aircraft_id) {
            self.apply(SharedUiEvent::SetAsel(None), Broadcast::Emit);
        }
        removed
    }

    /// Explicit re-add; the only path that clears the ACL latch.
    pub fn add_acl_entry(&mut self, aircraft_id: &str) -> bool {
        self.edit_entry(aircraft_id, |e| {
            e.acl_display = true;
            e.acl_deleted = false;
            e.dep_display = false;
            e.dep_deleted = true;
        })
    }

    pub fn delete_dep_entry(&mut self, aircraft_id: &str) -> bool {
        let removed = self.edit_entry(aircraft_id, |e| {
            e.dep_display = false;
            e.dep_deleted = true;
        });
        if removed && self.ui.asel_for(EdstWindow::Dep).is_some_and(|a| a.aircraft_id == aircraft_id) {
            self.apply(SharedUiEvent::SetAsel(None), Broadcast::Emit);
        }
        removed
    }

    /// Explicit re-add to the departure list; takes the entry off the ACL.
    /// The ACL latch is left alone so the aircraft can still move onto the
    /// ACL once airborne in sector.
    pub fn add_dep_entry(&mut self, aircraft_id: &str) -> bool {
        let added = self.edit_entry(aircraft_id, |e| {
            e.dep_display = true;
            e.dep_deleted = false;
            e.acl_display = false;
        });
        if added && self.ui.asel_for(EdstWindow::Acl).is_some_and(|a| a.aircraft_id == aircraft_id) {
            self.apply(SharedUiEvent::SetAsel(None), Broadcast::Emit);
        }
        added
    }

    pub fn set_vci_status(&mut self, aircraft_id: &str, status: AckStatus) -> bool {
        self.edit_entry(aircraft_id, |e| e.vci_status = status)
    }

    pub fn set_dep_status(&mut self, aircraft_id: &str, status: AckStatus) -> bool {
        self.edit_entry(aircraft_id, |e| e.dep_status = status)
    }

    /// Toggles the row highlight on the given list. Other windows have no rows.
    pub fn toggle_highlight(&mut self, aircraft_id: &str, list: EdstWindow) -> bool {
        match list {
            EdstWindow::Acl => self.edit_entry(aircraft_id, |e| e.acl_highlighted = !e.acl_highlighted),
            EdstWindow::Dep => self.edit_entry(aircraft_id, |e| e.dep_highlighted = !e.dep_highlighted),
            other => {
                debug!("highlight on {other:?} ignored");
                false
            }
        }
    }

    pub fn set_free_text(&mut self, aircraft_id: &str, text: impl Into<String>) -> bool {
        let text = text.into();
        self.edit_entry(aircraft_id, |e| e.free_text = text)
    }

    pub fn toggle_free_text(&mut self, aircraft_id: &str) -> bool {
        self.edit_entry(aircraft_id, |e| e.show_free_text = !e.show_free_text)
    }

    pub fn update_entry(&mut self, aircraft_id: &str, patch: EntryPatch) -> bool {
        self.edit_entry(aircraft_id, |e| {
            let fp = &mut e.flightplan;
            if let Some(v) = patch.route {
                fp.route = v;
            }
            if let Some(v) = patch.altitude {
                fp.altitude = v;
            }
            if let Some(v) = patch.equipment {
                fp.equipment = v;
            }
            if let Some(v) = patch.aircraft_type {
                fp.aircraft_type = v;
            }
            if let Some(v) = patch.destination {
                fp.destination = v;
            }
            if let Some(v) = patch.spa {
                e.spa = v;
            }
        })
    }

    // ---- sectors ----

    pub fn sectors(&self) -> &SectorData {
        &self.sectors
    }

    pub fn select_sectors<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.sectors.select(ids);
        info!("selected sectors: {:?}", self.sectors.selected());
    }

    // ---- window/selection selectors ----

    pub fn window(&self, window: EdstWindow) -> &AppWindow {
        self.ui.window(window)
    }

    pub fn is_open(&self, window: EdstWindow) -> bool {
        self.ui.is_open(window)
    }

    pub fn z_stack(&self) -> &[EdstWindow] {
        self.ui.z_stack()
    }

    pub fn z_index(&self, window: EdstWindow) -> Option<usize> {
        self.ui.z_index(window)
    }

    pub fn asel(&self) -> Option<&Asel> {
        self.ui.asel()
    }

    pub fn acl_asel(&self) -> Option<&Asel> {
        self.ui.asel_for(EdstWindow::Acl)
    }

    pub fn dep_asel(&self) -> Option<&Asel> {
        self.ui.asel_for(EdstWindow::Dep)
    }

    pub fn gpd_asel(&self) -> Option<&Asel> {
        self.ui.asel_for(EdstWindow::Gpd)
    }

    /// Entry behind the current selection.
    pub fn asel_entry(&self) -> Option<&Entry> {
        self.ui.asel().and_then(|a| self.entries.get(&a.aircraft_id))
    }

    pub fn route_menu(&self) -> RouteMenuState {
        self.ui.route_menu
    }

    pub fn mra_message(&self) -> &str {
        self.ui.mra_message()
    }

    pub fn outages(&self) -> &[OutageEntry] {
        self.ui.outages()
    }

    // ---- shared UI operations ----

    /// Applies one UI operation. Emits to peers only when the operation took
    /// effect and `broadcast` is `Emit`. Returns whether it took effect.
    pub fn apply(&mut self, event: SharedUiEvent, broadcast: Broadcast) -> bool {
        let applied = match &event {
            SharedUiEvent::SetAsel(asel) => self.reduce_asel(asel.clone()),
            SharedUiEvent::OpenWindow { window, opened_by } => {
                self.ui.open_window(*window, *opened_by);
                true
            }
            SharedUiEvent::CloseWindow(windows) => {
                self.ui.close_window(windows);
                true
            }
            SharedUiEvent::PushZStack(window) => {
                self.ui.push_z_stack(*window);
                true
            }
            SharedUiEvent::CloseAllMenus => {
                self.ui.close_all_menus();
                true
            }
            SharedUiEvent::CloseAircraftMenus => {
                self.ui.close_aircraft_menus();
                true
            }
            SharedUiEvent::SetWindowPosition { window, position } => {
                self.ui.set_window_position(*window, *position);
                true
            }
            SharedUiEvent::RouteMenuSetTrialPlan(value) => {
                self.ui.route_menu.trial_plan = *value;
                true
            }
            SharedUiEvent::RouteMenuClickAppendStar => {
                self.ui.route_menu.toggle_append_star();
                true
            }
            SharedUiEvent::RouteMenuClickAppendOplus => {
                self.ui.route_menu.toggle_append_oplus();
                true
            }
            SharedUiEvent::SetSelectedPlanIndex(index) => self.plans.set_selected(*index),
        };
        if applied && broadcast == Broadcast::Emit {
            self.bus.emit(&event);
        }
        applied
    }

    /// Inbound peer event. Never re-emitted.
    pub fn apply_remote(&mut self, envelope: Envelope) -> bool {
        if !self.bus.accepts(&envelope) {
            return false;
        }
        debug!("applying {:?} from {}", envelope.event, envelope.origin);
        self.apply(envelope.event, Broadcast::Suppress)
    }

    fn reduce_asel(&mut self, asel: Option<Asel>) -> bool {
        let Some(next) = asel else {
            self.ui.set_asel(None);
            return true;
        };
        if !self.entries.contains_key(&next.aircraft_id) {
            debug!("ignoring selection of unknown aircraft {}", next.aircraft_id);
            return false;
        }
        let changed_aircraft = self
            .ui
            .asel()
            .map_or(true, |current| current.aircraft_id != next.aircraft_id);
        if changed_aircraft {
            self.ui.close_aircraft_menus();
        }
        self.ui.set_asel(Some(next));
        true
    }

    pub fn set_asel(&mut self, asel: Option<Asel>, broadcast: Broadcast) -> bool {
        self.apply(SharedUiEvent::SetAsel(asel), broadcast)
    }

    pub fn open_window(
        &mut self,
        window: EdstWindow,
        opened_by: Option<EdstWindow>,
        broadcast: Broadcast,
    ) {
        self.apply(SharedUiEvent::OpenWindow { window, opened_by }, broadcast);
    }

    pub fn close_window(&mut self, windows: &[EdstWindow], broadcast: Broadcast) {
        self.apply(SharedUiEvent::CloseWindow(windows.to_vec()), broadcast);
    }

    pub fn push_z_stack(&mut self, window: EdstWindow, broadcast: Broadcast) {
        self.apply(SharedUiEvent::PushZStack(window), broadcast);
    }

    pub fn close_all_menus(&mut self, broadcast: Broadcast) {
        self.apply(SharedUiEvent::CloseAllMenus, broadcast);
    }

    pub fn close_aircraft_menus(&mut self, broadcast: Broadcast) {
        self.apply(SharedUiEvent::CloseAircraftMenus, broadcast);
    }

    pub fn set_window_position(
        &mut self,
        window: EdstWindow,
        position: Option<WindowPosition>,
        broadcast: Broadcast,
    ) {
        self.apply(SharedUiEvent::SetWindowPosition { window, position }, broadcast);
    }

    pub fn set_trial_plan(&mut self, value: bool, broadcast: Broadcast) {
        self.apply(SharedUiEvent::RouteMenuSetTrialPlan(value), broadcast);
    }

    pub fn click_append_star(&mut self, broadcast: Broadcast) {
        self.apply(SharedUiEvent::RouteMenuClickAppendStar, broadcast);
    }

    pub fn click_append_oplus(&mut self, broadcast: Broadcast) {
        self.apply(SharedUiEvent::RouteMenuClickAppendOplus, broadcast);
    }

    pub fn set_selected_plan_index(&mut self, index: Option<usize>, broadcast: Broadcast) -> bool {
        self.apply(SharedUiEvent::SetSelectedPlanIndex(index), broadcast)
    }

    // ---- local-only UI operations ----

    pub fn toggle_window(&mut self, window: EdstWindow) {
        self.ui.toggle_window(window);
    }

    pub fn close_all_windows(&mut self) {
        self.ui.close_all_windows();
    }

    pub fn set_mra_message(&mut self, message: impl Into<String>) {
        self.ui.set_mra_message(message);
    }

    pub fn add_outage(&mut self, entry: OutageEntry) {
        self.ui.add_outage(entry);
    }

    pub fn remove_outage(&mut self, index: usize) -> Option<OutageEntry> {
        self.ui.remove_outage(index)
    }

    // ---- plans ----

    pub fn plans(&self) -> &PlanQueue {
        &self.plans
    }

    pub fn remove_plan(&mut self, index: usize) -> Option<Plan> {
        self.plans.remove(index)
    }

    pub fn prune_expired_plans(&mut self, now: DateTime<Utc>) -> usize {
        let removed = self.plans.prune_expired(now);
        if removed > 0 {
            info!("pruned {removed} expired trial plans");
        }
        removed
    }

    /// Commits a route/altitude amendment either as a trial plan or straight
    /// to the backend.
    pub fn commit_amendment(
        &mut self,
        mode: AmendMode,
        aircraft_id: &str,
        amended: Flightplan,
        sink: &mut dyn AmendSink,
        now: DateTime<Utc>,
    ) -> Result<(), AmendError> {
        let entry = self
            .entries
            .get(aircraft_id)
            .ok_or_else(|| AmendError::UnknownAircraft(aircraft_id.to_string()))?;
        match mode {
            AmendMode::Trial => {
                let frd = entry
                    .reference_fix
                    .as_ref()
                    .map(|rf| rf.frd())
                    .unwrap_or_default();
                let plan = Plan::trial(entry, amended, &frd, self.plan_ttl, now);
                self.plans.enqueue(plan);
                self.ui.open_window(EdstWindow::PlansDisplay, None);
                Ok(())
            }
            AmendMode::Amend => {
                let request = AmendRequest {
                    cid: entry.cid,
                    aircraft_id: entry.aircraft_id.clone(),
                    flightplan: amended,
                };
                sink.amend(request).map_err(AmendError::Sink)
            }
        }
    }

    // ---- bus ----

    pub fn bus(&self) -> &SharedUiBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SharedUiBus {
        &mut self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::{AmendError, EntryPatch, StateStore};
    use crate::model::{AckStatus, Entry, EntryTable, Flightplan, ReferenceFixDistance};
    use crate::plans::{AmendMode, AmendRequest, AmendSink};
    use crate::sectors::{SectorData, SectorFile};
    use crate::shared::{Broadcast, SharedUiBus};
    use crate::windows::{Asel, EdstWindow, RowField};
    use chrono::{TimeZone, Utc};

    #[derive(Default)]
    struct RecordingSink(Vec<AmendRequest>);

    impl AmendSink for RecordingSink {
        fn amend(&mut self, request: AmendRequest) -> Result<(), String> {
            self.0.push(request);
            Ok(())
        }
    }

    fn store_with(ids: &[&str]) -> StateStore {
        let mut store = StateStore::new(
            SectorData::new("ZBW", SectorFile::default()),
            SharedUiBus::disabled(),
        );
        let table: EntryTable = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.to_string(), Entry::new(*id, i as u64 + 1)))
            .collect();
        assert!(store.commit_entries(table, 1));
        store
    }

    fn asel(id: &str, window: EdstWindow) -> Asel {
        Asel {
            aircraft_id: id.to_string(),
            window,
            field: RowField::Fid,
        }
    }

    #[test]
    fn commit_refuses_stale_generation() {
        let mut store = store_with(&["AAL1"]);
        assert!(!store.commit_entries(EntryTable::new(), 1));
        assert!(!store.commit_entries(EntryTable::new(), 0));
        assert_eq!(store.entries().len(), 1);
        assert!(store.commit_entries(EntryTable::new(), 3));
        assert_eq!(store.generation(), 3);
        assert!(store.entries().is_empty());
    }

    #[test]
    fn asel_guard_rejects_unknown_aircraft() {
        let mut store = store_with(&["AAL1"]);
        assert!(store.set_asel(Some(asel("AAL1", EdstWindow::Acl)), Broadcast::Emit));
        assert!(!store.set_asel(Some(asel("ZZZZ999", EdstWindow::Acl)), Broadcast::Emit));
        assert_eq!(store.asel().map(|a| a.aircraft_id.as_str()), Some("AAL1"));
        assert!(store.set_asel(None, Broadcast::Emit));
        assert!(store.asel().is_none());
    }

    #[test]
    fn new_aircraft_closes_aircraft_menus() {
        let mut store = store_with(&["AAL1", "UAL2"]);
        store.set_asel(Some(asel("AAL1", EdstWindow::Acl)), Broadcast::Suppress);
        store.open_window(EdstWindow::RouteMenu, Some(EdstWindow::Acl), Broadcast::Suppress);
        store.open_window(EdstWindow::ToolsMenu, None, Broadcast::Suppress);

        let mut same = asel("AAL1", EdstWindow::Acl);
        same.field = RowField::Alt;
        store.set_asel(Some(same), Broadcast::Suppress);
        assert!(store.is_open(EdstWindow::RouteMenu));

        store.set_asel(Some(asel("UAL2", EdstWindow::Acl)), Broadcast::Suppress);
        assert!(!store.is_open(EdstWindow::RouteMenu));
        assert!(store.is_open(EdstWindow::ToolsMenu));
        assert_eq!(store.acl_asel().map(|a| a.aircraft_id.as_str()), Some("UAL2"));
        assert!(store.dep_asel().is_none());
        assert_eq!(store.asel_entry().map(|e| e.cid), Some(2));
    }

    #[test]
    fn latches_only_cleared_by_explicit_add() {
        let mut store = store_with(&["AAL1"]);
        store.set_asel(Some(asel("AAL1", EdstWindow::Acl)), Broadcast::Suppress);
        assert!(store.add_acl_entry("AAL1"));
        assert_eq!(store.acl_entries().len(), 1);
        assert!(store.delete_acl_entry("AAL1"));
        let entry = store.entry("AAL1").unwrap();
        assert!(entry.acl_deleted && !entry.acl_display);
        assert!(store.asel().is_none());
        assert!(store.add_acl_entry("AAL1"));
        assert!(!store.entry("AAL1").unwrap().acl_deleted);
        assert!(!store.delete_dep_entry("NOPE"));
    }

    #[test]
    fn add_dep_entry_takes_entry_off_acl() {
        let mut store = store_with(&["AAL1"]);
        assert!(store.add_acl_entry("AAL1"));
        store.set_asel(Some(asel("AAL1", EdstWindow::Acl)), Broadcast::Suppress);
        assert!(store.add_dep_entry("AAL1"));
        let entry = store.entry("AAL1").unwrap();
        assert!(entry.dep_display && !entry.dep_deleted);
        assert!(!entry.acl_display);
        assert!(store.acl_entries().is_empty());
        assert_eq!(store.dep_entries().len(), 1);
        assert!(store.asel().is_none());
    }

    #[test]
    fn row_marks_stay_local() {
        let mut store = store_with(&["AAL1"]);
        assert!(store.set_vci_status("AAL1", AckStatus::Acknowledged));
        assert!(store.set_dep_status("AAL1", AckStatus::Active));
        assert!(store.toggle_highlight("AAL1", EdstWindow::Acl));
        assert!(!store.toggle_highlight("AAL1", EdstWindow::Gpd));
        assert!(store.set_free_text("AAL1", "CTC 128.2"));
        assert!(store.toggle_free_text("AAL1"));
        assert!(!store.set_free_text("ZZZ9", "x"));

        let entry = store.entry("AAL1").unwrap();
        assert_eq!(entry.vci_status, AckStatus::Acknowledged);
        assert_eq!(entry.dep_status, AckStatus::Active);
        assert!(entry.acl_highlighted && !entry.dep_highlighted);
        assert_eq!(entry.free_text, "CTC 128.2");
        assert!(entry.show_free_text);
        assert_eq!(store.bus().emitted(), 0);

        let wire = serde_json::to_value(entry).unwrap();
        assert_eq!(wire["vciStatus"], 0);
        assert_eq!(wire["depStatus"], 1);
    }

    #[test]
    fn entry_edits_do_not_touch_old_snapshots() {
        let mut store = store_with(&["AAL1"]);
        let before = store.entries();
        assert!(store.toggle_spa("AAL1"));
        assert!(store.update_entry(
            "AAL1",
            EntryPatch {
                altitude: Some("350".to_string()),
                ..EntryPatch::default()
            }
        ));
        assert!(!before["AAL1"].spa);
        let after = store.entry("AAL1").unwrap();
        assert!(after.spa);
        assert_eq!(after.flightplan.altitude, "350");
    }

    #[test]
    fn commit_amendment_trial_and_live() {
        let mut store = store_with(&["AAL1"]);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut sink = RecordingSink::default();
        let amended = Flightplan {
            route: "BOS.J79.HTO".to_string(),
            destination: "KJFK".to_string(),
            ..Flightplan::default()
        };
        let mut table = (*store.entries()).clone();
        if let Some(entry) = table.get_mut("AAL1") {
            entry.reference_fix = Some(ReferenceFixDistance {
                fix: "BOS".to_string(),
                bearing_deg: 90,
                distance_nm: 10,
            });
        }
        store.commit_entries(table, 2);

        store
            .commit_amendment(AmendMode::Trial, "AAL1", amended.clone(), &mut sink, now)
            .unwrap();
        assert_eq!(store.plans().len(), 1);
        assert_eq!(
            store.plans().plans()[0].command_string,
            "AM AAL1 FIX BOS090010 TIM EXX00 RTE BOS.J79.HTOKJFK"
        );
        assert!(store.is_open(EdstWindow::PlansDisplay));
        assert!(sink.0.is_empty());

        store
            .commit_amendment(AmendMode::Amend, "AAL1", amended, &mut sink, now)
            .unwrap();
        assert_eq!(sink.0.len(), 1);
        assert_eq!(store.plans().len(), 1);

        let err = store
            .commit_amendment(AmendMode::Amend, "ZZZ", Flightplan::default(), &mut sink, now)
            .unwrap_err();
        assert_eq!(err, AmendError::UnknownAircraft("ZZZ".to_string()));
    }

    #[test]
    fn selected_plan_index_out_of_range_is_not_applied() {
        let mut store = store_with(&["AAL1"]);
        assert!(!store.set_selected_plan_index(Some(0), Broadcast::Emit));
        assert!(store.set_selected_plan_index(None, Broadcast::Emit));
    }
}

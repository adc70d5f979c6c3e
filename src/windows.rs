use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdstWindow {
    Acl,
    Dep,
    Gpd,
    PlansDisplay,
    Status,
    Outage,
    MessageComposeArea,
    MessageResponseArea,
    Altimeter,
    Metar,
    Sigmets,
    AclSortMenu,
    DepSortMenu,
    ToolsMenu,
    GpdMapOptionsMenu,
    PlanOptions,
    AltitudeMenu,
    RouteMenu,
    PrevRouteMenu,
    SpeedMenu,
    HeadingMenu,
    HoldMenu,
    CancelHoldMenu,
    TemplateMenu,
    EquipmentTemplateMenu,
}

impl EdstWindow {
    pub const ALL: [EdstWindow; 25] = [
        EdstWindow::Acl,
        EdstWindow::Dep,
        EdstWindow::Gpd,
        EdstWindow::PlansDisplay,
        EdstWindow::Status,
        EdstWindow::Outage,
        EdstWindow::MessageComposeArea,
        EdstWindow::MessageResponseArea,
        EdstWindow::Altimeter,
        EdstWindow::Metar,
        EdstWindow::Sigmets,
        EdstWindow::AclSortMenu,
        EdstWindow::DepSortMenu,
        EdstWindow::ToolsMenu,
        EdstWindow::GpdMapOptionsMenu,
        EdstWindow::PlanOptions,
        EdstWindow::AltitudeMenu,
        EdstWindow::RouteMenu,
        EdstWindow::PrevRouteMenu,
        EdstWindow::SpeedMenu,
        EdstWindow::HeadingMenu,
        EdstWindow::HoldMenu,
        EdstWindow::CancelHoldMenu,
        EdstWindow::TemplateMenu,
        EdstWindow::EquipmentTemplateMenu,
    ];

    /// Every menu surface; closed together by `close_all_menus`.
    pub const MENUS: [EdstWindow; 14] = [
        EdstWindow::AclSortMenu,
        EdstWindow::DepSortMenu,
        EdstWindow::ToolsMenu,
        EdstWindow::GpdMapOptionsMenu,
        EdstWindow::PlanOptions,
        EdstWindow::AltitudeMenu,
        EdstWindow::RouteMenu,
        EdstWindow::PrevRouteMenu,
        EdstWindow::SpeedMenu,
        EdstWindow::HeadingMenu,
        EdstWindow::HoldMenu,
        EdstWindow::CancelHoldMenu,
        EdstWindow::TemplateMenu,
        EdstWindow::EquipmentTemplateMenu,
    ];

    /// Menus bound to the selected aircraft.
    pub const AIRCRAFT_MENUS: [EdstWindow; 10] = [
        EdstWindow::PlanOptions,
        EdstWindow::AltitudeMenu,
        EdstWindow::RouteMenu,
        EdstWindow::PrevRouteMenu,
        EdstWindow::SpeedMenu,
        EdstWindow::HeadingMenu,
        EdstWindow::HoldMenu,
        EdstWindow::CancelHoldMenu,
        EdstWindow::TemplateMenu,
        EdstWindow::EquipmentTemplateMenu,
    ];

    pub fn is_aircraft_menu(self) -> bool {
        Self::AIRCRAFT_MENUS.contains(&self)
    }

    fn default_position(self) -> WindowPosition {
        match self {
            EdstWindow::Status | EdstWindow::Outage => WindowPosition { x: 400.0, y: 100.0 },
            EdstWindow::MessageComposeArea => WindowPosition { x: 100.0, y: 600.0 },
            _ => WindowPosition { x: 100.0, y: 100.0 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppWindow {
    pub open: bool,
    pub position: Option<WindowPosition>,
    pub opened_by: Option<EdstWindow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowField {
    Fid,
    Type,
    Alt,
    Code,
    Spd,
    Hdg,
    Rte,
    Hold,
}

/// The selected aircraft and the window/field it was selected from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asel {
    pub aircraft_id: String,
    pub window: EdstWindow,
    pub field: RowField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutageType {
    FacilityDown,
    FacilityUp,
    ServiceDown,
    ServiceUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageEntry {
    pub message: String,
    pub outage_type: OutageType,
    pub can_delete: bool,
    pub acknowledged: bool,
}

/// Route menu toggles mirrored between peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteMenuState {
    pub trial_plan: bool,
    pub append_star: bool,
    pub append_oplus: bool,
}

impl RouteMenuState {
    /// Star and oplus are mutually exclusive.
    pub fn toggle_append_star(&mut self) {
        self.append_star = !self.append_star;
        self.append_oplus = false;
    }

    pub fn toggle_append_oplus(&mut self) {
        self.append_oplus = !self.append_oplus;
        self.append_star = false;
    }
}

#[derive(Debug, Clone)]
pub struct WindowState {
    windows: BTreeMap<EdstWindow, AppWindow>,
    z_stack: Vec<EdstWindow>,
    asel: Option<Asel>,
    mra_message: String,
    outages: Vec<OutageEntry>,
    pub route_menu: RouteMenuState,
}

impl Default for WindowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowState {
    pub fn new() -> Self {
        let windows = EdstWindow::ALL
            .iter()
            .map(|w| {
                (
                    *w,
                    AppWindow {
                        open: false,
                        position: Some(w.default_position()),
                        opened_by: None,
                    },
                )
            })
            .collect();
        Self {
            windows,
            z_stack: Vec::new(),
            asel: None,
            mra_message: String::new(),
            outages: Vec::new(),
            route_menu: RouteMenuState::default(),
        }
    }

    pub fn window(&self, window: EdstWindow) -> &AppWindow {
        // populated for every variant in `new`
        &self.windows[&window]
    }

    fn window_mut(&mut self, window: EdstWindow) -> &mut AppWindow {
        self.windows.entry(window).or_insert_with(|| AppWindow {
            open: false,
            position: Some(window.default_position()),
            opened_by: None,
        })
    }

    pub fn is_open(&self, window: EdstWindow) -> bool {
        self.window(window).open
    }

    pub fn open_windows(&self) -> Vec<EdstWindow> {
        self.windows
            .iter()
            .filter(|(_, w)| w.open)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn open_window(&mut self, window: EdstWindow, opened_by: Option<EdstWindow>) {
        let entry = self.window_mut(window);
        entry.open = true;
        if opened_by.is_some() {
            entry.opened_by = opened_by;
        }
        self.push_z_stack(window);
        debug!("window {window:?} opened");
    }

    /// Closing leaves the z-stack order untouched.
    pub fn close_window(&mut self, windows: &[EdstWindow]) {
        for window in windows {
            self.window_mut(*window).open = false;
        }
    }

    pub fn toggle_window(&mut self, window: EdstWindow) {
        let entry = self.window_mut(window);
        entry.open = !entry.open;
        self.push_z_stack(window);
    }

    pub fn push_z_stack(&mut self, window: EdstWindow) {
        self.z_stack.retain(|w| *w != window);
        self.z_stack.push(window);
    }

    pub fn z_stack(&self) -> &[EdstWindow] {
        &self.z_stack
    }

    /// Stacking index, higher is closer to the front.
    pub fn z_index(&self, window: EdstWindow) -> Option<usize> {
        self.z_stack.iter().position(|w| *w == window)
    }

    pub fn close_all_windows(&mut self) {
        for window in self.windows.values_mut() {
            window.open = false;
        }
    }

    /// Closes every menu and drops the selection.
    pub fn close_all_menus(&mut self) {
        self.close_window(&EdstWindow::MENUS);
        self.asel = None;
    }

    pub fn close_aircraft_menus(&mut self) {
        self.close_window(&EdstWindow::AIRCRAFT_MENUS);
    }

    pub fn set_window_position(&mut self, window: EdstWindow, position: Option<WindowPosition>) {
        self.window_mut(window).position = position;
    }

    pub fn asel(&self) -> Option<&Asel> {
        self.asel.as_ref()
    }

    /// Unchecked write; the store validates against the entry table first.
    pub(crate) fn set_asel(&mut self, asel: Option<Asel>) {
        self.asel = asel;
    }

    pub fn asel_for(&self, window: EdstWindow) -> Option<&Asel> {
        self.asel.as_ref().filter(|a| a.window == window)
    }

    pub fn mra_message(&self) -> &str {
        &self.mra_message
    }

    pub fn set_mra_message(&mut self, message: impl Into<String>) {
        self.window_mut(EdstWindow::MessageResponseArea).open = true;
        self.mra_message = message.into();
    }

    pub fn outages(&self) -> &[OutageEntry] {
        &self.outages
    }

    pub fn add_outage(&mut self, entry: OutageEntry) {
        self.outages.push(entry);
    }

    pub fn remove_outage(&mut self, index: usize) -> Option<OutageEntry> {
        if index < self.outages.len() {
            Some(self.outages.remove(index))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Asel, EdstWindow, OutageEntry, OutageType, RouteMenuState, RowField, WindowPosition, WindowState};

    #[test]
    fn all_windows_start_closed() {
        let state = WindowState::new();
        assert!(state.open_windows().is_empty());
        assert!(state.z_stack().is_empty());
        assert_eq!(
            state.window(EdstWindow::Status).position,
            Some(WindowPosition { x: 400.0, y: 100.0 })
        );
    }

    #[test]
    fn z_stack_has_set_semantics() {
        let mut state = WindowState::new();
        state.push_z_stack(EdstWindow::Acl);
        state.push_z_stack(EdstWindow::Dep);
        state.push_z_stack(EdstWindow::Acl);
        assert_eq!(state.z_stack(), &[EdstWindow::Dep, EdstWindow::Acl]);
        assert_eq!(state.z_index(EdstWindow::Acl), Some(1));
        assert_eq!(state.z_index(EdstWindow::Gpd), None);
    }

    #[test]
    fn open_raises_and_close_keeps_order() {
        let mut state = WindowState::new();
        state.open_window(EdstWindow::RouteMenu, Some(EdstWindow::Acl));
        state.open_window(EdstWindow::Status, None);
        state.open_window(EdstWindow::RouteMenu, None);
        assert_eq!(state.z_stack(), &[EdstWindow::Status, EdstWindow::RouteMenu]);
        assert_eq!(state.window(EdstWindow::RouteMenu).opened_by, Some(EdstWindow::Acl));

        state.close_window(&[EdstWindow::RouteMenu]);
        assert!(!state.is_open(EdstWindow::RouteMenu));
        assert_eq!(state.z_stack(), &[EdstWindow::Status, EdstWindow::RouteMenu]);
    }

    #[test]
    fn position_survives_close() {
        let mut state = WindowState::new();
        let pos = WindowPosition { x: 10.0, y: 20.0 };
        state.set_window_position(EdstWindow::Metar, Some(pos));
        state.open_window(EdstWindow::Metar, None);
        state.close_window(&[EdstWindow::Metar]);
        state.open_window(EdstWindow::Metar, None);
        assert_eq!(state.window(EdstWindow::Metar).position, Some(pos));
    }

    #[test]
    fn close_all_menus_clears_asel() {
        let mut state = WindowState::new();
        state.set_asel(Some(Asel {
            aircraft_id: "AAL1".to_string(),
            window: EdstWindow::Acl,
            field: RowField::Fid,
        }));
        state.open_window(EdstWindow::Acl, None);
        state.open_window(EdstWindow::ToolsMenu, None);
        state.open_window(EdstWindow::AltitudeMenu, None);
        state.close_all_menus();
        assert!(state.asel().is_none());
        assert_eq!(state.open_windows(), vec![EdstWindow::Acl]);
    }

    #[test]
    fn close_aircraft_menus_keeps_asel_and_other_menus() {
        let mut state = WindowState::new();
        state.set_asel(Some(Asel {
            aircraft_id: "AAL1".to_string(),
            window: EdstWindow::Dep,
            field: RowField::Rte,
        }));
        state.open_window(EdstWindow::ToolsMenu, None);
        state.open_window(EdstWindow::RouteMenu, None);
        state.close_aircraft_menus();
        assert!(state.asel().is_some());
        assert!(state.asel_for(EdstWindow::Dep).is_some());
        assert!(state.asel_for(EdstWindow::Acl).is_none());
        assert_eq!(state.open_windows(), vec![EdstWindow::ToolsMenu]);
    }

    #[test]
    fn mra_and_outages() {
        let mut state = WindowState::new();
        state.set_mra_message("REJECT - FORMAT");
        assert!(state.is_open(EdstWindow::MessageResponseArea));
        assert_eq!(state.mra_message(), "REJECT - FORMAT");

        state.add_outage(OutageEntry {
            message: "ADSB DOWN".to_string(),
            outage_type: OutageType::ServiceDown,
            can_delete: true,
            acknowledged: false,
        });
        assert!(state.remove_outage(3).is_none());
        assert_eq!(state.remove_outage(0).map(|o| o.message).as_deref(), Some("ADSB DOWN"));
        assert!(state.outages().is_empty());
    }

    #[test]
    fn append_toggles_are_exclusive() {
        let mut menu = RouteMenuState::default();
        menu.toggle_append_star();
        assert!(menu.append_star);
        menu.toggle_append_oplus();
        assert!(menu.append_oplus);
        assert!(!menu.append_star);
        menu.toggle_append_oplus();
        assert!(!menu.append_oplus);
    }
}

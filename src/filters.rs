use crate::geo;
use crate::model::Entry;
use crate::sectors::{Sector, SectorData};

/// List membership predicates consulted by the derivation engine.
pub trait ListFilters: Send + Sync {
    /// Whether the entry qualifies for the aircraft list.
    fn acl(&self, entry: &Entry, polygons: &[&Sector]) -> bool;
    /// Whether the entry qualifies for the departure list of `artcc_id`.
    fn dep(&self, entry: &Entry, artcc_id: &str) -> bool;
}

/// ACL: inside a selected sector. DEP: departing a facility airport and not
/// yet airborne.
#[derive(Debug, Clone, Default)]
pub struct DefaultFilters {
    artcc_id: String,
    departure_airports: Vec<String>,
}

impl DefaultFilters {
    pub fn new(artcc_id: impl Into<String>, departure_airports: Vec<String>) -> Self {
        Self {
            artcc_id: artcc_id.into().trim().to_ascii_uppercase(),
            departure_airports: departure_airports
                .iter()
                .map(|a| normalize_airport(a))
                .collect(),
        }
    }

    pub fn from_sectors(sectors: &SectorData) -> Self {
        Self::new(sectors.artcc_id.clone(), sectors.departure_airports.clone())
    }
}

impl ListFilters for DefaultFilters {
    fn acl(&self, entry: &Entry, polygons: &[&Sector]) -> bool {
        entry
            .position()
            .is_some_and(|(lat, lon)| geo::in_any_sector(lat, lon, polygons))
    }

    fn dep(&self, entry: &Entry, artcc_id: &str) -> bool {
        if !artcc_id.trim().eq_ignore_ascii_case(&self.artcc_id) {
            return false;
        }
        let departure = normalize_airport(&entry.flightplan.departure);
        !departure.is_empty()
            && self.departure_airports.contains(&departure)
            && !entry.is_airborne()
    }
}

/// Three-letter US identifiers get the `K` prefix so `BOS` matches `KBOS`.
fn normalize_airport(value: &str) -> String {
    let value = value.trim().to_ascii_uppercase();
    if value.len() == 3 && value.chars().all(|c| c.is_ascii_alphabetic()) {
        format!("K{value}")
    } else {
        value
    }
}

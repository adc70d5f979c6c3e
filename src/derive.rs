//! Per-aircraft derivation: merges a raw poll record into the locally held
//! entry and computes sector membership, list transitions, the closest
//! reference fix and AAR applicability.
//!
//! Derivation is a pure function of its inputs. List display flags are
//! edge-triggered: only a transition into a qualifying state sets them, and
//! the `*_deleted` latches are never cleared here.

use thiserror::Error;

use crate::aar::AarCache;
use crate::filters::ListFilters;
use crate::geo;
use crate::model::{ApiAircraft, Entry, Track};
use crate::sectors::{ReferenceFix, Sector, SectorData};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeriveError {
    #[error("record has no aircraft id")]
    MissingAircraftId,
    #[error("record for {aircraft_id} has no cid")]
    MissingCid { aircraft_id: String },
}

impl DeriveError {
    pub fn aircraft_id(&self) -> Option<&str> {
        match self {
            Self::MissingAircraftId => None,
            Self::MissingCid { aircraft_id } => Some(aircraft_id),
        }
    }
}

/// Facility context shared by every record of one refresh tick.
#[derive(Debug)]
pub struct DerivationContext<'a> {
    pub artcc_id: &'a str,
    pub polygons: Vec<&'a Sector>,
    pub reference_fixes: &'a [ReferenceFix],
}

impl<'a> DerivationContext<'a> {
    pub fn from_sectors(sectors: &'a SectorData) -> Self {
        Self {
            artcc_id: &sectors.artcc_id,
            polygons: sectors.selected_polygons(),
            reference_fixes: &sectors.reference_fixes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Derived {
    pub entry: Entry,
    /// Displayed in a list but no AAR candidates cached yet.
    pub needs_aar: bool,
    /// Record carried no usable position; derived fields were kept as-is.
    pub position_missing: bool,
}

pub fn derive_entry(
    raw: &ApiAircraft,
    current: Option<&Entry>,
    ctx: &DerivationContext<'_>,
    filters: &dyn ListFilters,
    aar: &AarCache,
) -> Result<Derived, DeriveError> {
    let aircraft_id = raw.key().ok_or(DeriveError::MissingAircraftId)?;
    let cid = raw.cid.ok_or_else(|| DeriveError::MissingCid {
        aircraft_id: aircraft_id.clone(),
    })?;

    // a new cid under a known callsign is a new flight plan; start fresh
    let mut entry = current
        .filter(|prior| prior.cid == cid)
        .cloned()
        .unwrap_or_else(|| Entry::new(aircraft_id.clone(), cid));
    entry.aircraft_id = aircraft_id;
    entry.cid = cid;
    entry.missed_polls = 0;
    merge_flightplan(&mut entry, raw);

    if entry.aar_list.is_none() {
        if let Some(list) = aar.get(cid) {
            entry.aar_list = Some(list.clone());
        }
    }

    let Some((lat, lon)) = raw.position() else {
        return Ok(Derived {
            entry,
            needs_aar: false,
            position_missing: true,
        });
    };
    entry.track = Some(Track {
        lat,
        lon,
        altitude_true: raw.altitude_true,
        ground_speed: raw.ground_speed,
        last_updated: raw.last_updated_at,
    });
    entry.in_sector = geo::in_any_sector(lat, lon, &ctx.polygons);

    if filters.dep(&entry, ctx.artcc_id) && !entry.dep_deleted && !entry.acl_display {
        entry.dep_display = true;
    } else if filters.acl(&entry, &ctx.polygons) {
        if !entry.acl_display && !entry.acl_deleted {
            // moving onto the ACL removes the aircraft from the departure list
            entry.acl_display = true;
            entry.dep_deleted = true;
            entry.dep_display = false;
        }
        if !ctx.reference_fixes.is_empty() {
            entry.reference_fix = geo::closest_reference_fix(ctx.reference_fixes, lat, lon);
        }
    }

    let needs_aar = entry.aar_list.is_none() && (entry.acl_display || entry.dep_display);
    Ok(Derived {
        entry,
        needs_aar,
        position_missing: false,
    })
}

fn merge_flightplan(entry: &mut Entry, raw: &ApiAircraft) {
    let fp = &mut entry.flightplan;
    fill(&mut fp.route, &raw.route);
    fill(&mut fp.departure, &raw.departure);
    fill(&mut fp.destination, &raw.destination);
    fill(&mut fp.aircraft_type, &raw.aircraft_type);
    fill(&mut fp.equipment, &raw.equipment);
    fill(&mut fp.altitude, &raw.altitude);
}

/// Overwrites `target` when the record carries a non-blank value.
fn fill(target: &mut String, source: &Option<String>) {
    if let Some(value) = source.as_deref() {
        let value = value.trim();
        if !value.is_empty() && target != value {
            *target = value.to_string();
        }
    }
}

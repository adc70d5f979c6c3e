use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sector {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Polygon ring as `[lon, lat]` pairs.
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferenceFix {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
}

/// On-disk facility description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectorFile {
    #[serde(default)]
    pub artcc_id: Option<String>,
    #[serde(default)]
    pub sectors: Vec<Sector>,
    #[serde(default)]
    pub reference_fixes: Vec<ReferenceFix>,
    #[serde(default)]
    pub departure_airports: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SectorData {
    pub artcc_id: String,
    sectors: Vec<Sector>,
    selected: Vec<String>,
    pub reference_fixes: Vec<ReferenceFix>,
    pub departure_airports: Vec<String>,
}

impl SectorData {
    pub fn new(artcc_id: impl Into<String>, file: SectorFile) -> Self {
        let artcc_id = file
            .artcc_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| artcc_id.into());
        Self {
            artcc_id: artcc_id.trim().to_ascii_uppercase(),
            sectors: file.sectors,
            selected: Vec::new(),
            reference_fixes: file.reference_fixes,
            departure_airports: file
                .departure_airports
                .iter()
                .map(|a| a.trim().to_ascii_uppercase())
                .filter(|a| !a.is_empty())
                .collect(),
        }
    }

    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Replaces the sector selection. Unknown ids are dropped with a warning.
    pub fn select<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selected.clear();
        for id in ids {
            let id = id.as_ref().trim();
            if id.is_empty() {
                continue;
            }
            if self.sectors.iter().any(|s| s.id == id) {
                if !self.selected.iter().any(|s| s == id) {
                    self.selected.push(id.to_string());
                }
            } else {
                warn!("unknown sector {id} ignored");
            }
        }
    }

    /// Polygons used for membership tests: the selection, or the first sector
    /// when nothing is selected.
    pub fn selected_polygons(&self) -> Vec<&Sector> {
        if self.selected.is_empty() {
            return self.sectors.iter().take(1).collect();
        }
        self.selected
            .iter()
            .filter_map(|id| self.sectors.iter().find(|s| &s.id == id))
            .collect()
    }
}

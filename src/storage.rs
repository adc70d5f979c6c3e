use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::sectors::SectorFile;

/// A missing file yields an empty facility description.
pub fn load_sector_file(path: &Path) -> Result<SectorFile> {
    if !path.exists() {
        return Ok(SectorFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read sector file: {}", path.display()))?;
    let file: SectorFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse sector file: {}", path.display()))?;
    Ok(file)
}

pub fn save_sector_file(path: &Path, file: &SectorFile) -> Result<()> {
    let content = toml::to_string_pretty(file)
        .with_context(|| format!("Failed to serialize sector file: {}", path.display()))?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write sector file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_sector_file, save_sector_file};
    use crate::sectors::{ReferenceFix, Sector, SectorFile};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        dir.push(format!("edst-sync-test-{suffix}"));
        let _ = fs::create_dir_all(&dir);
        dir.push(name);
        dir
    }

    #[test]
    fn parses_hand_written_file() {
        let path = temp_file("sectors.toml");
        let content = r#"
artcc_id = "ZBW"
departure_airports = ["KBOS", "KPVD"]

[[sectors]]
id = "37"
name = "Boston High"
points = [[-72.0, 41.0], [-70.0, 41.0], [-70.0, 43.0]]

[[reference_fixes]]
id = "BOS"
lat = 42.36
lon = -71.0
"#;
        fs::write(&path, content).unwrap();
        let file = load_sector_file(&path).unwrap();
        assert_eq!(file.artcc_id.as_deref(), Some("ZBW"));
        assert_eq!(file.sectors.len(), 1);
        assert_eq!(file.sectors[0].points.len(), 3);
        assert_eq!(file.reference_fixes[0].id, "BOS");
        assert_eq!(file.departure_airports, vec!["KBOS", "KPVD"]);
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn save_then_load() {
        let path = temp_file("saved.toml");
        let file = SectorFile {
            artcc_id: Some("ZNY".to_string()),
            sectors: vec![Sector {
                id: "10".to_string(),
                name: None,
                points: vec![[-74.0, 40.0], [-73.0, 40.0], [-73.0, 41.0]],
            }],
            reference_fixes: vec![ReferenceFix {
                id: "JFK".to_string(),
                lat: 40.64,
                lon: -73.78,
            }],
            departure_airports: Vec::new(),
        };
        save_sector_file(&path, &file).unwrap();
        let loaded = load_sector_file(&path).unwrap();
        assert_eq!(loaded.sectors[0].id, "10");
        assert_eq!(loaded.reference_fixes[0].lon, -73.78);
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn missing_file_is_empty() {
        let loaded = load_sector_file(&temp_file("absent.toml")).unwrap();
        assert!(loaded.sectors.is_empty());
    }

    #[test]
    fn malformed_file_reports_path() {
        let path = temp_file("broken.toml");
        fs::write(&path, "sectors = 5").unwrap();
        let err = load_sector_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse sector file"));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }
}

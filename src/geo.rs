use crate::model::ReferenceFixDistance;
use crate::sectors::{ReferenceFix, Sector};

const EARTH_RADIUS_NM: f64 = 3440.065;

/// Ray-casting point-in-polygon test. Vertices are `[lon, lat]` pairs; the
/// ring may be open or closed.
pub fn point_in_polygon(lon: f64, lat: f64, ring: &[[f64; 2]]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// True when `(lat, lon)` falls inside any of the sectors.
pub fn in_any_sector(lat: f64, lon: f64, sectors: &[&Sector]) -> bool {
    sectors
        .iter()
        .any(|sector| point_in_polygon(lon, lat, &sector.points))
}

pub fn distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_NM * c
}

/// Initial true bearing from the first point to the second, 0..360.
pub fn bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Nearest reference fix to the aircraft, expressed as radial/distance from
/// the fix.
pub fn closest_reference_fix(
    fixes: &[ReferenceFix],
    lat: f64,
    lon: f64,
) -> Option<ReferenceFixDistance> {
    let (fix, distance) = fixes
        .iter()
        .map(|fix| (fix, distance_nm(fix.lat, fix.lon, lat, lon)))
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    let bearing = bearing_deg(fix.lat, fix.lon, lat, lon).round() as u16 % 360;
    Some(ReferenceFixDistance {
        fix: fix.id.trim().to_ascii_uppercase(),
        bearing_deg: bearing,
        distance_nm: distance.round().min(999.0) as u16,
    })
}

#[cfg(test)]
mod tests {
    use super::{bearing_deg, closest_reference_fix, distance_nm, in_any_sector, point_in_polygon};
    use crate::sectors::{ReferenceFix, Sector};

    fn square() -> Vec<[f64; 2]> {
        vec![[-72.0, 41.0], [-70.0, 41.0], [-70.0, 43.0], [-72.0, 43.0]]
    }

    #[test]
    fn point_in_square() {
        assert!(point_in_polygon(-71.0, 42.0, &square()));
        assert!(!point_in_polygon(-69.0, 42.0, &square()));
        assert!(!point_in_polygon(-71.0, 44.0, &square()));
        assert!(!point_in_polygon(-71.0, 42.0, &square()[..2]));
    }

    #[test]
    fn any_sector_miss() {
        let sector = Sector {
            id: "37".to_string(),
            name: None,
            points: square(),
        };
        assert!(in_any_sector(42.0, -71.0, &[&sector]));
        assert!(!in_any_sector(10.0, 10.0, &[&sector]));
        assert!(!in_any_sector(42.0, -71.0, &[]));
    }

    #[test]
    fn distance_same_point_is_zero() {
        assert!(distance_nm(42.0, -71.0, 42.0, -71.0).abs() < 1e-9);
        // one degree of latitude is sixty nautical miles
        assert!((distance_nm(42.0, -71.0, 43.0, -71.0) - 60.0).abs() < 0.2);
    }

    #[test]
    fn bearing_cardinals() {
        assert!((bearing_deg(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 0.01);
        assert!((bearing_deg(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 0.01);
        assert!((bearing_deg(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 0.01);
    }

    #[test]
    fn closest_fix_picks_nearest() {
        let fixes = vec![
            ReferenceFix {
                id: "far".to_string(),
                lat: 50.0,
                lon: -71.0,
            },
            ReferenceFix {
                id: "bos".to_string(),
                lat: 42.0,
                lon: -71.0,
            },
        ];
        let rf = closest_reference_fix(&fixes, 42.2, -71.0).unwrap();
        assert_eq!(rf.fix, "BOS");
        assert_eq!(rf.bearing_deg, 0);
        assert_eq!(rf.distance_nm, 12);
        assert_eq!(rf.frd(), "BOS000012");
        assert!(closest_reference_fix(&[], 0.0, 0.0).is_none());
    }
}

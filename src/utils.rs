use dirs::data_dir;
use once_cell::sync::Lazy;
use std::{fs, path::PathBuf};

static DATA_ROOT: Lazy<PathBuf> = Lazy::new(|| {
    let base = data_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let root = base.join("event-radar");
    if let Err(err) = fs::create_dir_all(&root) {
        tracing::warn!("failed to create data root {:?}: {err}", root);
    }
    root
});

pub fn data_root() -> PathBuf {
    DATA_ROOT.clone()
}

pub fn database_path() -> PathBuf {
    data_root().join("event-radar.sqlite")
}

pub fn config_path() -> PathBuf {
    data_root().join("config.json")
}

pub fn ensure_parent(path: &PathBuf) {
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!("failed to create parent {:?}: {err}", parent);
        }
    }
}

/// Parse a crawler-supplied decimal string into a finite coordinate.
pub fn parse_coordinate(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// True when the pair is a usable WGS84 position.
pub fn valid_lat_lng(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// Round to four decimal places, the cache-cell granularity (~11 m).
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!(parse_coordinate(Some("40.7128")), Some(40.7128));
        assert_eq!(parse_coordinate(Some(" -74.0060 ")), Some(-74.0060));
        assert_eq!(parse_coordinate(Some("not a number")), None);
        assert_eq!(parse_coordinate(Some("NaN")), None);
        assert_eq!(parse_coordinate(Some("inf")), None);
        assert_eq!(parse_coordinate(None), None);
    }

    #[test]
    fn validates_coordinate_ranges() {
        assert!(valid_lat_lng(40.7128, -74.0060));
        assert!(valid_lat_lng(-90.0, 180.0));
        assert!(!valid_lat_lng(90.1, 0.0));
        assert!(!valid_lat_lng(0.0, -180.5));
        assert!(!valid_lat_lng(f64::NAN, 0.0));
    }

    #[test]
    fn rounds_to_cell_granularity() {
        assert_eq!(round4(40.712849), 40.7128);
        assert_eq!(round4(40.71286), 40.7129);
        assert_eq!(round4(-74.00601), -74.006);
    }
}

//! Locating and parsing the service records file

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TopologyError;
use crate::types::ServiceRecord;

/// Choose the service records file
///
/// A JSON file found in `override_dir` replaces `default_file`. When several
/// are present the first by file name wins. An unreadable directory falls
/// back to the default.
pub fn resolve_source_path(override_dir: &Path, default_file: &Path) -> PathBuf {
    let entries = match fs::read_dir(override_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!(
                path = %override_dir.display(),
                error = %e,
                "Cannot read service map override directory"
            );
            return default_file.to_path_buf();
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| !t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with("json"))
        })
        .collect();
    candidates.sort();

    match candidates.into_iter().next() {
        Some(path) => {
            tracing::info!(
                path = %path.display(),
                "Service map override found, replacing the default service map"
            );
            path
        }
        None => default_file.to_path_buf(),
    }
}

/// Read and parse the service records file
///
/// An empty list is accepted but logged, since the exporter will then expose
/// no availability at all.
pub fn load_records(path: &Path) -> Result<Vec<ServiceRecord>, TopologyError> {
    let content = fs::read_to_string(path).map_err(|source| TopologyError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let records: Vec<ServiceRecord> =
        serde_json::from_str(&content).map_err(|source| TopologyError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if records.is_empty() {
        tracing::error!(path = %path.display(), "Service map is empty or not well formatted");
    } else {
        tracing::info!(path = %path.display(), records = records.len(), "Service map loaded");
    }

    for record in &records {
        tracing::trace!(
            product = %record.product,
            service_type = %record.service_type,
            endpoints = ?record.endpoints,
            "Service record"
        );
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceType;
    use tempfile::TempDir;

    const SERVICES: &str = r#"[
        {"product": "Car", "type": "interactive", "endpoints": ["Wheel", "Tires"]},
        {"product": "Car", "type": "batch", "endpoints": ["tempo"]}
    ]"#;

    #[test]
    fn test_override_file_preferred() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("test.json"), SERVICES).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let default = Path::new("resources/services.json");
        let chosen = resolve_source_path(dir.path(), default);
        assert_eq!(chosen, dir.path().join("test.json"));
    }

    #[test]
    fn test_override_first_by_name() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.json"), SERVICES).unwrap();
        fs::write(dir.path().join("a.json"), SERVICES).unwrap();
        fs::create_dir(dir.path().join("0.json")).unwrap();

        let chosen = resolve_source_path(dir.path(), Path::new("default.json"));
        assert_eq!(chosen, dir.path().join("a.json"));
    }

    #[test]
    fn test_missing_override_dir_uses_default() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("WRONG");
        let default = Path::new("resources/services.json");
        assert_eq!(resolve_source_path(&missing, default), default);
    }

    #[test]
    fn test_empty_override_dir_uses_default() {
        let dir = TempDir::new().unwrap();
        let default = Path::new("resources/services.json");
        assert_eq!(resolve_source_path(dir.path(), default), default);
    }

    #[test]
    fn test_load_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("services.json");
        fs::write(&path, SERVICES).unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].service_type, ServiceType::Batch);
        assert_eq!(records[1].endpoints, vec!["tempo"]);
    }

    #[test]
    fn test_bundled_service_map() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("resources/services.json");
        let records = load_records(&path).unwrap();
        assert!(!records.is_empty());
        assert!(crate::topology::Topology::build(&records).is_ok());
    }

    #[test]
    fn test_load_records_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, "[]").unwrap();
        assert!(load_records(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_records_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = load_records(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, TopologyError::Read { .. }));
    }

    #[test]
    fn test_load_records_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "{ not json").unwrap();
        let err = load_records(&path).unwrap_err();
        assert!(matches!(err, TopologyError::Parse { .. }));
    }
}

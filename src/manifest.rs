use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Current on-disk schema version. Bumped when the layout changes shape.
pub const SCHEMA_VERSION: u32 = 1;

/// `manifest.json` at the store root: schema version, record counts, and
/// a human-readable description of the layout.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Manifest {
    pub version: String,
    pub schema_version: u32,
    pub creation_date: String,
    pub source: String,
    pub record_counts: RecordCounts,
    pub compression: String,
    pub layout: BTreeMap<String, String>,
    pub id_scheme: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RecordCounts {
    pub podcasts: u64,
    pub episodes: u64,
    pub category_index_rows: u64,
    pub hostname_index_rows: u64,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Manifest> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = Manifest {
            version: "1.0".into(),
            schema_version: SCHEMA_VERSION,
            creation_date: "2026-01-01T00:00:00Z".into(),
            source: "test".into(),
            record_counts: RecordCounts {
                podcasts: 2,
                episodes: 5,
                category_index_rows: 3,
                hostname_index_rows: 2,
            },
            compression: "zstd".into(),
            ..Manifest::default()
        };
        manifest
            .layout
            .insert("metadata/podcast_catalog.parquet".into(), "one row per podcast".into());
        manifest.save(&path).unwrap();
        let back = Manifest::load(&path).unwrap();
        assert_eq!(back, manifest);
    }
}

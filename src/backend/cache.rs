//! Durable binary cache of the lightweight lookup maps. Serialized as
//! MessagePack with a baked-in version and a fingerprint over the
//! metadata parquet files; either mismatching forces a rebuild.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ids::metadata_fingerprint;
use crate::manifest::Manifest;
use crate::store;

/// Bumped when the index layout changes so stale caches self-invalidate.
pub const CACHE_VERSION: u32 = 2;

/// The in-memory lookup maps the backend serves O(1) queries from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LookupIndexes {
    /// podcast_id -> row index in the podcast catalog.
    pub pid_to_idx: HashMap<String, usize>,
    /// lowercase title -> podcast_id (exact matches).
    pub title_lower_to_pid: HashMap<String, String>,
    /// episode_id -> row index in the episode catalog.
    pub eid_to_idx: HashMap<String, usize>,
    /// podcast_id -> episode catalog row indexes.
    pub pid_to_ep_idxs: HashMap<String, Vec<usize>>,
    pub category_to_pids: HashMap<String, BTreeSet<String>>,
    pub hostname_to_pids: HashMap<String, BTreeSet<String>>,
    pub manifest: Manifest,
    pub num_podcasts: usize,
    pub num_episodes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    fingerprint: String,
    indexes: LookupIndexes,
}

/// Load the cache when present, version-matched, and fingerprint-valid.
pub fn load(data_dir: &Path) -> Option<LookupIndexes> {
    let path = store::index_cache_path(data_dir);
    if !path.exists() {
        return None;
    }
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("failed to read index cache: {e}");
            return None;
        }
    };
    let cache: CacheFile = match rmp_serde::from_slice(&bytes) {
        Ok(cache) => cache,
        Err(e) => {
            warn!("failed to decode index cache: {e}");
            return None;
        }
    };
    if cache.version != CACHE_VERSION {
        info!("index cache version mismatch, rebuilding");
        return None;
    }
    let current = match metadata_fingerprint(&store::meta_dir(data_dir)) {
        Ok(fp) => fp,
        Err(e) => {
            warn!("failed to fingerprint metadata files: {e}");
            return None;
        }
    };
    if cache.fingerprint != current {
        info!("metadata files changed, rebuilding index cache");
        return None;
    }
    info!("loading indexes from cache {}", path.display());
    Some(cache.indexes)
}

/// Persist the lookup maps. Failures are logged, never fatal; the cache
/// is an optimization only.
pub fn save(data_dir: &Path, indexes: &LookupIndexes) {
    let path = store::index_cache_path(data_dir);
    let fingerprint = match metadata_fingerprint(&store::meta_dir(data_dir)) {
        Ok(fp) => fp,
        Err(e) => {
            warn!("failed to fingerprint metadata files: {e}");
            return;
        }
    };
    let cache = CacheFile {
        version: CACHE_VERSION,
        fingerprint,
        indexes: indexes.clone(),
    };
    match rmp_serde::to_vec_named(&cache) {
        Ok(bytes) => {
            if let Err(e) = std::fs::write(&path, bytes) {
                warn!("failed to write index cache: {e}");
            } else {
                info!("saved index cache to {}", path.display());
            }
        }
        Err(e) => warn!("failed to encode index cache: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_indexes() -> LookupIndexes {
        let mut indexes = LookupIndexes {
            num_podcasts: 1,
            num_episodes: 2,
            ..LookupIndexes::default()
        };
        indexes.pid_to_idx.insert("abc123def456".into(), 0);
        indexes
            .title_lower_to_pid
            .insert("test podcast".into(), "abc123def456".into());
        indexes.eid_to_idx.insert("e1".into(), 0);
        indexes.eid_to_idx.insert("e2".into(), 1);
        indexes
            .pid_to_ep_idxs
            .insert("abc123def456".into(), vec![0, 1]);
        indexes
            .category_to_pids
            .entry("Education".into())
            .or_default()
            .insert("abc123def456".into());
        indexes
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(store::meta_dir(root)).unwrap();
        // A parquet file so the fingerprint has something to hash.
        std::fs::write(store::meta_dir(root).join("podcast_catalog.parquet"), b"x").unwrap();

        let indexes = sample_indexes();
        save(root, &indexes);
        let loaded = load(root).expect("cache loads");
        assert_eq!(loaded, indexes);
    }

    #[test]
    fn fingerprint_change_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(store::meta_dir(root)).unwrap();
        let catalog = store::meta_dir(root).join("podcast_catalog.parquet");
        std::fs::write(&catalog, b"x").unwrap();

        save(root, &sample_indexes());
        assert!(load(root).is_some());

        // Grow the file; size participates in the fingerprint.
        std::fs::write(&catalog, b"xxxxxxxx").unwrap();
        assert!(load(root).is_none());
    }

    #[test]
    fn missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(dir.path()).is_none());
    }
}

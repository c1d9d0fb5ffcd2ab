//! Partitioned columnar store: on-disk layout, typed row builders, and
//! parquet/IPC readers and writers.

pub(crate) mod frame;
mod read;
mod rows;
mod write;

pub use frame::Frame;
pub use read::{
    read_episode_catalog, read_episode_partition, read_episode_turns, read_podcast_catalog,
    read_turn_metrics, TurnRow,
};
pub use rows::{
    audio_feature_batch, category_index_batch, episode_catalog_batch, episode_metrics_batch,
    episode_partition_batch, hostname_index_batch, podcast_catalog_batch, speaker_name_batch,
    turn_metrics_batch, turn_text_batch, AudioFeatureRow, EpisodeCatalogRow, EpisodeMetricsRow,
    EpisodePartitionRow, PodcastCatalogRow, SpeakerNameRow, TurnMetricsRow, TurnTextRow,
};
pub use write::{
    append_parquet, read_ipc, read_parquet, write_ipc, write_parquet, Codec,
};

use std::path::{Path, PathBuf};

use crate::error::Result;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SEARCH_DB_FILE: &str = "turns_search.sqlite";
pub const INDEX_CACHE_FILE: &str = "_index_cache.bin";

pub fn meta_dir(root: &Path) -> PathBuf {
    root.join("metadata")
}

pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILE)
}

pub fn podcast_catalog_path(root: &Path) -> PathBuf {
    meta_dir(root).join("podcast_catalog.parquet")
}

pub fn episode_catalog_path(root: &Path) -> PathBuf {
    meta_dir(root).join("episode_catalog.parquet")
}

pub fn category_index_path(root: &Path) -> PathBuf {
    meta_dir(root).join("category_index.parquet")
}

pub fn hostname_index_path(root: &Path) -> PathBuf {
    meta_dir(root).join("hostname_index.parquet")
}

pub fn speaker_name_index_path(root: &Path) -> PathBuf {
    meta_dir(root).join("speaker_name_index.parquet")
}

pub fn episode_metrics_path(root: &Path) -> PathBuf {
    meta_dir(root).join("episode_metrics.parquet")
}

pub fn search_db_path(root: &Path) -> PathBuf {
    meta_dir(root).join(SEARCH_DB_FILE)
}

pub fn index_cache_path(root: &Path) -> PathBuf {
    meta_dir(root).join(INDEX_CACHE_FILE)
}

pub fn podcast_df_cache_path(root: &Path) -> PathBuf {
    meta_dir(root).join("_podcast_df.arrow")
}

pub fn episode_df_cache_path(root: &Path) -> PathBuf {
    meta_dir(root).join("_episode_df.arrow")
}

pub fn episode_partition_path(root: &Path, podcast_id: &str) -> PathBuf {
    root.join("episodes")
        .join(format!("podcast_id={podcast_id}"))
        .join("data.parquet")
}

pub fn turns_partition_dir(root: &Path, podcast_id: &str) -> PathBuf {
    root.join("turns").join(format!("podcast_id={podcast_id}"))
}

pub fn turn_text_path(root: &Path, podcast_id: &str) -> PathBuf {
    turns_partition_dir(root, podcast_id).join("text.parquet")
}

pub fn audio_features_path(root: &Path, podcast_id: &str) -> PathBuf {
    turns_partition_dir(root, podcast_id).join("audio_features.parquet")
}

pub fn turn_metrics_path(root: &Path, podcast_id: &str) -> PathBuf {
    turns_partition_dir(root, podcast_id).join("metrics.parquet")
}

/// Enumerate turn partitions as `(podcast_id, partition_dir)`, sorted by
/// podcast id for deterministic processing order.
pub fn list_turn_partitions(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let turns = root.join("turns");
    let mut out = Vec::new();
    if !turns.is_dir() {
        return Ok(out);
    }
    for entry in std::fs::read_dir(&turns)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(pid) = name.strip_prefix("podcast_id=") {
            out.push((pid.to_string(), entry.path()));
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

//! Phase 1: flatten predicted host and guest names from the episode
//! catalog into a searchable name index.

use std::path::Path;

use tracing::info;

use crate::error::{CorpusError, Result};
use crate::store::{self, speaker_name_batch, Codec, SpeakerNameRow};

pub fn build(data_dir: &Path) -> Result<()> {
    let catalog_path = store::episode_catalog_path(data_dir);
    if !catalog_path.exists() {
        return Err(CorpusError::DatasetAccess(format!(
            "episode catalog not found: {} (run `convert` first)",
            catalog_path.display()
        )));
    }
    info!("phase 1: building speaker name index from {}", catalog_path.display());

    let catalog = store::read_episode_catalog(data_dir)?;
    let mut rows: Vec<SpeakerNameRow> = Vec::new();

    for i in 0..catalog.num_rows() {
        let episode_id = catalog.str_value("episode_id", i)?;
        let podcast_id = catalog.str_value("podcast_id", i)?;
        for (column, role) in [
            ("host_predicted_names", "host"),
            ("guest_predicted_names", "guest"),
        ] {
            for name in catalog.list_value(column, i)? {
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rows.push(SpeakerNameRow {
                    name_normalized: trimmed.to_lowercase(),
                    name_original: trimmed.to_string(),
                    role: role.to_string(),
                    episode_id: episode_id.clone(),
                    podcast_id: podcast_id.clone(),
                });
            }
        }
    }

    let out_path = store::speaker_name_index_path(data_dir);
    store::write_parquet(&out_path, &speaker_name_batch(&rows)?, Codec::Snappy)?;
    info!("phase 1: {} rows written to {}", rows.len(), out_path.display());
    Ok(())
}

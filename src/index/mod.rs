//! Offline index builders. Three idempotent phases, each runnable
//! standalone: speaker names, linguistic metrics, full-text search.

pub mod metrics;
pub mod search_db;
pub mod speaker_names;

use std::path::Path;

use crate::error::{CorpusError, Result};

/// Run one phase, or all three in order when `phase` is `None`.
pub fn run_phases(data_dir: &Path, phase: Option<u8>) -> Result<()> {
    if !data_dir.is_dir() {
        return Err(CorpusError::DatasetAccess(format!(
            "data directory not found: {}",
            data_dir.display()
        )));
    }
    match phase {
        None => {
            speaker_names::build(data_dir)?;
            metrics::build(data_dir)?;
            search_db::build(data_dir)?;
            Ok(())
        }
        Some(1) => speaker_names::build(data_dir),
        Some(2) => metrics::build(data_dir),
        Some(3) => search_db::build(data_dir),
        Some(other) => Err(CorpusError::InvalidArgument(format!(
            "unknown phase {other}; expected 1, 2, or 3"
        ))),
    }
}

//! Batch ingestion: two streaming passes over the compressed source
//! files plus an index pass, staged in a temp directory and renamed
//! into place atomically on success.

mod episode_pass;
mod index_pass;
mod jsonl;
mod turn_pass;

pub use episode_pass::{EpisodePassOutput, PodcastAgg};
pub use jsonl::JsonlGzReader;
pub use turn_pass::{TurnPassReport, TURN_FLUSH_THRESHOLD};

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{CorpusError, Result};

pub const EPISODE_FILE: &str = "episode_level.jsonl.gz";
pub const TURN_FILE: &str = "speaker_turn.jsonl.gz";

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Skip pass 2 (turn processing), for faster smoke runs.
    pub skip_turns: bool,
}

#[derive(Debug, Default)]
pub struct ConvertReport {
    pub podcasts: u64,
    pub episodes: u64,
    pub episode_records: u64,
    pub turn_records: u64,
    pub matched_turns: u64,
    pub unmatched_turns: u64,
}

/// Run the full conversion. Everything is written to `<output>.tmp`;
/// only a fully successful run is renamed into place, with the previous
/// output preserved as `<output>.old`.
pub fn run_convert(options: &ConvertOptions) -> Result<ConvertReport> {
    let episode_file = options.input_dir.join(EPISODE_FILE);
    let turn_file = options.input_dir.join(TURN_FILE);

    if !episode_file.exists() {
        return Err(CorpusError::DatasetAccess(format!(
            "episode file not found: {}",
            episode_file.display()
        )));
    }
    if !options.skip_turns && !turn_file.exists() {
        return Err(CorpusError::DatasetAccess(format!(
            "turn file not found: {}",
            turn_file.display()
        )));
    }

    let final_dir = options.output_dir.clone();
    let tmp_dir = staging_dir(&final_dir);
    if tmp_dir.exists() {
        info!("removing stale temp directory {}", tmp_dir.display());
        std::fs::remove_dir_all(&tmp_dir)?;
    }
    std::fs::create_dir_all(&tmp_dir)?;

    match convert_into(&episode_file, &turn_file, &tmp_dir, options) {
        Ok(report) => {
            if final_dir.exists() {
                let backup = backup_dir(&final_dir);
                if backup.exists() {
                    std::fs::remove_dir_all(&backup)?;
                }
                std::fs::rename(&final_dir, &backup)?;
                info!("moved existing output to {}", backup.display());
            }
            std::fs::rename(&tmp_dir, &final_dir)?;
            info!("output directory: {}", final_dir.display());
            Ok(report)
        }
        Err(e) => {
            warn!("conversion failed, removing {}", tmp_dir.display());
            let _ = std::fs::remove_dir_all(&tmp_dir);
            Err(e)
        }
    }
}

fn convert_into(
    episode_file: &Path,
    turn_file: &Path,
    tmp_dir: &Path,
    options: &ConvertOptions,
) -> Result<ConvertReport> {
    let pass1 = episode_pass::run(episode_file, tmp_dir)?;

    let mut report = ConvertReport {
        podcasts: pass1.podcast_agg.len() as u64,
        episodes: pass1.episode_count,
        episode_records: pass1.record_count,
        ..ConvertReport::default()
    };

    if options.skip_turns {
        info!("skipping pass 2 (turns) as requested");
    } else {
        let pass2 = turn_pass::run(turn_file, tmp_dir, &pass1.mp3url_to_pid)?;
        report.turn_records = pass2.record_count;
        report.matched_turns = pass2.matched_count;
        report.unmatched_turns = pass2.unmatched_count;
    }

    index_pass::run(
        tmp_dir,
        &pass1.podcast_agg,
        pass1.episode_count,
        &options.input_dir.display().to_string(),
    )?;

    Ok(report)
}

fn staging_dir(final_dir: &Path) -> PathBuf {
    let mut name = final_dir.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    final_dir.with_file_name(name)
}

fn backup_dir(final_dir: &Path) -> PathBuf {
    let mut name = final_dir.file_name().unwrap_or_default().to_os_string();
    name.push(".old");
    final_dir.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_and_backup_names() {
        let dir = PathBuf::from("/data/corpus/v1");
        assert_eq!(staging_dir(&dir), PathBuf::from("/data/corpus/v1.tmp"));
        assert_eq!(backup_dir(&dir), PathBuf::from("/data/corpus/v1.old"));
    }

    #[test]
    fn missing_episode_file_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let options = ConvertOptions {
            input_dir: dir.path().to_path_buf(),
            output_dir: dir.path().join("out"),
            skip_turns: true,
        };
        let err = run_convert(&options).unwrap_err();
        assert!(matches!(err, CorpusError::DatasetAccess(_)));
    }
}

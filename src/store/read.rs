//! Readers over the partitioned layout. The filesystem is the source of
//! truth; no table handles are retained across calls.

use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::store::frame::str_eq_mask;
use crate::store::{self, Frame};

/// One turn row as read back from a partition, with audio features when
/// the caller asked for the join.
#[derive(Debug, Clone, Default)]
pub struct TurnRow {
    pub episode_id: String,
    pub podcast_id: String,
    pub mp3_url: String,
    pub speaker: Vec<String>,
    pub turn_text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub turn_count: i64,
    pub inferred_speaker_role: String,
    pub inferred_speaker_name: String,
    pub mfcc1_sma3_mean: Option<f64>,
    pub mfcc2_sma3_mean: Option<f64>,
    pub mfcc3_sma3_mean: Option<f64>,
    pub mfcc4_sma3_mean: Option<f64>,
    pub f0_semitone_from_27_5hz_sma3nz_mean: Option<f64>,
    pub f1_frequency_sma3nz_mean: Option<f64>,
}

/// Extract a `TurnRow` from a text frame row (no audio columns).
fn turn_row_from_frame(frame: &Frame, row: usize) -> Result<TurnRow> {
    Ok(TurnRow {
        episode_id: frame.str_value("episode_id", row)?,
        podcast_id: frame.str_value("podcast_id", row)?,
        mp3_url: frame.str_value("mp3_url", row)?,
        speaker: frame.list_value("speaker", row)?,
        turn_text: frame.str_value("turn_text", row)?,
        start_time: frame.f64_value("start_time", row)?,
        end_time: frame.f64_value("end_time", row)?,
        duration: frame.f64_value("duration", row)?,
        turn_count: frame.i64_value("turn_count", row)?,
        inferred_speaker_role: frame.str_value("inferred_speaker_role", row)?,
        inferred_speaker_name: frame.str_value("inferred_speaker_name", row)?,
        ..TurnRow::default()
    })
}

/// Read the full podcast catalog.
pub fn read_podcast_catalog(root: &Path) -> Result<Frame> {
    store::read_parquet(&store::podcast_catalog_path(root))
}

/// Read the full episode catalog (no transcripts).
pub fn read_episode_catalog(root: &Path) -> Result<Frame> {
    store::read_parquet(&store::episode_catalog_path(root))
}

/// Read a per-podcast episode partition (includes transcripts).
/// Missing partitions read as an empty result, not an error.
pub fn read_episode_partition(root: &Path, podcast_id: &str) -> Result<Option<Frame>> {
    let path = store::episode_partition_path(root, podcast_id);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(store::read_parquet(&path)?))
}

/// Read all turns of one episode from its podcast partition, sorted by
/// start time. The episode filter is a vectorized column-equality mask;
/// when `include_audio` is set, the audio-feature file is joined on
/// `(turn_count, start_time)`.
pub fn read_episode_turns(
    root: &Path,
    podcast_id: &str,
    episode_id: &str,
    include_audio: bool,
) -> Result<Vec<TurnRow>> {
    let text_path = store::turn_text_path(root, podcast_id);
    if !text_path.exists() {
        return Ok(Vec::new());
    }

    let text = store::read_parquet(&text_path)?;
    let mask = str_eq_mask(&text, "episode_id", episode_id)?;
    let text = text.filter(&mask)?;
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let text = text.sort_by("start_time", false)?;

    let mut rows = Vec::with_capacity(text.num_rows());
    for i in 0..text.num_rows() {
        rows.push(turn_row_from_frame(&text, i)?);
    }

    if include_audio {
        let audio_path = store::audio_features_path(root, podcast_id);
        if audio_path.exists() {
            let audio = store::read_parquet(&audio_path)?;
            let mask = str_eq_mask(&audio, "episode_id", episode_id)?;
            let audio = audio.filter(&mask)?;
            // Key audio rows by (turn_count, start_time bits); float bits
            // are exact because both files carry the same parsed values.
            let mut by_key: HashMap<(i64, u64), usize> = HashMap::new();
            for i in 0..audio.num_rows() {
                let key = (
                    audio.i64_value("turn_count", i)?,
                    audio.f64_value("start_time", i)?.to_bits(),
                );
                by_key.entry(key).or_insert(i);
            }
            for row in &mut rows {
                let key = (row.turn_count, row.start_time.to_bits());
                if let Some(&i) = by_key.get(&key) {
                    row.mfcc1_sma3_mean = audio.opt_f64_value("mfcc1_sma3_mean", i)?;
                    row.mfcc2_sma3_mean = audio.opt_f64_value("mfcc2_sma3_mean", i)?;
                    row.mfcc3_sma3_mean = audio.opt_f64_value("mfcc3_sma3_mean", i)?;
                    row.mfcc4_sma3_mean = audio.opt_f64_value("mfcc4_sma3_mean", i)?;
                    row.f0_semitone_from_27_5hz_sma3nz_mean =
                        audio.opt_f64_value("f0_semitone_from_27_5hz_sma3nz_mean", i)?;
                    row.f1_frequency_sma3nz_mean =
                        audio.opt_f64_value("f1_frequency_sma3nz_mean", i)?;
                }
            }
        }
    }

    Ok(rows)
}

/// Read precomputed per-turn metrics for one episode, sorted by
/// `turn_count`. Returns `None` when the partition metrics file has not
/// been built.
pub fn read_turn_metrics(root: &Path, podcast_id: &str, episode_id: &str) -> Result<Option<Frame>> {
    let path = store::turn_metrics_path(root, podcast_id);
    if !path.exists() {
        return Ok(None);
    }
    let frame = store::read_parquet(&path)?;
    let mask = str_eq_mask(&frame, "episode_id", episode_id)?;
    let frame = frame.filter(&mask)?;
    if frame.is_empty() {
        return Ok(Some(frame));
    }
    Ok(Some(frame.sort_by("turn_count", false)?))
}

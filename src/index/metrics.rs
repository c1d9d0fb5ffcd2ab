//! Phase 2: per-turn and per-episode linguistic metrics.
//!
//! Each turn partition is processed independently (in parallel): rows
//! are grouped by episode and ordered by start time, so gaps and
//! overlaps derive from temporal order even when the recorded
//! `turn_count` disagrees with it. The two signals are intentionally
//! not reconciled.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use tracing::{info, warn};

use crate::error::{CorpusError, Result};
use crate::store::{
    self, episode_metrics_batch, turn_metrics_batch, Codec, EpisodeMetricsRow, Frame,
    TurnMetricsRow,
};

/// Closed set of English discourse markers, matched on word boundaries
/// so `so` never fires inside `some` and `like` never inside
/// `likelihood`.
static DISCOURSE_MARKERS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(um|uh|uh huh|mm hmm|like|you know|i mean|so|well|right|okay|oh)\b")
        .expect("discourse marker pattern is valid")
});

pub fn count_discourse_markers(text: &str) -> i64 {
    DISCOURSE_MARKERS.find_iter(text).count() as i64
}

pub fn count_words(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Build `turns/podcast_id=*/metrics.parquet` and the global
/// `metadata/episode_metrics.parquet`.
pub fn build(data_dir: &Path) -> Result<()> {
    let turns_root = data_dir.join("turns");
    if !turns_root.is_dir() {
        return Err(CorpusError::DatasetAccess(format!(
            "turn partitions not found under {} (run `convert` first)",
            turns_root.display()
        )));
    }

    info!("phase 2: building episode and turn metrics");
    let partitions = store::list_turn_partitions(data_dir)?;
    info!("phase 2: found {} turn partitions", partitions.len());

    let style = ProgressStyle::with_template("{bar:30} {pos}/{len} partitions")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let pb = ProgressBar::new(partitions.len() as u64).with_style(style);

    let per_partition: Vec<Vec<EpisodeMetricsRow>> = partitions
        .par_iter()
        .progress_with(pb)
        .map(|(podcast_id, _dir)| match process_partition(data_dir, podcast_id) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("failed to process partition {podcast_id}: {e}");
                Vec::new()
            }
        })
        .collect();

    let episode_rows: Vec<EpisodeMetricsRow> = per_partition.into_iter().flatten().collect();
    let out_path = store::episode_metrics_path(data_dir);
    store::write_parquet(&out_path, &episode_metrics_batch(&episode_rows)?, Codec::Snappy)?;
    info!(
        "phase 2: {} episode metric rows written to {}",
        episode_rows.len(),
        out_path.display()
    );
    Ok(())
}

fn process_partition(data_dir: &Path, podcast_id: &str) -> Result<Vec<EpisodeMetricsRow>> {
    let text_path = store::turn_text_path(data_dir, podcast_id);
    if !text_path.exists() {
        return Ok(Vec::new());
    }
    let frame = store::read_parquet(&text_path)?;
    if frame.is_empty() {
        return Ok(Vec::new());
    }

    // Group row indices by episode, preserving first-appearance order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for i in 0..frame.num_rows() {
        let eid = frame.str_value("episode_id", i)?;
        if !groups.contains_key(&eid) {
            order.push(eid.clone());
        }
        groups.entry(eid).or_default().push(i);
    }

    let mut turn_rows: Vec<TurnMetricsRow> = Vec::with_capacity(frame.num_rows());
    let mut episode_rows: Vec<EpisodeMetricsRow> = Vec::with_capacity(order.len());

    for eid in order {
        let mut indices = groups.remove(&eid).unwrap_or_default();
        indices.sort_by(|&a, &b| {
            let sa = frame.f64_value("start_time", a).unwrap_or(0.0);
            let sb = frame.f64_value("start_time", b).unwrap_or(0.0);
            sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
        });
        episode_rows.push(process_episode(&frame, podcast_id, &eid, &indices, &mut turn_rows)?);
    }

    store::write_parquet(
        &store::turn_metrics_path(data_dir, podcast_id),
        &turn_metrics_batch(&turn_rows)?,
        Codec::Snappy,
    )?;
    Ok(episode_rows)
}

fn process_episode(
    frame: &Frame,
    podcast_id: &str,
    episode_id: &str,
    indices: &[usize],
    turn_rows: &mut Vec<TurnMetricsRow>,
) -> Result<EpisodeMetricsRow> {
    let mut total_words: i64 = 0;
    let mut host_words: i64 = 0;
    let mut guest_words: i64 = 0;
    let mut host_turns: i64 = 0;
    let mut dm_count: i64 = 0;
    let mut durations: Vec<f64> = Vec::new();
    let mut gaps: Vec<f64> = Vec::new();
    let mut overlaps: Vec<f64> = Vec::new();
    let mut host_duration = 0.0;
    let mut guest_duration = 0.0;
    let mut speakers: BTreeSet<String> = BTreeSet::new();
    let mut prev_end: Option<f64> = None;

    for &idx in indices {
        let text = frame.str_value("turn_text", idx)?;
        let start = frame.f64_value("start_time", idx)?;
        let end = frame.f64_value("end_time", idx)?;
        let duration = frame.f64_value("duration", idx)?;
        let turn_count = frame.i64_value("turn_count", idx)?;
        let role = frame.str_value("inferred_speaker_role", idx)?.to_lowercase();

        let words = count_words(&text);
        let markers = count_discourse_markers(&text);
        let chars = text.chars().count() as i64;
        let wps = if duration > 0.0 {
            words as f64 / duration
        } else {
            0.0
        };

        // Gap and overlap against the previous turn in start-time order.
        let (gap, overlap) = match prev_end {
            Some(prev) if start > 0.0 => {
                let diff = start - prev;
                if diff >= 0.0 {
                    (Some(diff), Some(0.0))
                } else {
                    (Some(0.0), Some(diff.abs()))
                }
            }
            _ => (None, None),
        };

        total_words += words;
        dm_count += markers;
        if duration > 0.0 {
            durations.push(duration);
        }
        if let Some(g) = gap {
            if g > 0.0 {
                gaps.push(g);
            }
        }
        if let Some(o) = overlap {
            if o > 0.0 {
                overlaps.push(o);
            }
        }
        for label in frame.list_value("speaker", idx)? {
            speakers.insert(label);
        }
        if role.contains("host") {
            host_words += words;
            host_turns += 1;
            if duration > 0.0 {
                host_duration += duration;
            }
        } else if role.contains("guest") {
            guest_words += words;
            if duration > 0.0 {
                guest_duration += duration;
            }
        }

        turn_rows.push(TurnMetricsRow {
            episode_id: episode_id.to_string(),
            turn_count,
            word_count: words,
            words_per_second: wps,
            gap_from_prev: gap,
            overlap_with_prev: overlap,
            discourse_marker_count: markers,
            char_count: chars,
        });

        if end > 0.0 {
            prev_end = Some(end);
        }
    }

    let total_turns = indices.len() as i64;
    let total_duration: f64 = durations.iter().sum();
    let avg_wps = if total_duration > 0.0 {
        total_words as f64 / total_duration
    } else {
        0.0
    };
    let dm_rate = if total_words > 0 {
        dm_count as f64 / total_words as f64 * 1000.0
    } else {
        0.0
    };

    Ok(EpisodeMetricsRow {
        episode_id: episode_id.to_string(),
        podcast_id: podcast_id.to_string(),
        total_word_count: total_words,
        total_turn_count: total_turns,
        unique_speaker_count: speakers.len() as i64,
        avg_turn_duration: mean(&durations),
        median_turn_duration: median(&durations),
        avg_words_per_second: avg_wps,
        host_word_count: host_words,
        guest_word_count: guest_words,
        host_turn_proportion: if total_turns > 0 {
            host_turns as f64 / total_turns as f64
        } else {
            0.0
        },
        host_word_proportion: if total_words > 0 {
            host_words as f64 / total_words as f64
        } else {
            0.0
        },
        avg_gap_duration: mean(&gaps),
        total_overlap_duration: overlaps.iter().sum(),
        discourse_marker_count: dm_count,
        discourse_marker_rate: dm_rate,
        speaking_rate_host: if host_duration > 0.0 {
            host_words as f64 / host_duration
        } else {
            0.0
        },
        speaking_rate_guest: if guest_duration > 0.0 {
            guest_words as f64 / guest_duration
        } else {
            0.0
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{turn_text_batch, write_parquet, TurnTextRow};

    #[test]
    fn discourse_markers_respect_word_boundaries() {
        assert!(count_discourse_markers("um well you know I think like that's right") >= 5);
        assert_eq!(count_discourse_markers("the cat sat on the mat"), 0);
        // `some` must not match `so`; `likelihood` must not match `like`.
        assert_eq!(count_discourse_markers("some things are good"), 0);
        assert_eq!(count_discourse_markers("the likelihood is high"), 0);
        assert_eq!(count_discourse_markers("Um, UH HUH, okay"), 3);
    }

    #[test]
    fn word_count_is_whitespace_split() {
        assert_eq!(count_words("the quick  brown fox"), 4);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn median_handles_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    fn turn(eid: &str, start: f64, end: f64, tc: i64, role: &str, text: &str) -> TurnTextRow {
        TurnTextRow {
            episode_id: eid.to_string(),
            podcast_id: "p1".into(),
            mp3_url: "http://x/1.mp3".into(),
            speaker: vec![format!("SPEAKER_{tc:02}")],
            turn_text: text.to_string(),
            start_time: start,
            end_time: end,
            duration: end - start,
            turn_count: tc,
            inferred_speaker_role: role.into(),
            inferred_speaker_name: String::new(),
        }
    }

    #[test]
    fn gap_and_overlap_from_temporal_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // Written out of temporal order on purpose.
        let rows = vec![
            turn("e1", 12.0, 20.0, 2, "guest", "three words here"),
            turn("e1", 1.0, 10.0, 1, "host", "um well this is the host speaking"),
            turn("e1", 9.0, 12.0, 3, "guest", "overlapping reply"),
        ];
        write_parquet(
            &store::turn_text_path(root, "p1"),
            &turn_text_batch(&rows).unwrap(),
            Codec::Zstd,
        )
        .unwrap();

        let episode_rows = process_partition(root, "p1").unwrap();
        assert_eq!(episode_rows.len(), 1);
        let em = &episode_rows[0];
        assert_eq!(em.total_turn_count, 3);
        assert_eq!(em.unique_speaker_count, 3);
        assert_eq!(em.host_word_count, 7);
        assert_eq!(em.guest_word_count, 5);
        // One overlap of 1s (12->9), no positive gaps.
        assert!((em.total_overlap_duration - 1.0).abs() < 1e-9);
        assert_eq!(em.avg_gap_duration, 0.0);

        let metrics = store::read_parquet(&store::turn_metrics_path(root, "p1")).unwrap();
        assert_eq!(metrics.num_rows(), 3);
        // Rows follow start-time order; first turn has no previous.
        assert_eq!(metrics.i64_value("turn_count", 0).unwrap(), 1);
        assert_eq!(metrics.opt_f64_value("gap_from_prev", 0).unwrap(), None);
        assert_eq!(
            metrics.opt_f64_value("overlap_with_prev", 1).unwrap(),
            Some(1.0)
        );
        assert_eq!(metrics.opt_f64_value("gap_from_prev", 2).unwrap(), Some(0.0));
    }
}

//! Queries over the precomputed metric indexes.

use arrow::array::BooleanArray;

use crate::backend::records::{EpisodeMetricsRecord, TurnMetricsRecord};
use crate::backend::CorpusBackend;
use crate::error::{CorpusError, Result};
use crate::store::frame::{and_mask, f64_ge_mask, f64_le_mask, i64_ge_mask, i64_le_mask, str_eq_mask};
use crate::store;

/// Inclusive min/max bounds over the episode metric columns.
#[derive(Debug, Clone, Default)]
pub struct MetricsFilter {
    pub min_word_count: Option<i64>,
    pub max_word_count: Option<i64>,
    pub min_turn_count: Option<i64>,
    pub max_turn_count: Option<i64>,
    pub min_speaking_rate: Option<f64>,
    pub max_speaking_rate: Option<f64>,
    pub min_discourse_marker_rate: Option<f64>,
    pub max_discourse_marker_rate: Option<f64>,
    pub min_host_proportion: Option<f64>,
    pub max_host_proportion: Option<f64>,
    pub min_avg_gap: Option<f64>,
    pub max_avg_gap: Option<f64>,
}

impl CorpusBackend {
    /// Precomputed metrics for one episode, or `None` when the episode
    /// has no metric row.
    pub fn get_episode_metrics(&self, episode_id: &str) -> Result<Option<EpisodeMetricsRecord>> {
        let frame = self.episode_metrics_frame()?;
        let mask = str_eq_mask(&frame, "episode_id", episode_id)?;
        let matched = frame.filter(&mask)?;
        if matched.is_empty() {
            Ok(None)
        } else {
            Ok(Some(EpisodeMetricsRecord::from_frame(&matched, 0)?))
        }
    }

    /// Vectorized filter over the episode metrics catalog.
    pub fn filter_episodes_by_metrics(
        &self,
        filter: &MetricsFilter,
        limit: usize,
    ) -> Result<Vec<EpisodeMetricsRecord>> {
        let frame = self.episode_metrics_frame()?;

        let mut masks: Vec<BooleanArray> = Vec::new();
        if let Some(v) = filter.min_word_count {
            masks.push(i64_ge_mask(&frame, "total_word_count", v)?);
        }
        if let Some(v) = filter.max_word_count {
            masks.push(i64_le_mask(&frame, "total_word_count", v)?);
        }
        if let Some(v) = filter.min_turn_count {
            masks.push(i64_ge_mask(&frame, "total_turn_count", v)?);
        }
        if let Some(v) = filter.max_turn_count {
            masks.push(i64_le_mask(&frame, "total_turn_count", v)?);
        }
        if let Some(v) = filter.min_speaking_rate {
            masks.push(f64_ge_mask(&frame, "avg_words_per_second", v)?);
        }
        if let Some(v) = filter.max_speaking_rate {
            masks.push(f64_le_mask(&frame, "avg_words_per_second", v)?);
        }
        if let Some(v) = filter.min_discourse_marker_rate {
            masks.push(f64_ge_mask(&frame, "discourse_marker_rate", v)?);
        }
        if let Some(v) = filter.max_discourse_marker_rate {
            masks.push(f64_le_mask(&frame, "discourse_marker_rate", v)?);
        }
        if let Some(v) = filter.min_host_proportion {
            masks.push(f64_ge_mask(&frame, "host_word_proportion", v)?);
        }
        if let Some(v) = filter.max_host_proportion {
            masks.push(f64_le_mask(&frame, "host_word_proportion", v)?);
        }
        if let Some(v) = filter.min_avg_gap {
            masks.push(f64_ge_mask(&frame, "avg_gap_duration", v)?);
        }
        if let Some(v) = filter.max_avg_gap {
            masks.push(f64_le_mask(&frame, "avg_gap_duration", v)?);
        }

        let mut result = (*frame).clone();
        let mut iter = masks.into_iter();
        if let Some(first) = iter.next() {
            let mut combined = first;
            for mask in iter {
                combined = and_mask(&combined, &mask)?;
            }
            result = result.filter(&combined)?;
        }
        let result = result.head(limit);

        let mut records = Vec::with_capacity(result.num_rows());
        for i in 0..result.num_rows() {
            records.push(EpisodeMetricsRecord::from_frame(&result, i)?);
        }
        Ok(records)
    }

    /// Per-turn metrics for one episode, ordered by `turn_count`.
    /// Fails with `IndexNotBuilt` when the partition metrics file has
    /// not been produced by builder phase 2.
    pub fn get_turn_metrics(
        &self,
        podcast_id: &str,
        episode_id: &str,
    ) -> Result<Vec<TurnMetricsRecord>> {
        let Some(frame) = store::read_turn_metrics(&self.data_dir, podcast_id, episode_id)? else {
            return Err(CorpusError::index_not_built(
                store::turn_metrics_path(&self.data_dir, podcast_id),
                2,
            ));
        };
        let mut records = Vec::with_capacity(frame.num_rows());
        for i in 0..frame.num_rows() {
            records.push(TurnMetricsRecord::from_frame(&frame, i)?);
        }
        Ok(records)
    }
}

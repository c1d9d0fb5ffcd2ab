//! Filtered episode search, dataset statistics, and speaker-name search.

use std::collections::BTreeMap;
use std::collections::HashSet;

use arrow::array::{Array, BooleanArray, BooleanBuilder};

use crate::backend::records::{DatasetStatistics, EpisodeRecord, SpeakerNameHit};
use crate::backend::CorpusBackend;
use crate::error::Result;
use crate::store::frame::{
    and_mask, f64_ge_mask, f64_le_mask, i64_ge_mask, i64_le_mask, str_eq_mask,
};
use crate::store::Frame;

/// Conjunctive filters over the episode catalog. All bounds are
/// inclusive.
#[derive(Debug, Clone, Default)]
pub struct EpisodeSearchCriteria {
    pub min_duration: Option<f64>,
    pub max_duration: Option<f64>,
    pub min_speakers: Option<i64>,
    pub max_speakers: Option<i64>,
    /// Case-insensitive exact match.
    pub language: Option<String>,
    pub podcast_id: Option<String>,
    /// Substring over lowercased podcast titles.
    pub podcast_name: Option<String>,
    /// Substring over category index keys.
    pub category: Option<String>,
    pub subcategory: Option<String>,
    /// Substring over the host name list, row by row.
    pub host_name: Option<String>,
    pub guest_name: Option<String>,
    pub min_overlap_prop_duration: Option<f64>,
    pub max_overlap_prop_duration: Option<f64>,
}

fn lowercase_eq_mask(frame: &Frame, column: &str, value: &str) -> Result<BooleanArray> {
    let target = value.to_lowercase();
    let col = frame.str_col(column)?;
    let mut builder = BooleanBuilder::with_capacity(frame.num_rows());
    for i in 0..frame.num_rows() {
        let matched = !col.is_null(i) && col.value(i).to_lowercase() == target;
        builder.append_value(matched);
    }
    Ok(builder.finish())
}

fn membership_mask(frame: &Frame, column: &str, members: &HashSet<String>) -> Result<BooleanArray> {
    let col = frame.str_col(column)?;
    let mut builder = BooleanBuilder::with_capacity(frame.num_rows());
    for i in 0..frame.num_rows() {
        let matched = !col.is_null(i) && members.contains(col.value(i));
        builder.append_value(matched);
    }
    Ok(builder.finish())
}

/// Row-wise substring match over a list column.
fn list_contains_mask(frame: &Frame, column: &str, needle: &str) -> Result<BooleanArray> {
    let needle = needle.to_lowercase();
    let mut builder = BooleanBuilder::with_capacity(frame.num_rows());
    for i in 0..frame.num_rows() {
        let names = frame.list_value(column, i)?;
        let matched = names.iter().any(|n| n.to_lowercase().contains(&needle));
        builder.append_value(matched);
    }
    Ok(builder.finish())
}

impl CorpusBackend {
    /// Filter the episode catalog. Filters are conjunctive; each one is
    /// a vectorized mask over the catalog frame.
    pub fn search_episodes(&self, criteria: &EpisodeSearchCriteria) -> Result<Vec<EpisodeRecord>> {
        let mut frame = (*self.episode_frame()?).clone();

        let mut masks: Vec<BooleanArray> = Vec::new();
        if let Some(v) = criteria.min_duration {
            masks.push(f64_ge_mask(&frame, "duration_seconds", v)?);
        }
        if let Some(v) = criteria.max_duration {
            masks.push(f64_le_mask(&frame, "duration_seconds", v)?);
        }
        if let Some(v) = criteria.min_speakers {
            masks.push(i64_ge_mask(&frame, "num_main_speakers", v)?);
        }
        if let Some(v) = criteria.max_speakers {
            masks.push(i64_le_mask(&frame, "num_main_speakers", v)?);
        }
        if let Some(language) = &criteria.language {
            masks.push(lowercase_eq_mask(&frame, "language", language)?);
        }
        if let Some(pid) = &criteria.podcast_id {
            masks.push(str_eq_mask(&frame, "podcast_id", pid)?);
        }
        if let Some(name) = &criteria.podcast_name {
            let name_lower = name.to_lowercase();
            let pids: HashSet<String> = self
                .indexes()
                .title_lower_to_pid
                .iter()
                .filter(|(title, _)| title.contains(&name_lower))
                .map(|(_, pid)| pid.clone())
                .collect();
            masks.push(membership_mask(&frame, "podcast_id", &pids)?);
        }
        for category in [&criteria.category, &criteria.subcategory].into_iter().flatten() {
            let needle = category.to_lowercase();
            let pids: HashSet<String> = self
                .indexes()
                .category_to_pids
                .iter()
                .filter(|(key, _)| key.to_lowercase().contains(&needle))
                .flat_map(|(_, pids)| pids.iter().cloned())
                .collect();
            masks.push(membership_mask(&frame, "podcast_id", &pids)?);
        }
        if let Some(v) = criteria.min_overlap_prop_duration {
            masks.push(f64_ge_mask(&frame, "overlap_prop_duration", v)?);
        }
        if let Some(v) = criteria.max_overlap_prop_duration {
            masks.push(f64_le_mask(&frame, "overlap_prop_duration", v)?);
        }

        if let Some(combined) = combine(masks)? {
            frame = frame.filter(&combined)?;
        }

        // Name filters run row-by-row over the (already narrowed) frame.
        if let Some(host) = &criteria.host_name {
            let mask = list_contains_mask(&frame, "host_predicted_names", host)?;
            frame = frame.filter(&mask)?;
        }
        if let Some(guest) = &criteria.guest_name {
            let mask = list_contains_mask(&frame, "guest_predicted_names", guest)?;
            frame = frame.filter(&mask)?;
        }

        let mut records = Vec::with_capacity(frame.num_rows());
        for i in 0..frame.num_rows() {
            records.push(EpisodeRecord::from_catalog(&frame, i)?);
        }
        Ok(records)
    }

    /// Corpus-wide statistics from the in-memory catalogs. Zeroed on an
    /// empty corpus.
    pub fn get_statistics(&self) -> Result<DatasetStatistics> {
        let podcast_frame = self.podcast_frame()?;
        let episode_frame = self.episode_frame()?;

        let total_podcasts = podcast_frame.num_rows();
        let total_episodes = episode_frame.num_rows();

        let durations = episode_frame.f64_col("duration_seconds")?;
        let total_duration_seconds =
            arrow::compute::kernels::aggregate::sum(durations).unwrap_or(0.0);
        let avg_episode_duration_minutes = if total_episodes > 0 {
            total_duration_seconds / total_episodes as f64 / 60.0
        } else {
            0.0
        };

        let mut category_distribution: BTreeMap<String, u64> = BTreeMap::new();
        for slot in 1..=10u8 {
            let col = episode_frame.str_col(&format!("category{slot}"))?;
            for i in 0..col.len() {
                if col.is_null(i) {
                    continue;
                }
                let value = col.value(i).trim();
                if !value.is_empty() {
                    *category_distribution.entry(value.to_string()).or_insert(0) += 1;
                }
            }
        }

        let mut language_distribution: BTreeMap<String, u64> = BTreeMap::new();
        let languages = episode_frame.str_col("language")?;
        for i in 0..languages.len() {
            if !languages.is_null(i) {
                *language_distribution
                    .entry(languages.value(i).to_string())
                    .or_insert(0) += 1;
            }
        }

        let mut speaker_distribution: BTreeMap<i64, u64> = BTreeMap::new();
        let speakers = episode_frame.i64_col("num_main_speakers")?;
        for i in 0..speakers.len() {
            if !speakers.is_null(i) {
                *speaker_distribution.entry(speakers.value(i)).or_insert(0) += 1;
            }
        }

        Ok(DatasetStatistics {
            total_podcasts,
            total_episodes,
            total_duration_hours: total_duration_seconds / 3600.0,
            avg_episode_duration_minutes,
            category_distribution,
            language_distribution,
            speaker_distribution,
        })
    }

    /// Find episodes featuring a speaker by predicted name. Exact or
    /// substring over the normalized (lowercased) name, optional role
    /// filter, at most `limit` rows.
    pub fn search_by_speaker_name(
        &self,
        name: &str,
        role: Option<&str>,
        exact: bool,
        limit: usize,
    ) -> Result<Vec<SpeakerNameHit>> {
        let frame = self.speaker_index_frame()?;
        let name_lower = name.to_lowercase().trim().to_string();
        let role_lower = role.map(str::to_lowercase);

        let mut hits = Vec::new();
        let names = frame.str_col("name_normalized")?;
        let roles = frame.str_col("role")?;
        for i in 0..frame.num_rows() {
            if hits.len() >= limit {
                break;
            }
            let candidate = names.value(i);
            let name_matches = if exact {
                candidate == name_lower
            } else {
                candidate.contains(&name_lower)
            };
            if !name_matches {
                continue;
            }
            if let Some(wanted) = &role_lower {
                if roles.value(i) != wanted {
                    continue;
                }
            }
            hits.push(SpeakerNameHit {
                episode_id: frame.str_value("episode_id", i)?,
                podcast_id: frame.str_value("podcast_id", i)?,
                name_original: frame.str_value("name_original", i)?,
                role: frame.str_value("role", i)?,
            });
        }
        Ok(hits)
    }
}

fn combine(masks: Vec<BooleanArray>) -> Result<Option<BooleanArray>> {
    let mut iter = masks.into_iter();
    let Some(first) = iter.next() else {
        return Ok(None);
    };
    let mut combined = first;
    for mask in iter {
        combined = and_mask(&combined, &mask)?;
    }
    Ok(Some(combined))
}

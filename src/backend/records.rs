//! Typed views over catalog and index rows returned by the backend.

use serde::Serialize;

use crate::error::Result;
use crate::store::Frame;

/// One podcast catalog row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PodcastRecord {
    pub podcast_id: String,
    pub rss_url: String,
    pub pod_title: String,
    pub pod_description: String,
    pub language: String,
    pub explicit: i64,
    pub image_url: String,
    pub itunes_author: String,
    pub episode_count: i64,
    pub total_duration_seconds: f64,
    pub primary_category: String,
    pub all_categories: Vec<String>,
    pub host_names: Vec<String>,
    pub earliest_date: String,
    pub latest_date: String,
}

impl PodcastRecord {
    pub fn from_frame(frame: &Frame, row: usize) -> Result<Self> {
        Ok(PodcastRecord {
            podcast_id: frame.str_value("podcast_id", row)?,
            rss_url: frame.str_value("rss_url", row)?,
            pod_title: frame.str_value("pod_title", row)?,
            pod_description: frame.str_value("pod_description", row)?,
            language: frame.str_value("language", row)?,
            explicit: frame.i64_value("explicit", row)?,
            image_url: frame.str_value("image_url", row)?,
            itunes_author: frame.str_value("itunes_author", row)?,
            episode_count: frame.i64_value("episode_count", row)?,
            total_duration_seconds: frame.f64_value("total_duration_seconds", row)?,
            primary_category: frame.str_value("primary_category", row)?,
            all_categories: frame.list_value("all_categories", row)?,
            host_names: frame.list_value("host_names", row)?,
            earliest_date: frame.str_value("earliest_date", row)?,
            latest_date: frame.str_value("latest_date", row)?,
        })
    }
}

/// One episode row, from the catalog (no transcript) or a per-podcast
/// partition (with transcript).
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeRecord {
    pub episode_id: String,
    pub podcast_id: String,
    pub ep_title: String,
    pub mp3_url: String,
    pub duration_seconds: f64,
    /// Non-empty categories in slot order.
    pub categories: Vec<String>,
    pub host_predicted_names: Vec<String>,
    pub guest_predicted_names: Vec<String>,
    pub num_main_speakers: i64,
    pub language: String,
    pub explicit: i64,
    pub episode_date: String,
    pub overlap_prop_duration: f64,
    pub avg_turn_duration: f64,
    pub total_sp_labels: i64,
    /// Present only when read from a partition file.
    pub transcript: Option<String>,
}

const CATEGORY_COLUMNS: [&str; 10] = [
    "category1",
    "category2",
    "category3",
    "category4",
    "category5",
    "category6",
    "category7",
    "category8",
    "category9",
    "category10",
];

fn categories_from_row(frame: &Frame, row: usize) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for column in CATEGORY_COLUMNS {
        let value = frame.str_value(column, row)?;
        if !value.is_empty() {
            out.push(value);
        }
    }
    Ok(out)
}

impl EpisodeRecord {
    pub fn from_catalog(frame: &Frame, row: usize) -> Result<Self> {
        Ok(EpisodeRecord {
            episode_id: frame.str_value("episode_id", row)?,
            podcast_id: frame.str_value("podcast_id", row)?,
            ep_title: frame.str_value("ep_title", row)?,
            mp3_url: frame.str_value("mp3_url", row)?,
            duration_seconds: frame.f64_value("duration_seconds", row)?,
            categories: categories_from_row(frame, row)?,
            host_predicted_names: frame.list_value("host_predicted_names", row)?,
            guest_predicted_names: frame.list_value("guest_predicted_names", row)?,
            num_main_speakers: frame.i64_value("num_main_speakers", row)?,
            language: frame.str_value("language", row)?,
            explicit: frame.i64_value("explicit", row)?,
            episode_date: frame.str_value("episode_date", row)?,
            overlap_prop_duration: frame.f64_value("overlap_prop_duration", row)?,
            avg_turn_duration: frame.f64_value("avg_turn_duration", row)?,
            total_sp_labels: frame.i64_value("total_sp_labels", row)?,
            transcript: None,
        })
    }

    pub fn from_partition(frame: &Frame, row: usize) -> Result<Self> {
        Ok(EpisodeRecord {
            episode_id: frame.str_value("episode_id", row)?,
            podcast_id: frame.str_value("podcast_id", row)?,
            ep_title: frame.str_value("ep_title", row)?,
            mp3_url: frame.str_value("mp3_url", row)?,
            duration_seconds: frame.f64_value("duration_seconds", row)?,
            categories: categories_from_row(frame, row)?,
            host_predicted_names: frame.list_value("host_predicted_names", row)?,
            guest_predicted_names: frame.list_value("guest_predicted_names", row)?,
            num_main_speakers: frame.i64_value("num_main_speakers", row)?,
            language: frame.str_value("language", row)?,
            explicit: frame.i64_value("explicit", row)?,
            episode_date: frame.str_value("episode_date_localized", row)?,
            overlap_prop_duration: frame.f64_value("overlap_prop_duration", row)?,
            avg_turn_duration: frame.f64_value("avg_turn_duration", row)?,
            total_sp_labels: frame.i64_value("total_sp_labels", row)?,
            transcript: Some(frame.str_value("transcript", row)?),
        })
    }
}

/// One full-text search hit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnSearchHit {
    pub episode_id: String,
    pub podcast_id: String,
    pub turn_count: i64,
    pub turn_text: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub speaker_role: String,
    pub speaker_name: String,
    pub word_count: i64,
    pub score: f64,
}

/// Episode-level aggregation of text search hits.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeTextMatch {
    pub episode_id: String,
    pub podcast_id: String,
    pub match_count: i64,
    pub best_score: f64,
}

/// One speaker-name index hit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpeakerNameHit {
    pub episode_id: String,
    pub podcast_id: String,
    pub name_original: String,
    pub role: String,
}

/// One key-word-in-context result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KwicHit {
    pub left_context: String,
    pub keyword: String,
    pub right_context: String,
    pub episode_id: String,
    pub podcast_id: String,
    pub speaker_role: String,
    pub speaker_name: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// Estimated audio window for one word occurrence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WordAudioEstimate {
    pub mp3_url: String,
    pub estimated_start: f64,
    pub estimated_end: f64,
    pub turn_start: f64,
    pub turn_end: f64,
    pub turn_text: String,
    /// `min(1, 10 / max(turn_duration, 1))`; long turns estimate poorly.
    pub confidence: f64,
}

/// Per-turn metric record, ordered by `turn_count`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnMetricsRecord {
    pub episode_id: String,
    pub turn_count: i64,
    pub word_count: i64,
    pub words_per_second: f64,
    pub gap_from_prev: Option<f64>,
    pub overlap_with_prev: Option<f64>,
    pub discourse_marker_count: i64,
    pub char_count: i64,
}

impl TurnMetricsRecord {
    pub fn from_frame(frame: &Frame, row: usize) -> Result<Self> {
        Ok(TurnMetricsRecord {
            episode_id: frame.str_value("episode_id", row)?,
            turn_count: frame.i64_value("turn_count", row)?,
            word_count: frame.i64_value("word_count", row)?,
            words_per_second: frame.f64_value("words_per_second", row)?,
            gap_from_prev: frame.opt_f64_value("gap_from_prev", row)?,
            overlap_with_prev: frame.opt_f64_value("overlap_with_prev", row)?,
            discourse_marker_count: frame.i64_value("discourse_marker_count", row)?,
            char_count: frame.i64_value("char_count", row)?,
        })
    }
}

/// Per-episode metric record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeMetricsRecord {
    pub episode_id: String,
    pub podcast_id: String,
    pub total_word_count: i64,
    pub total_turn_count: i64,
    pub unique_speaker_count: i64,
    pub avg_turn_duration: f64,
    pub median_turn_duration: f64,
    pub avg_words_per_second: f64,
    pub host_word_count: i64,
    pub guest_word_count: i64,
    pub host_turn_proportion: f64,
    pub host_word_proportion: f64,
    pub avg_gap_duration: f64,
    pub total_overlap_duration: f64,
    pub discourse_marker_count: i64,
    pub discourse_marker_rate: f64,
    pub speaking_rate_host: f64,
    pub speaking_rate_guest: f64,
}

impl EpisodeMetricsRecord {
    pub fn from_frame(frame: &Frame, row: usize) -> Result<Self> {
        Ok(EpisodeMetricsRecord {
            episode_id: frame.str_value("episode_id", row)?,
            podcast_id: frame.str_value("podcast_id", row)?,
            total_word_count: frame.i64_value("total_word_count", row)?,
            total_turn_count: frame.i64_value("total_turn_count", row)?,
            unique_speaker_count: frame.i64_value("unique_speaker_count", row)?,
            avg_turn_duration: frame.f64_value("avg_turn_duration", row)?,
            median_turn_duration: frame.f64_value("median_turn_duration", row)?,
            avg_words_per_second: frame.f64_value("avg_words_per_second", row)?,
            host_word_count: frame.i64_value("host_word_count", row)?,
            guest_word_count: frame.i64_value("guest_word_count", row)?,
            host_turn_proportion: frame.f64_value("host_turn_proportion", row)?,
            host_word_proportion: frame.f64_value("host_word_proportion", row)?,
            avg_gap_duration: frame.f64_value("avg_gap_duration", row)?,
            total_overlap_duration: frame.f64_value("total_overlap_duration", row)?,
            discourse_marker_count: frame.i64_value("discourse_marker_count", row)?,
            discourse_marker_rate: frame.f64_value("discourse_marker_rate", row)?,
            speaking_rate_host: frame.f64_value("speaking_rate_host", row)?,
            speaking_rate_guest: frame.f64_value("speaking_rate_guest", row)?,
        })
    }
}

/// Corpus-wide statistics from the in-memory catalogs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetStatistics {
    pub total_podcasts: usize,
    pub total_episodes: usize,
    pub total_duration_hours: f64,
    pub avg_episode_duration_minutes: f64,
    pub category_distribution: std::collections::BTreeMap<String, u64>,
    pub language_distribution: std::collections::BTreeMap<String, u64>,
    pub speaker_distribution: std::collections::BTreeMap<i64, u64>,
}

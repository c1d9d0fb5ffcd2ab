//! Typed row structs and their columnar batch builders, one per table
//! in the on-disk layout. Schemas are inferred from the built arrays so
//! every writer produces byte-compatible files.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float64Builder, Int64Builder, ListBuilder, StringBuilder,
};
use arrow::record_batch::RecordBatch;

use crate::error::Result;

fn string_array(values: impl IntoIterator<Item = String>) -> ArrayRef {
    let mut b = StringBuilder::new();
    for v in values {
        b.append_value(v);
    }
    Arc::new(b.finish())
}

fn f64_array(values: impl IntoIterator<Item = f64>) -> ArrayRef {
    let mut b = Float64Builder::new();
    for v in values {
        b.append_value(v);
    }
    Arc::new(b.finish())
}

fn opt_f64_array(values: impl IntoIterator<Item = Option<f64>>) -> ArrayRef {
    let mut b = Float64Builder::new();
    for v in values {
        b.append_option(v);
    }
    Arc::new(b.finish())
}

fn i64_array(values: impl IntoIterator<Item = i64>) -> ArrayRef {
    let mut b = Int64Builder::new();
    for v in values {
        b.append_value(v);
    }
    Arc::new(b.finish())
}

fn string_list_array<'a>(values: impl IntoIterator<Item = &'a [String]>) -> ArrayRef {
    let mut b = ListBuilder::new(StringBuilder::new());
    for list in values {
        for item in list {
            b.values().append_value(item);
        }
        b.append(true);
    }
    Arc::new(b.finish())
}

// ---------------------------------------------------------------------------
// Episode catalog (metadata/episode_catalog.parquet) - no transcript
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EpisodeCatalogRow {
    pub episode_id: String,
    pub podcast_id: String,
    pub ep_title: String,
    pub mp3_url: String,
    pub duration_seconds: f64,
    pub categories: [String; 10],
    pub host_predicted_names: Vec<String>,
    pub guest_predicted_names: Vec<String>,
    pub num_main_speakers: i64,
    pub language: String,
    pub explicit: i64,
    pub episode_date: String,
    pub overlap_prop_duration: f64,
    pub avg_turn_duration: f64,
    pub total_sp_labels: i64,
}

pub fn episode_catalog_batch(rows: &[EpisodeCatalogRow]) -> Result<RecordBatch> {
    let mut columns: Vec<(&str, ArrayRef)> = vec![
        (
            "episode_id",
            string_array(rows.iter().map(|r| r.episode_id.clone())),
        ),
        (
            "podcast_id",
            string_array(rows.iter().map(|r| r.podcast_id.clone())),
        ),
        (
            "ep_title",
            string_array(rows.iter().map(|r| r.ep_title.clone())),
        ),
        (
            "mp3_url",
            string_array(rows.iter().map(|r| r.mp3_url.clone())),
        ),
        (
            "duration_seconds",
            f64_array(rows.iter().map(|r| r.duration_seconds)),
        ),
    ];
    let category_names = [
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
    for (i, name) in category_names.into_iter().enumerate() {
        columns.push((
            name,
            string_array(rows.iter().map(move |r| r.categories[i].clone())),
        ));
    }
    columns.extend([
        (
            "host_predicted_names",
            string_list_array(rows.iter().map(|r| r.host_predicted_names.as_slice())),
        ),
        (
            "guest_predicted_names",
            string_list_array(rows.iter().map(|r| r.guest_predicted_names.as_slice())),
        ),
        (
            "num_main_speakers",
            i64_array(rows.iter().map(|r| r.num_main_speakers)),
        ),
        (
            "language",
            string_array(rows.iter().map(|r| r.language.clone())),
        ),
        ("explicit", i64_array(rows.iter().map(|r| r.explicit))),
        (
            "episode_date",
            string_array(rows.iter().map(|r| r.episode_date.clone())),
        ),
        (
            "overlap_prop_duration",
            f64_array(rows.iter().map(|r| r.overlap_prop_duration)),
        ),
        (
            "avg_turn_duration",
            f64_array(rows.iter().map(|r| r.avg_turn_duration)),
        ),
        (
            "total_sp_labels",
            i64_array(rows.iter().map(|r| r.total_sp_labels)),
        ),
    ]);
    Ok(RecordBatch::try_from_iter(columns)?)
}

// ---------------------------------------------------------------------------
// Podcast catalog (metadata/podcast_catalog.parquet)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct PodcastCatalogRow {
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

pub fn podcast_catalog_batch(rows: &[PodcastCatalogRow]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_from_iter(vec![
        (
            "podcast_id",
            string_array(rows.iter().map(|r| r.podcast_id.clone())),
        ),
        (
            "rss_url",
            string_array(rows.iter().map(|r| r.rss_url.clone())),
        ),
        (
            "pod_title",
            string_array(rows.iter().map(|r| r.pod_title.clone())),
        ),
        (
            "pod_description",
            string_array(rows.iter().map(|r| r.pod_description.clone())),
        ),
        (
            "language",
            string_array(rows.iter().map(|r| r.language.clone())),
        ),
        ("explicit", i64_array(rows.iter().map(|r| r.explicit))),
        (
            "image_url",
            string_array(rows.iter().map(|r| r.image_url.clone())),
        ),
        (
            "itunes_author",
            string_array(rows.iter().map(|r| r.itunes_author.clone())),
        ),
        (
            "episode_count",
            i64_array(rows.iter().map(|r| r.episode_count)),
        ),
        (
            "total_duration_seconds",
            f64_array(rows.iter().map(|r| r.total_duration_seconds)),
        ),
        (
            "primary_category",
            string_array(rows.iter().map(|r| r.primary_category.clone())),
        ),
        (
            "all_categories",
            string_list_array(rows.iter().map(|r| r.all_categories.as_slice())),
        ),
        (
            "host_names",
            string_list_array(rows.iter().map(|r| r.host_names.as_slice())),
        ),
        (
            "earliest_date",
            string_array(rows.iter().map(|r| r.earliest_date.clone())),
        ),
        (
            "latest_date",
            string_array(rows.iter().map(|r| r.latest_date.clone())),
        ),
    ])?)
}

// ---------------------------------------------------------------------------
// Per-podcast episode partition (episodes/podcast_id=<id>/data.parquet)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EpisodePartitionRow {
    pub episode_id: String,
    pub podcast_id: String,
    pub ep_title: String,
    pub ep_description: String,
    pub mp3_url: String,
    pub duration_seconds: f64,
    pub transcript: String,
    pub rss_url: String,
    pub pod_title: String,
    pub pod_description: String,
    pub categories: [String; 10],
    pub host_predicted_names: Vec<String>,
    pub guest_predicted_names: Vec<String>,
    pub neither_predicted_names: Vec<String>,
    pub main_ep_speakers: Vec<String>,
    /// JSON-encoded speaker-label maps, decoded by the object builder.
    pub host_speaker_labels: String,
    pub guest_speaker_labels: String,
    pub num_main_speakers: i64,
    pub overlap_prop_duration: f64,
    pub overlap_prop_turn_count: f64,
    pub avg_turn_duration: f64,
    pub total_sp_labels: i64,
    pub language: String,
    pub explicit: i64,
    pub image_url: String,
    pub episode_date_localized: String,
    pub oldest_episode_date: String,
    pub last_update: String,
    pub created_on: String,
    pub itunes_author: String,
    pub itunes_owner_name: String,
    pub host: String,
}

pub fn episode_partition_batch(rows: &[EpisodePartitionRow]) -> Result<RecordBatch> {
    let mut columns: Vec<(&str, ArrayRef)> = vec![
        (
            "episode_id",
            string_array(rows.iter().map(|r| r.episode_id.clone())),
        ),
        (
            "podcast_id",
            string_array(rows.iter().map(|r| r.podcast_id.clone())),
        ),
        (
            "ep_title",
            string_array(rows.iter().map(|r| r.ep_title.clone())),
        ),
        (
            "ep_description",
            string_array(rows.iter().map(|r| r.ep_description.clone())),
        ),
        (
            "mp3_url",
            string_array(rows.iter().map(|r| r.mp3_url.clone())),
        ),
        (
            "duration_seconds",
            f64_array(rows.iter().map(|r| r.duration_seconds)),
        ),
        (
            "transcript",
            string_array(rows.iter().map(|r| r.transcript.clone())),
        ),
        (
            "rss_url",
            string_array(rows.iter().map(|r| r.rss_url.clone())),
        ),
        (
            "pod_title",
            string_array(rows.iter().map(|r| r.pod_title.clone())),
        ),
        (
            "pod_description",
            string_array(rows.iter().map(|r| r.pod_description.clone())),
        ),
    ];
    let category_names = [
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
    for (i, name) in category_names.into_iter().enumerate() {
        columns.push((
            name,
            string_array(rows.iter().map(move |r| r.categories[i].clone())),
        ));
    }
    columns.extend([
        (
            "host_predicted_names",
            string_list_array(rows.iter().map(|r| r.host_predicted_names.as_slice())),
        ),
        (
            "guest_predicted_names",
            string_list_array(rows.iter().map(|r| r.guest_predicted_names.as_slice())),
        ),
        (
            "neither_predicted_names",
            string_list_array(rows.iter().map(|r| r.neither_predicted_names.as_slice())),
        ),
        (
            "main_ep_speakers",
            string_list_array(rows.iter().map(|r| r.main_ep_speakers.as_slice())),
        ),
        (
            "host_speaker_labels",
            string_array(rows.iter().map(|r| r.host_speaker_labels.clone())),
        ),
        (
            "guest_speaker_labels",
            string_array(rows.iter().map(|r| r.guest_speaker_labels.clone())),
        ),
        (
            "num_main_speakers",
            i64_array(rows.iter().map(|r| r.num_main_speakers)),
        ),
        (
            "overlap_prop_duration",
            f64_array(rows.iter().map(|r| r.overlap_prop_duration)),
        ),
        (
            "overlap_prop_turn_count",
            f64_array(rows.iter().map(|r| r.overlap_prop_turn_count)),
        ),
        (
            "avg_turn_duration",
            f64_array(rows.iter().map(|r| r.avg_turn_duration)),
        ),
        (
            "total_sp_labels",
            i64_array(rows.iter().map(|r| r.total_sp_labels)),
        ),
        (
            "language",
            string_array(rows.iter().map(|r| r.language.clone())),
        ),
        ("explicit", i64_array(rows.iter().map(|r| r.explicit))),
        (
            "image_url",
            string_array(rows.iter().map(|r| r.image_url.clone())),
        ),
        (
            "episode_date_localized",
            string_array(rows.iter().map(|r| r.episode_date_localized.clone())),
        ),
        (
            "oldest_episode_date",
            string_array(rows.iter().map(|r| r.oldest_episode_date.clone())),
        ),
        (
            "last_update",
            string_array(rows.iter().map(|r| r.last_update.clone())),
        ),
        (
            "created_on",
            string_array(rows.iter().map(|r| r.created_on.clone())),
        ),
        (
            "itunes_author",
            string_array(rows.iter().map(|r| r.itunes_author.clone())),
        ),
        (
            "itunes_owner_name",
            string_array(rows.iter().map(|r| r.itunes_owner_name.clone())),
        ),
        ("host", string_array(rows.iter().map(|r| r.host.clone()))),
    ]);
    Ok(RecordBatch::try_from_iter(columns)?)
}

// ---------------------------------------------------------------------------
// Turn text partition (turns/podcast_id=<id>/text.parquet)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TurnTextRow {
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
}

pub fn turn_text_batch(rows: &[TurnTextRow]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_from_iter(vec![
        (
            "episode_id",
            string_array(rows.iter().map(|r| r.episode_id.clone())),
        ),
        (
            "podcast_id",
            string_array(rows.iter().map(|r| r.podcast_id.clone())),
        ),
        (
            "mp3_url",
            string_array(rows.iter().map(|r| r.mp3_url.clone())),
        ),
        (
            "speaker",
            string_list_array(rows.iter().map(|r| r.speaker.as_slice())),
        ),
        (
            "turn_text",
            string_array(rows.iter().map(|r| r.turn_text.clone())),
        ),
        ("start_time", f64_array(rows.iter().map(|r| r.start_time))),
        ("end_time", f64_array(rows.iter().map(|r| r.end_time))),
        ("duration", f64_array(rows.iter().map(|r| r.duration))),
        ("turn_count", i64_array(rows.iter().map(|r| r.turn_count))),
        (
            "inferred_speaker_role",
            string_array(rows.iter().map(|r| r.inferred_speaker_role.clone())),
        ),
        (
            "inferred_speaker_name",
            string_array(rows.iter().map(|r| r.inferred_speaker_name.clone())),
        ),
    ])?)
}

// ---------------------------------------------------------------------------
// Audio feature partition (turns/podcast_id=<id>/audio_features.parquet)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct AudioFeatureRow {
    pub episode_id: String,
    pub podcast_id: String,
    pub mp3_url: String,
    pub turn_count: i64,
    pub start_time: f64,
    pub mfcc1_sma3_mean: f64,
    pub mfcc2_sma3_mean: f64,
    pub mfcc3_sma3_mean: f64,
    pub mfcc4_sma3_mean: f64,
    pub f0_semitone_from_27_5hz_sma3nz_mean: f64,
    pub f1_frequency_sma3nz_mean: f64,
}

pub fn audio_feature_batch(rows: &[AudioFeatureRow]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_from_iter(vec![
        (
            "episode_id",
            string_array(rows.iter().map(|r| r.episode_id.clone())),
        ),
        (
            "podcast_id",
            string_array(rows.iter().map(|r| r.podcast_id.clone())),
        ),
        (
            "mp3_url",
            string_array(rows.iter().map(|r| r.mp3_url.clone())),
        ),
        ("turn_count", i64_array(rows.iter().map(|r| r.turn_count))),
        ("start_time", f64_array(rows.iter().map(|r| r.start_time))),
        (
            "mfcc1_sma3_mean",
            f64_array(rows.iter().map(|r| r.mfcc1_sma3_mean)),
        ),
        (
            "mfcc2_sma3_mean",
            f64_array(rows.iter().map(|r| r.mfcc2_sma3_mean)),
        ),
        (
            "mfcc3_sma3_mean",
            f64_array(rows.iter().map(|r| r.mfcc3_sma3_mean)),
        ),
        (
            "mfcc4_sma3_mean",
            f64_array(rows.iter().map(|r| r.mfcc4_sma3_mean)),
        ),
        (
            "f0_semitone_from_27_5hz_sma3nz_mean",
            f64_array(rows.iter().map(|r| r.f0_semitone_from_27_5hz_sma3nz_mean)),
        ),
        (
            "f1_frequency_sma3nz_mean",
            f64_array(rows.iter().map(|r| r.f1_frequency_sma3nz_mean)),
        ),
    ])?)
}

// ---------------------------------------------------------------------------
// Turn metrics partition (turns/podcast_id=<id>/metrics.parquet)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct TurnMetricsRow {
    pub episode_id: String,
    pub turn_count: i64,
    pub word_count: i64,
    pub words_per_second: f64,
    /// None for the first turn of an episode (no previous turn).
    pub gap_from_prev: Option<f64>,
    pub overlap_with_prev: Option<f64>,
    pub discourse_marker_count: i64,
    pub char_count: i64,
}

pub fn turn_metrics_batch(rows: &[TurnMetricsRow]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_from_iter(vec![
        (
            "episode_id",
            string_array(rows.iter().map(|r| r.episode_id.clone())),
        ),
        ("turn_count", i64_array(rows.iter().map(|r| r.turn_count))),
        ("word_count", i64_array(rows.iter().map(|r| r.word_count))),
        (
            "words_per_second",
            f64_array(rows.iter().map(|r| r.words_per_second)),
        ),
        (
            "gap_from_prev",
            opt_f64_array(rows.iter().map(|r| r.gap_from_prev)),
        ),
        (
            "overlap_with_prev",
            opt_f64_array(rows.iter().map(|r| r.overlap_with_prev)),
        ),
        (
            "discourse_marker_count",
            i64_array(rows.iter().map(|r| r.discourse_marker_count)),
        ),
        ("char_count", i64_array(rows.iter().map(|r| r.char_count))),
    ])?)
}

// ---------------------------------------------------------------------------
// Episode metrics (metadata/episode_metrics.parquet)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EpisodeMetricsRow {
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

pub fn episode_metrics_batch(rows: &[EpisodeMetricsRow]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_from_iter(vec![
        (
            "episode_id",
            string_array(rows.iter().map(|r| r.episode_id.clone())),
        ),
        (
            "podcast_id",
            string_array(rows.iter().map(|r| r.podcast_id.clone())),
        ),
        (
            "total_word_count",
            i64_array(rows.iter().map(|r| r.total_word_count)),
        ),
        (
            "total_turn_count",
            i64_array(rows.iter().map(|r| r.total_turn_count)),
        ),
        (
            "unique_speaker_count",
            i64_array(rows.iter().map(|r| r.unique_speaker_count)),
        ),
        (
            "avg_turn_duration",
            f64_array(rows.iter().map(|r| r.avg_turn_duration)),
        ),
        (
            "median_turn_duration",
            f64_array(rows.iter().map(|r| r.median_turn_duration)),
        ),
        (
            "avg_words_per_second",
            f64_array(rows.iter().map(|r| r.avg_words_per_second)),
        ),
        (
            "host_word_count",
            i64_array(rows.iter().map(|r| r.host_word_count)),
        ),
        (
            "guest_word_count",
            i64_array(rows.iter().map(|r| r.guest_word_count)),
        ),
        (
            "host_turn_proportion",
            f64_array(rows.iter().map(|r| r.host_turn_proportion)),
        ),
        (
            "host_word_proportion",
            f64_array(rows.iter().map(|r| r.host_word_proportion)),
        ),
        (
            "avg_gap_duration",
            f64_array(rows.iter().map(|r| r.avg_gap_duration)),
        ),
        (
            "total_overlap_duration",
            f64_array(rows.iter().map(|r| r.total_overlap_duration)),
        ),
        (
            "discourse_marker_count",
            i64_array(rows.iter().map(|r| r.discourse_marker_count)),
        ),
        (
            "discourse_marker_rate",
            f64_array(rows.iter().map(|r| r.discourse_marker_rate)),
        ),
        (
            "speaking_rate_host",
            f64_array(rows.iter().map(|r| r.speaking_rate_host)),
        ),
        (
            "speaking_rate_guest",
            f64_array(rows.iter().map(|r| r.speaking_rate_guest)),
        ),
    ])?)
}

// ---------------------------------------------------------------------------
// Speaker name index (metadata/speaker_name_index.parquet)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SpeakerNameRow {
    pub name_normalized: String,
    pub name_original: String,
    pub role: String,
    pub episode_id: String,
    pub podcast_id: String,
}

pub fn speaker_name_batch(rows: &[SpeakerNameRow]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_from_iter(vec![
        (
            "name_normalized",
            string_array(rows.iter().map(|r| r.name_normalized.clone())),
        ),
        (
            "name_original",
            string_array(rows.iter().map(|r| r.name_original.clone())),
        ),
        ("role", string_array(rows.iter().map(|r| r.role.clone()))),
        (
            "episode_id",
            string_array(rows.iter().map(|r| r.episode_id.clone())),
        ),
        (
            "podcast_id",
            string_array(rows.iter().map(|r| r.podcast_id.clone())),
        ),
    ])?)
}

// ---------------------------------------------------------------------------
// Category / hostname indexes
// ---------------------------------------------------------------------------

pub fn category_index_batch(rows: &[(String, String)]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_from_iter(vec![
        (
            "category",
            string_array(rows.iter().map(|(c, _)| c.clone())),
        ),
        (
            "podcast_id",
            string_array(rows.iter().map(|(_, p)| p.clone())),
        ),
    ])?)
}

pub fn hostname_index_batch(rows: &[(String, String)]) -> Result<RecordBatch> {
    Ok(RecordBatch::try_from_iter(vec![
        (
            "hostname",
            string_array(rows.iter().map(|(h, _)| h.clone())),
        ),
        (
            "podcast_id",
            string_array(rows.iter().map(|(_, p)| p.clone())),
        ),
    ])?)
}

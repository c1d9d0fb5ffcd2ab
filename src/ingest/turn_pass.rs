//! Pass 2: stream the speaker-turn file, join records to podcasts via
//! the pass-1 mp3 URL map, and write per-podcast turn partitions.

use std::collections::HashMap;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::coerce::{coerce_float, coerce_int, coerce_list, coerce_string};
use crate::error::Result;
use crate::ids::episode_id_from_mp3;
use crate::ingest::jsonl::JsonlGzReader;
use crate::store::{
    self, audio_feature_batch, turn_text_batch, AudioFeatureRow, Codec, TurnTextRow,
};

/// Rows buffered per podcast before a partition flush.
pub const TURN_FLUSH_THRESHOLD: usize = 50_000;

#[derive(Debug, Default)]
struct TurnBuffer {
    text: Vec<TurnTextRow>,
    audio: Vec<AudioFeatureRow>,
}

#[derive(Debug, Default)]
pub struct TurnPassReport {
    pub record_count: u64,
    pub matched_count: u64,
    pub unmatched_count: u64,
    pub podcast_count: u64,
}

fn flush(output_dir: &Path, podcast_id: &str, buf: &mut TurnBuffer) -> Result<()> {
    if !buf.text.is_empty() {
        let batch = turn_text_batch(&buf.text)?;
        store::append_parquet(&store::turn_text_path(output_dir, podcast_id), &batch, Codec::Zstd)?;
    }
    if !buf.audio.is_empty() {
        let batch = audio_feature_batch(&buf.audio)?;
        store::append_parquet(
            &store::audio_features_path(output_dir, podcast_id),
            &batch,
            Codec::Zstd,
        )?;
    }
    buf.text.clear();
    buf.audio.clear();
    Ok(())
}

pub fn run(
    turn_file: &Path,
    output_dir: &Path,
    mp3url_to_pid: &HashMap<String, String>,
) -> Result<TurnPassReport> {
    info!("pass 2: turn pass over {}", turn_file.display());

    let mut report = TurnPassReport::default();
    let mut buffers: HashMap<String, TurnBuffer> = HashMap::new();
    let mut flushed: std::collections::HashSet<String> = std::collections::HashSet::new();

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} pass 2 turns  {human_pos} records  ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    for record in JsonlGzReader::open(turn_file)? {
        let rec = record?;
        report.record_count += 1;
        pb.inc(1);

        let mp3_url = coerce_string(rec.get("mp3url"), "");
        if mp3_url.is_empty() {
            continue;
        }
        let Some(pid) = mp3url_to_pid.get(&mp3_url) else {
            // Orphan turn record: no episode with this mp3 URL in pass 1.
            report.unmatched_count += 1;
            continue;
        };
        report.matched_count += 1;

        let eid = episode_id_from_mp3(&mp3_url);
        let turn_count = coerce_int(rec.get("turnCount"), 0);
        let start_time = coerce_float(rec.get("startTime"), 0.0);

        let buf = buffers.entry(pid.clone()).or_default();
        buf.text.push(TurnTextRow {
            episode_id: eid.clone(),
            podcast_id: pid.clone(),
            mp3_url: mp3_url.clone(),
            speaker: coerce_list(rec.get("speaker")),
            turn_text: coerce_string(rec.get("turnText"), ""),
            start_time,
            end_time: coerce_float(rec.get("endTime"), 0.0),
            duration: coerce_float(rec.get("duration"), 0.0),
            turn_count,
            inferred_speaker_role: coerce_string(rec.get("inferredSpeakerRole"), ""),
            inferred_speaker_name: coerce_string(rec.get("inferredSpeakerName"), ""),
        });
        buf.audio.push(AudioFeatureRow {
            episode_id: eid,
            podcast_id: pid.clone(),
            mp3_url,
            turn_count,
            start_time,
            mfcc1_sma3_mean: coerce_float(rec.get("mfcc1_sma3Mean"), 0.0),
            mfcc2_sma3_mean: coerce_float(rec.get("mfcc2_sma3Mean"), 0.0),
            mfcc3_sma3_mean: coerce_float(rec.get("mfcc3_sma3Mean"), 0.0),
            mfcc4_sma3_mean: coerce_float(rec.get("mfcc4_sma3Mean"), 0.0),
            f0_semitone_from_27_5hz_sma3nz_mean: coerce_float(
                rec.get("F0semitoneFrom27.5Hz_sma3nzMean"),
                0.0,
            ),
            f1_frequency_sma3nz_mean: coerce_float(rec.get("F1frequency_sma3nzMean"), 0.0),
        });

        if buf.text.len() >= TURN_FLUSH_THRESHOLD {
            flush(output_dir, pid, buf)?;
            flushed.insert(pid.clone());
        }
    }
    pb.finish_and_clear();

    info!("pass 2: flushing {} remaining podcast buffers", buffers.len());
    let mut remaining: Vec<(String, TurnBuffer)> = buffers.into_iter().collect();
    remaining.sort_by(|a, b| a.0.cmp(&b.0));
    for (pid, mut buf) in remaining {
        if !buf.text.is_empty() || !buf.audio.is_empty() {
            flush(output_dir, &pid, &mut buf)?;
            flushed.insert(pid);
        }
    }

    report.podcast_count = flushed.len() as u64;
    info!(
        "pass 2: {} records, {} matched, {} unmatched, {} podcasts",
        report.record_count, report.matched_count, report.unmatched_count, report.podcast_count
    );
    Ok(report)
}

//! Object builders: stitch partition rows back into typed domain
//! objects, installing deferred turn loaders unless the caller asks for
//! eager loading.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::backend::CorpusBackend;
use crate::error::{CorpusError, Result};
use crate::model::{Episode, Podcast, Turn, TurnLoader};
use crate::store::{self, Frame, TurnRow};

fn labels_from_json(raw: &str) -> BTreeMap<String, String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Turn-row validation used at load time: a turn needs a speaker, text,
/// and a positive time span. Anything else is skipped, not fatal.
fn turn_from_row(row: &TurnRow) -> Option<Turn> {
    if row.speaker.is_empty() {
        return None;
    }
    let text = row.turn_text.trim();
    if text.is_empty() {
        return None;
    }
    if row.end_time <= row.start_time {
        return None;
    }
    Some(Turn {
        speaker: row.speaker.clone(),
        text: text.to_string(),
        start_time: row.start_time,
        end_time: row.end_time,
        duration: row.duration,
        turn_count: row.turn_count,
        inferred_speaker_role: non_empty(row.inferred_speaker_role.clone()),
        inferred_speaker_name: non_empty(row.inferred_speaker_name.clone()),
        mp3_url: non_empty(row.mp3_url.clone()),
        mfcc1_sma3_mean: row.mfcc1_sma3_mean,
        mfcc2_sma3_mean: row.mfcc2_sma3_mean,
        mfcc3_sma3_mean: row.mfcc3_sma3_mean,
        mfcc4_sma3_mean: row.mfcc4_sma3_mean,
        f0_semitone_from_27_5hz_sma3nz_mean: row.f0_semitone_from_27_5hz_sma3nz_mean,
        f1_frequency_sma3nz_mean: row.f1_frequency_sma3nz_mean,
    })
}

/// Read, validate, and sort the turns of one episode, with audio
/// features joined on.
fn load_turns(data_dir: &std::path::Path, podcast_id: &str, episode_id: &str) -> Result<Vec<Turn>> {
    let rows = store::read_episode_turns(data_dir, podcast_id, episode_id, true)?;
    let mut turns: Vec<Turn> = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in &rows {
        match turn_from_row(row) {
            Some(turn) => turns.push(turn),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("skipped {skipped} invalid turns for episode {episode_id}");
    }
    turns.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    Ok(turns)
}

fn episode_from_partition_row(
    frame: &Frame,
    row: usize,
    podcast_title: &str,
    podcast_description: &str,
    rss_url: &str,
) -> Result<Episode> {
    let mut title = frame.str_value("ep_title", row)?;
    if title.is_empty() {
        // Source data occasionally ships untitled episodes.
        title = format!("Untitled Episode ({})", frame.str_value("mp3_url", row)?);
    }
    let mut categories = Vec::new();
    for slot in 1..=10u8 {
        let value = frame.str_value(&format!("category{slot}"), row)?;
        if !value.is_empty() {
            categories.push(value);
        }
    }
    Ok(Episode {
        episode_id: frame.str_value("episode_id", row)?,
        podcast_id: frame.str_value("podcast_id", row)?,
        title,
        description: frame.str_value("ep_description", row)?,
        mp3_url: frame.str_value("mp3_url", row)?,
        duration_seconds: frame.f64_value("duration_seconds", row)?,
        transcript: frame.str_value("transcript", row)?,
        podcast_title: podcast_title.to_string(),
        podcast_description: podcast_description.to_string(),
        rss_url: rss_url.to_string(),
        categories,
        host_predicted_names: frame.list_value("host_predicted_names", row)?,
        guest_predicted_names: frame.list_value("guest_predicted_names", row)?,
        neither_predicted_names: frame.list_value("neither_predicted_names", row)?,
        main_ep_speakers: frame.list_value("main_ep_speakers", row)?,
        host_speaker_labels: labels_from_json(&frame.str_value("host_speaker_labels", row)?),
        guest_speaker_labels: labels_from_json(&frame.str_value("guest_speaker_labels", row)?),
        overlap_prop_duration: frame.f64_value("overlap_prop_duration", row)?,
        overlap_prop_turn_count: frame.f64_value("overlap_prop_turn_count", row)?,
        avg_turn_duration: frame.f64_value("avg_turn_duration", row)?,
        total_speaker_labels: frame.i64_value("total_sp_labels", row)?,
        language: frame.str_value("language", row)?,
        explicit: frame.i64_value("explicit", row)? != 0,
        image_url: frame.opt_str_value("image_url", row)?,
        episode_date_localized: frame.opt_str_value("episode_date_localized", row)?,
        oldest_episode_date: frame.opt_str_value("oldest_episode_date", row)?,
        last_update: frame.opt_str_value("last_update", row)?,
        created_on: frame.opt_str_value("created_on", row)?,
        ..Episode::default()
    })
}

impl CorpusBackend {
    /// A deferred loader capturing only the partition coordinates; the
    /// first `episode.turns()` access reads the partition files.
    fn make_turn_loader(&self, podcast_id: String, episode_id: String) -> TurnLoader {
        let data_dir = self.data_dir().to_path_buf();
        Arc::new(move || load_turns(&data_dir, &podcast_id, &episode_id))
    }

    /// Construct a full `Podcast` with `Episode` children from the
    /// per-podcast partition file. With `include_turns`, turns are read
    /// eagerly; otherwise each episode gets a deferred loader.
    pub fn build_podcast(&self, podcast_id: &str, include_turns: bool) -> Result<Podcast> {
        let info = self.get_podcast_by_id(podcast_id)?;
        let mut podcast = Podcast {
            podcast_id: podcast_id.to_string(),
            title: info.pod_title.clone(),
            description: info.pod_description.clone(),
            rss_url: info.rss_url.clone(),
            language: info.language.clone(),
            explicit: info.explicit != 0,
            image_url: non_empty(info.image_url.clone()),
            itunes_author: non_empty(info.itunes_author.clone()),
            episodes: Vec::new(),
        };

        let Some(frame) = store::read_episode_partition(&self.data_dir, podcast_id)? else {
            return Ok(podcast);
        };
        for row in 0..frame.num_rows() {
            let mut episode = episode_from_partition_row(
                &frame,
                row,
                &info.pod_title,
                &info.pod_description,
                &info.rss_url,
            )?;
            if include_turns {
                episode.set_turns(load_turns(
                    &self.data_dir,
                    podcast_id,
                    &episode.episode_id,
                )?);
            } else {
                let loader =
                    self.make_turn_loader(podcast_id.to_string(), episode.episode_id.clone());
                episode.set_turn_loader(loader);
            }
            podcast.episodes.push(episode);
        }
        Ok(podcast)
    }

    /// Construct a single `Episode` from its podcast's partition file.
    pub fn build_episode(
        &self,
        podcast_id: &str,
        episode_id: &str,
        include_turns: bool,
    ) -> Result<Episode> {
        let Some(frame) = store::read_episode_partition(&self.data_dir, podcast_id)? else {
            return Err(CorpusError::NotFound(format!(
                "episode '{episode_id}' not found in podcast '{podcast_id}'"
            )));
        };
        let info = self.get_podcast_by_id(podcast_id)?;
        for row in 0..frame.num_rows() {
            if frame.str_value("episode_id", row)? != episode_id {
                continue;
            }
            let mut episode = episode_from_partition_row(
                &frame,
                row,
                &info.pod_title,
                &info.pod_description,
                &info.rss_url,
            )?;
            if include_turns {
                episode.set_turns(load_turns(&self.data_dir, podcast_id, episode_id)?);
            } else {
                let loader =
                    self.make_turn_loader(podcast_id.to_string(), episode_id.to_string());
                episode.set_turn_loader(loader);
            }
            return Ok(episode);
        }
        Err(CorpusError::NotFound(format!(
            "episode '{episode_id}' not found in podcast '{podcast_id}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_turn_rows_are_skipped() {
        let valid = TurnRow {
            speaker: vec!["SPEAKER_00".into()],
            turn_text: "hello".into(),
            start_time: 0.0,
            end_time: 1.0,
            duration: 1.0,
            ..TurnRow::default()
        };
        assert!(turn_from_row(&valid).is_some());

        let no_speaker = TurnRow {
            speaker: vec![],
            ..valid.clone()
        };
        assert!(turn_from_row(&no_speaker).is_none());

        let empty_text = TurnRow {
            turn_text: "   ".into(),
            ..valid.clone()
        };
        assert!(turn_from_row(&empty_text).is_none());

        let inverted_times = TurnRow {
            start_time: 2.0,
            end_time: 1.0,
            ..valid.clone()
        };
        assert!(turn_from_row(&inverted_times).is_none());
    }

    #[test]
    fn labels_decode_or_default() {
        let m = labels_from_json("{\"SPEAKER_00\": \"Jane\"}");
        assert_eq!(m.get("SPEAKER_00").map(String::as_str), Some("Jane"));
        assert!(labels_from_json("not json").is_empty());
        assert!(labels_from_json("").is_empty());
    }
}

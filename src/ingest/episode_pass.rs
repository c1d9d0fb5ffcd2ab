//! Pass 1: stream the episode-level file once, producing the podcast
//! and episode catalogs plus one episode partition per podcast.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::info;

use crate::coerce::{coerce_dict, coerce_float, coerce_int, coerce_list, coerce_string};
use crate::error::Result;
use crate::ids::{episode_id_from_mp3, podcast_id_from_rss};
use crate::ingest::jsonl::JsonlGzReader;
use crate::store::{
    self, episode_catalog_batch, episode_partition_batch, podcast_catalog_batch, Codec,
    EpisodeCatalogRow, EpisodePartitionRow, PodcastCatalogRow,
};

/// Per-podcast running aggregate, folded over episode records.
#[derive(Debug, Clone, Default)]
pub struct PodcastAgg {
    pub rss_url: String,
    pub pod_title: String,
    pub pod_description: String,
    pub language: String,
    pub explicit: i64,
    pub image_url: String,
    pub itunes_author: String,
    pub episode_count: i64,
    pub total_duration_seconds: f64,
    pub all_categories: BTreeSet<String>,
    pub host_names: BTreeSet<String>,
    pub earliest_date: Option<String>,
    pub latest_date: Option<String>,
}

#[derive(Debug, Default)]
pub struct EpisodePassOutput {
    /// mp3 URL -> podcast id, consumed by the turn pass.
    pub mp3url_to_pid: HashMap<String, String>,
    /// Ordered for deterministic catalog and index output.
    pub podcast_agg: BTreeMap<String, PodcastAgg>,
    pub record_count: u64,
    pub episode_count: u64,
}

/// Millisecond-epoch value (number or numeric string) to an ISO-8601
/// UTC string, used only for the podcast date-range aggregate.
fn episode_date_iso(value: Option<&Value>) -> Option<String> {
    let raw = value?;
    let ms = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    let dt = chrono::DateTime::from_timestamp_millis(ms as i64)?;
    Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn pass1_progress() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} pass 1 episodes  {human_pos} records  ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb
}

pub fn run(episode_file: &Path, output_dir: &Path) -> Result<EpisodePassOutput> {
    info!("pass 1: episode pass over {}", episode_file.display());

    let mut out = EpisodePassOutput::default();
    let mut seen_mp3: HashSet<String> = HashSet::new();
    let mut episode_catalog: Vec<EpisodeCatalogRow> = Vec::new();
    let mut partition_buf: BTreeMap<String, Vec<EpisodePartitionRow>> = BTreeMap::new();

    let pb = pass1_progress();
    for record in JsonlGzReader::open(episode_file)? {
        let rec = record?;
        out.record_count += 1;
        pb.inc(1);

        let mp3_url = coerce_string(rec.get("mp3url"), "");
        let rss_url = coerce_string(rec.get("rssUrl"), "");
        if mp3_url.is_empty() || rss_url.is_empty() {
            continue;
        }
        // First occurrence of an mp3 URL wins.
        if !seen_mp3.insert(mp3_url.clone()) {
            continue;
        }

        let pid = podcast_id_from_rss(&rss_url);
        let eid = episode_id_from_mp3(&mp3_url);
        out.mp3url_to_pid.insert(mp3_url.clone(), pid.clone());

        let mut categories: [String; 10] = Default::default();
        for (i, slot) in categories.iter_mut().enumerate() {
            *slot = coerce_string(rec.get(format!("category{}", i + 1).as_str()), "");
        }
        let non_empty_categories: Vec<String> =
            categories.iter().filter(|c| !c.is_empty()).cloned().collect();

        let host_names = coerce_list(rec.get("hostPredictedNames"));
        let guest_names = coerce_list(rec.get("guestPredictedNames"));
        let duration = coerce_float(rec.get("durationSeconds"), 0.0);

        let agg = out.podcast_agg.entry(pid.clone()).or_insert_with(|| PodcastAgg {
            rss_url: rss_url.clone(),
            pod_title: coerce_string(rec.get("podTitle"), ""),
            pod_description: coerce_string(rec.get("podDescription"), ""),
            language: coerce_string(rec.get("language"), "en"),
            explicit: coerce_int(rec.get("explicit"), 0),
            image_url: coerce_string(rec.get("imageUrl"), ""),
            itunes_author: coerce_string(rec.get("itunesAuthor"), ""),
            ..PodcastAgg::default()
        });
        agg.episode_count += 1;
        agg.total_duration_seconds += duration;
        agg.all_categories.extend(non_empty_categories.iter().cloned());
        agg.host_names.extend(host_names.iter().cloned());
        if let Some(date) = episode_date_iso(rec.get("episodeDateLocalized")) {
            if agg.earliest_date.as_deref().map_or(true, |d| date.as_str() < d) {
                agg.earliest_date = Some(date.clone());
            }
            if agg.latest_date.as_deref().map_or(true, |d| date.as_str() > d) {
                agg.latest_date = Some(date);
            }
        }

        episode_catalog.push(EpisodeCatalogRow {
            episode_id: eid.clone(),
            podcast_id: pid.clone(),
            ep_title: coerce_string(rec.get("epTitle"), ""),
            mp3_url: mp3_url.clone(),
            duration_seconds: duration,
            categories: categories.clone(),
            host_predicted_names: host_names.clone(),
            guest_predicted_names: guest_names.clone(),
            num_main_speakers: coerce_int(rec.get("numMainSpeakers"), 0),
            language: coerce_string(rec.get("language"), "en"),
            explicit: coerce_int(rec.get("explicit"), 0),
            episode_date: coerce_string(rec.get("episodeDateLocalized"), ""),
            overlap_prop_duration: coerce_float(rec.get("overlapPropDuration"), 0.0),
            avg_turn_duration: coerce_float(rec.get("avgTurnDuration"), 0.0),
            total_sp_labels: coerce_int(rec.get("totalSpLabels"), 0),
        });

        let host_labels = serde_json::to_string(&coerce_dict(rec.get("hostSpeakerLabels")))?;
        let guest_labels = serde_json::to_string(&coerce_dict(rec.get("guestSpeakerLabels")))?;
        partition_buf.entry(pid.clone()).or_default().push(EpisodePartitionRow {
            episode_id: eid,
            podcast_id: pid,
            ep_title: coerce_string(rec.get("epTitle"), ""),
            ep_description: coerce_string(rec.get("epDescription"), ""),
            mp3_url,
            duration_seconds: duration,
            transcript: coerce_string(rec.get("transcript"), ""),
            rss_url,
            pod_title: coerce_string(rec.get("podTitle"), ""),
            pod_description: coerce_string(rec.get("podDescription"), ""),
            categories,
            host_predicted_names: host_names,
            guest_predicted_names: guest_names,
            neither_predicted_names: coerce_list(rec.get("neitherPredictedNames")),
            main_ep_speakers: coerce_list(rec.get("mainEpSpeakers")),
            host_speaker_labels: host_labels,
            guest_speaker_labels: guest_labels,
            num_main_speakers: coerce_int(rec.get("numMainSpeakers"), 0),
            overlap_prop_duration: coerce_float(rec.get("overlapPropDuration"), 0.0),
            overlap_prop_turn_count: coerce_float(rec.get("overlapPropTurnCount"), 0.0),
            avg_turn_duration: coerce_float(rec.get("avgTurnDuration"), 0.0),
            total_sp_labels: coerce_int(rec.get("totalSpLabels"), 0),
            language: coerce_string(rec.get("language"), "en"),
            explicit: coerce_int(rec.get("explicit"), 0),
            image_url: coerce_string(rec.get("imageUrl"), ""),
            episode_date_localized: coerce_string(rec.get("episodeDateLocalized"), ""),
            oldest_episode_date: coerce_string(rec.get("oldestEpisodeDate"), ""),
            last_update: coerce_string(rec.get("lastUpdate"), ""),
            created_on: coerce_string(rec.get("createdOn"), ""),
            itunes_author: coerce_string(rec.get("itunesAuthor"), ""),
            itunes_owner_name: coerce_string(rec.get("itunesOwnerName"), ""),
            host: coerce_string(rec.get("host"), ""),
        });
    }
    pb.finish_and_clear();
    out.episode_count = seen_mp3.len() as u64;
    info!(
        "pass 1: read {} records, {} unique episodes, {} podcasts",
        out.record_count,
        out.episode_count,
        out.podcast_agg.len()
    );

    // Per-podcast episode partitions (with transcripts).
    let write_pb = ProgressBar::new(partition_buf.len() as u64);
    write_pb.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} episode partitions")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    for (pid, rows) in &partition_buf {
        let batch = episode_partition_batch(rows)?;
        store::write_parquet(&store::episode_partition_path(output_dir, pid), &batch, Codec::Zstd)?;
        write_pb.inc(1);
    }
    write_pb.finish_and_clear();
    info!("pass 1: wrote {} episode partitions", partition_buf.len());
    drop(partition_buf);

    // Podcast catalog from the aggregation map.
    let podcast_rows: Vec<PodcastCatalogRow> = out
        .podcast_agg
        .iter()
        .map(|(pid, agg)| {
            let cats: Vec<String> = agg.all_categories.iter().cloned().collect();
            PodcastCatalogRow {
                podcast_id: pid.clone(),
                rss_url: agg.rss_url.clone(),
                pod_title: agg.pod_title.clone(),
                pod_description: agg.pod_description.clone(),
                language: agg.language.clone(),
                explicit: agg.explicit,
                image_url: agg.image_url.clone(),
                itunes_author: agg.itunes_author.clone(),
                episode_count: agg.episode_count,
                total_duration_seconds: agg.total_duration_seconds,
                primary_category: cats.first().cloned().unwrap_or_default(),
                all_categories: cats,
                host_names: agg.host_names.iter().cloned().collect(),
                earliest_date: agg.earliest_date.clone().unwrap_or_default(),
                latest_date: agg.latest_date.clone().unwrap_or_default(),
            }
        })
        .collect();
    store::write_parquet(
        &store::podcast_catalog_path(output_dir),
        &podcast_catalog_batch(&podcast_rows)?,
        Codec::Zstd,
    )?;
    info!("pass 1: podcast catalog {} rows", podcast_rows.len());

    store::write_parquet(
        &store::episode_catalog_path(output_dir),
        &episode_catalog_batch(&episode_catalog)?,
        Codec::Zstd,
    )?;
    info!("pass 1: episode catalog {} rows", episode_catalog.len());

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn episode_date_iso_accepts_number_and_string() {
        // 2020-01-01T00:00:00Z in milliseconds.
        let v = json!(1577836800000_i64);
        assert_eq!(
            episode_date_iso(Some(&v)).as_deref(),
            Some("2020-01-01T00:00:00")
        );
        let s = json!("1577836800000");
        assert_eq!(
            episode_date_iso(Some(&s)).as_deref(),
            Some("2020-01-01T00:00:00")
        );
        assert_eq!(episode_date_iso(Some(&json!("soon"))), None);
        assert_eq!(episode_date_iso(None), None);
    }
}

//! Pass 3: category and hostname indexes plus the manifest.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::ids::hostname_from_rss;
use crate::ingest::episode_pass::PodcastAgg;
use crate::manifest::{Manifest, RecordCounts, SCHEMA_VERSION};
use crate::store::{self, category_index_batch, hostname_index_batch, Codec};

pub fn run(
    output_dir: &Path,
    podcast_agg: &BTreeMap<String, PodcastAgg>,
    episode_count: u64,
    source: &str,
) -> Result<()> {
    info!("pass 3: building category and hostname indexes");

    let mut cat_rows: Vec<(String, String)> = Vec::new();
    for (pid, agg) in podcast_agg {
        for cat in &agg.all_categories {
            cat_rows.push((cat.clone(), pid.clone()));
        }
    }
    store::write_parquet(
        &store::category_index_path(output_dir),
        &category_index_batch(&cat_rows)?,
        Codec::Zstd,
    )?;
    info!("pass 3: category index {} rows", cat_rows.len());

    let mut host_rows: Vec<(String, String)> = Vec::new();
    for (pid, agg) in podcast_agg {
        let hostname = hostname_from_rss(&agg.rss_url);
        if !hostname.is_empty() {
            host_rows.push((hostname, pid.clone()));
        }
    }
    store::write_parquet(
        &store::hostname_index_path(output_dir),
        &hostname_index_batch(&host_rows)?,
        Codec::Zstd,
    )?;
    info!("pass 3: hostname index {} rows", host_rows.len());

    let mut layout = BTreeMap::new();
    layout.insert(
        "metadata/podcast_catalog.parquet".to_string(),
        "one row per podcast, aggregated stats".to_string(),
    );
    layout.insert(
        "metadata/episode_catalog.parquet".to_string(),
        "one row per episode, key metadata only (no transcripts)".to_string(),
    );
    layout.insert(
        "metadata/category_index.parquet".to_string(),
        "category -> podcast_id mapping".to_string(),
    );
    layout.insert(
        "metadata/hostname_index.parquet".to_string(),
        "hostname -> podcast_id mapping".to_string(),
    );
    layout.insert(
        "episodes/podcast_id=<id>/data.parquet".to_string(),
        "full episode data including transcript".to_string(),
    );
    layout.insert(
        "turns/podcast_id=<id>/text.parquet".to_string(),
        "turn text, timing, speaker info".to_string(),
    );
    layout.insert(
        "turns/podcast_id=<id>/audio_features.parquet".to_string(),
        "MFCCs, F0, formants".to_string(),
    );

    let mut id_scheme = BTreeMap::new();
    id_scheme.insert("podcast_id".to_string(), "md5(rss_url)[:12]".to_string());
    id_scheme.insert("episode_id".to_string(), "md5(mp3_url)[:16]".to_string());

    let manifest = Manifest {
        version: "1.0".to_string(),
        schema_version: SCHEMA_VERSION,
        creation_date: chrono::Utc::now().to_rfc3339(),
        source: source.to_string(),
        record_counts: RecordCounts {
            podcasts: podcast_agg.len() as u64,
            episodes: episode_count,
            category_index_rows: cat_rows.len() as u64,
            hostname_index_rows: host_rows.len() as u64,
        },
        compression: Codec::Zstd.as_str().to_string(),
        layout,
        id_scheme,
    };
    manifest.save(&store::manifest_path(output_dir))?;
    info!("pass 3: wrote manifest");
    Ok(())
}

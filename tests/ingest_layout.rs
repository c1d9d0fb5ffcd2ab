//! End-to-end checks on the conversion output: layout, ids, manifest,
//! dedup, aggregation invariants, and atomic replacement.

mod common;

use podcorpus::ids::{episode_id_from_mp3, podcast_id_from_rss};
use podcorpus::ingest::{run_convert, ConvertOptions};
use podcorpus::manifest::Manifest;
use podcorpus::store;

#[test]
fn layout_and_manifest() {
    let fixture = common::converted_corpus();
    let root = &fixture.data_dir;

    assert!(store::podcast_catalog_path(root).exists());
    assert!(store::episode_catalog_path(root).exists());
    assert!(store::category_index_path(root).exists());
    assert!(store::hostname_index_path(root).exists());

    let pid_a = podcast_id_from_rss(common::RSS_A);
    let pid_b = podcast_id_from_rss(common::RSS_B);
    assert!(store::episode_partition_path(root, &pid_a).exists());
    assert!(store::episode_partition_path(root, &pid_b).exists());
    assert!(store::turn_text_path(root, &pid_a).exists());
    assert!(store::audio_features_path(root, &pid_a).exists());

    let manifest = Manifest::load(&store::manifest_path(root)).unwrap();
    assert_eq!(manifest.schema_version, 1);
    assert_eq!(manifest.record_counts.podcasts, 2);
    // Five unique mp3 URLs with an rssUrl; the duplicate and the
    // feed-less record are dropped.
    assert_eq!(manifest.record_counts.episodes, 4);
    assert_eq!(manifest.compression, "zstd");
    assert_eq!(
        manifest.id_scheme.get("podcast_id").map(String::as_str),
        Some("md5(rss_url)[:12]")
    );
}

#[test]
fn ids_are_md5_prefixes() {
    let fixture = common::converted_corpus();
    let catalog = store::read_parquet(&store::episode_catalog_path(&fixture.data_dir)).unwrap();

    let pid_a = podcast_id_from_rss(common::RSS_A);
    assert_eq!(pid_a.len(), 12);
    let eid_1 = episode_id_from_mp3(common::MP3_E1);
    assert_eq!(eid_1.len(), 16);

    let mut found = false;
    for i in 0..catalog.num_rows() {
        if catalog.str_value("mp3_url", i).unwrap() == common::MP3_E1 {
            assert_eq!(catalog.str_value("episode_id", i).unwrap(), eid_1);
            assert_eq!(catalog.str_value("podcast_id", i).unwrap(), pid_a);
            // First record wins on duplicate mp3 URLs.
            assert_eq!(catalog.str_value("ep_title", i).unwrap(), "Episode One");
            found = true;
        }
    }
    assert!(found, "episode E1 present in catalog");
}

#[test]
fn podcast_aggregates_match_partitions() {
    let fixture = common::converted_corpus();
    let root = &fixture.data_dir;
    let podcast_catalog = store::read_parquet(&store::podcast_catalog_path(root)).unwrap();

    for i in 0..podcast_catalog.num_rows() {
        let pid = podcast_catalog.str_value("podcast_id", i).unwrap();
        let total = podcast_catalog.f64_value("total_duration_seconds", i).unwrap();
        let count = podcast_catalog.i64_value("episode_count", i).unwrap();

        let partition = store::read_parquet(&store::episode_partition_path(root, &pid)).unwrap();
        assert_eq!(partition.num_rows() as i64, count);
        let partition_total: f64 = (0..partition.num_rows())
            .map(|r| partition.f64_value("duration_seconds", r).unwrap())
            .sum();
        assert!((partition_total - total).abs() < 1e-3);
    }

    // Category union for podcast A covers both episodes' categories.
    let pid_a = podcast_id_from_rss(common::RSS_A);
    for i in 0..podcast_catalog.num_rows() {
        if podcast_catalog.str_value("podcast_id", i).unwrap() == pid_a {
            let cats = podcast_catalog.list_value("all_categories", i).unwrap();
            assert!(cats.contains(&"Education".to_string()));
            assert!(cats.contains(&"Science".to_string()));
            assert_eq!(
                podcast_catalog.str_value("earliest_date", i).unwrap(),
                "2020-01-01T00:00:00"
            );
            assert_eq!(
                podcast_catalog.str_value("latest_date", i).unwrap(),
                "2021-01-01T00:00:00"
            );
        }
    }
}

#[test]
fn turns_join_and_orphans() {
    let fixture = common::converted_corpus();
    let root = &fixture.data_dir;
    let pid_a = podcast_id_from_rss(common::RSS_A);
    let eid_1 = episode_id_from_mp3(common::MP3_E1);

    let rows = store::read_episode_turns(root, &pid_a, &eid_1, false).unwrap();
    // All five E1 turn records land in the partition, sorted by start.
    assert_eq!(rows.len(), 5);
    assert!(rows.windows(2).all(|w| w[0].start_time <= w[1].start_time));
    assert_eq!(rows[0].turn_text, "the quick brown fox jumps over the lazy dog");

    // The orphan mp3 URL produced no partition anywhere.
    let orphan_pid = podcast_id_from_rss("http://nowhere/ghost.mp3");
    assert!(!store::turn_text_path(root, &orphan_pid).exists());
}

#[test]
fn audio_features_round_trip() {
    let fixture = common::converted_corpus();
    let pid_a = podcast_id_from_rss(common::RSS_A);
    let eid_1 = episode_id_from_mp3(common::MP3_E1);

    let rows = store::read_episode_turns(&fixture.data_dir, &pid_a, &eid_1, true).unwrap();
    let first = &rows[0];
    assert_eq!(first.mfcc1_sma3_mean, Some(1.5));
    assert_eq!(first.f0_semitone_from_27_5hz_sma3nz_mean, Some(25.0));
}

#[test]
fn reconversion_is_deterministic_and_keeps_backup() {
    let fixture = common::converted_corpus();
    let root = fixture.data_dir.clone();
    let manifest_before = Manifest::load(&store::manifest_path(&root)).unwrap();

    let episode_ids = |dir: &std::path::Path| -> Vec<String> {
        let catalog = store::read_parquet(&store::episode_catalog_path(dir)).unwrap();
        let mut ids: Vec<String> = (0..catalog.num_rows())
            .map(|i| catalog.str_value("episode_id", i).unwrap())
            .collect();
        ids.sort();
        ids
    };
    let ids_before = episode_ids(&root);

    // Re-run over the same inputs.
    let options = ConvertOptions {
        input_dir: fixture.input_dir.clone(),
        output_dir: root.clone(),
        skip_turns: false,
    };
    run_convert(&options).unwrap();

    let manifest_after = Manifest::load(&store::manifest_path(&root)).unwrap();
    assert_eq!(manifest_after.record_counts, manifest_before.record_counts);
    assert_eq!(episode_ids(&root), ids_before);

    // Previous output preserved as .old beside the final directory.
    let backup = root.with_file_name({
        let mut name = root.file_name().unwrap().to_os_string();
        name.push(".old");
        name
    });
    assert!(backup.exists());
    assert!(store::podcast_catalog_path(&backup).exists());
}

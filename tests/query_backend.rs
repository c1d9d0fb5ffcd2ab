//! Backend construction, cache behavior, lookups, filtered episode
//! search, and statistics over the fixture corpus.

mod common;

use std::sync::Arc;

use podcorpus::ids::{episode_id_from_mp3, podcast_id_from_rss};
use podcorpus::store;
use podcorpus::{CorpusBackend, CorpusError, EpisodeSearchCriteria};

#[test]
fn podcast_lookup_by_name_and_id() {
    let fixture = common::indexed_corpus();
    let backend = CorpusBackend::open(&fixture.data_dir).unwrap();

    // Exact case-insensitive match.
    let podcast = backend.get_podcast_by_name("test podcast").unwrap();
    assert_eq!(podcast.podcast_id, podcast_id_from_rss(common::RSS_A));
    assert_eq!(podcast.pod_title, "Test Podcast");
    assert_eq!(podcast.episode_count, 3);

    // Substring match.
    let podcast = backend.get_podcast_by_name("other").unwrap();
    assert_eq!(podcast.pod_title, "Other Show");

    // Round-trip by id.
    let by_id = backend.get_podcast_by_id(&podcast.podcast_id).unwrap();
    assert_eq!(by_id.pod_title, "Other Show");

    assert!(matches!(
        backend.get_podcast_by_name("does not exist").unwrap_err(),
        CorpusError::NotFound(_)
    ));
}

#[test]
fn category_and_hostname_indexes() {
    let fixture = common::indexed_corpus();
    let backend = CorpusBackend::open(&fixture.data_dir).unwrap();
    let pid_a = podcast_id_from_rss(common::RSS_A);

    let education = backend.get_podcasts_by_category("education");
    assert_eq!(education, vec![pid_a.clone()]);
    assert!(backend.get_podcasts_by_category("sports").is_empty());

    let by_host = backend.get_podcasts_by_hostname("example.com");
    assert_eq!(by_host, vec![pid_a]);
    assert!(backend.get_podcasts_by_hostname("unknown.host").is_empty());
}

#[test]
fn episode_lookups() {
    let fixture = common::indexed_corpus();
    let backend = CorpusBackend::open(&fixture.data_dir).unwrap();
    let pid_a = podcast_id_from_rss(common::RSS_A);
    let eid_1 = episode_id_from_mp3(common::MP3_E1);

    let episode = backend.get_episode_by_id(&eid_1).unwrap().unwrap();
    assert_eq!(episode.ep_title, "Episode One");
    assert_eq!(episode.categories, vec!["Education", "Science"]);
    assert!(episode.transcript.is_none());

    assert!(backend.get_episode_by_id("ffffffffffffffff").unwrap().is_none());

    let catalog_only = backend.get_episodes_for_podcast(&pid_a, false).unwrap();
    assert_eq!(catalog_only.len(), 3);
    assert!(catalog_only.iter().all(|e| e.transcript.is_none()));

    let with_transcripts = backend.get_episodes_for_podcast(&pid_a, true).unwrap();
    assert_eq!(with_transcripts.len(), 3);
    let e1 = with_transcripts
        .iter()
        .find(|e| e.episode_id == eid_1)
        .unwrap();
    assert_eq!(e1.transcript.as_deref(), Some("full transcript text"));
}

#[test]
fn search_episodes_filters() {
    let fixture = common::indexed_corpus();
    let backend = CorpusBackend::open(&fixture.data_dir).unwrap();

    // S2: category substring matching.
    let education = backend
        .search_episodes(&EpisodeSearchCriteria {
            category: Some("education".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(education.len(), 3);
    let partial = backend
        .search_episodes(&EpisodeSearchCriteria {
            category: Some("Edu".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(partial.len(), 3);
    let none = backend
        .search_episodes(&EpisodeSearchCriteria {
            category: Some("sports".into()),
            ..Default::default()
        })
        .unwrap();
    assert!(none.is_empty());

    // max == min keeps episodes of exactly that duration.
    let exact_duration = backend
        .search_episodes(&EpisodeSearchCriteria {
            min_duration: Some(1800.0),
            max_duration: Some(1800.0),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(exact_duration.len(), 1);
    assert_eq!(exact_duration[0].ep_title, "Episode One");

    // Language is case-insensitive exact.
    let german = backend
        .search_episodes(&EpisodeSearchCriteria {
            language: Some("DE".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(german.len(), 1);

    // Host name substring, row-wise over the list column.
    let by_host = backend
        .search_episodes(&EpisodeSearchCriteria {
            host_name: Some("jane".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_host.len(), 2);

    let by_guest = backend
        .search_episodes(&EpisodeSearchCriteria {
            guest_name: Some("guest one".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(by_guest.len(), 1);

    // Speaker-count range plus podcast name.
    let combo = backend
        .search_episodes(&EpisodeSearchCriteria {
            min_speakers: Some(2),
            podcast_name: Some("test".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(combo.len(), 2);

    // Overlap proportion range.
    let overlap = backend
        .search_episodes(&EpisodeSearchCriteria {
            min_overlap_prop_duration: Some(0.1),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(overlap.len(), 1);
    assert_eq!(overlap[0].ep_title, "Episode Two");
}

#[test]
fn statistics_histograms() {
    let fixture = common::indexed_corpus();
    let backend = CorpusBackend::open(&fixture.data_dir).unwrap();
    let stats = backend.get_statistics().unwrap();

    assert_eq!(stats.total_podcasts, 2);
    assert_eq!(stats.total_episodes, 4);
    let expected_hours = (1800.0 + 3600.0 + 300.0 + 600.0) / 3600.0;
    assert!((stats.total_duration_hours - expected_hours).abs() < 1e-9);
    assert_eq!(stats.category_distribution["Education"], 3);
    assert_eq!(stats.category_distribution["Science"], 1);
    assert_eq!(stats.category_distribution["Comedy"], 1);
    assert_eq!(stats.language_distribution["en"], 3);
    assert_eq!(stats.language_distribution["de"], 1);
    assert_eq!(stats.speaker_distribution[&1], 2);
}

#[test]
fn index_cache_round_trip() {
    let fixture = common::indexed_corpus();

    // First open builds and saves the cache plus the IPC frames.
    let backend = CorpusBackend::open(&fixture.data_dir).unwrap();
    let stats_first = backend.get_statistics().unwrap();
    assert!(store::index_cache_path(&fixture.data_dir).exists());
    assert!(store::podcast_df_cache_path(&fixture.data_dir).exists());
    drop(backend);

    // Second open loads from the cache and answers identically.
    let cached = podcorpus::backend::cache::load(&fixture.data_dir);
    assert!(cached.is_some(), "fingerprint matches untouched metadata");
    let backend = CorpusBackend::open(&fixture.data_dir).unwrap();
    assert_eq!(backend.num_podcasts(), 2);
    assert_eq!(backend.num_episodes(), 4);
    let stats_second = backend.get_statistics().unwrap();
    assert_eq!(stats_second.total_podcasts, stats_first.total_podcasts);
    assert_eq!(
        stats_second.category_distribution,
        stats_first.category_distribution
    );

    // Touching a metadata parquet file invalidates the cache.
    let catalog = store::episode_catalog_path(&fixture.data_dir);
    let bytes = std::fs::read(&catalog).unwrap();
    std::fs::write(&catalog, bytes).unwrap();
    // mtime granularity can be coarse; growing the file always changes
    // the fingerprint.
    let mut grown = std::fs::read(&catalog).unwrap();
    grown.push(0);
    std::fs::write(&catalog, grown).unwrap();
    assert!(podcorpus::backend::cache::load(&fixture.data_dir).is_none());
}

#[test]
fn missing_store_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let err = CorpusBackend::open(dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, CorpusError::DatasetAccess(_)));
}

#[test]
fn backend_is_shareable_across_threads() {
    let fixture = common::indexed_corpus();
    let backend = Arc::new(CorpusBackend::open(&fixture.data_dir).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let backend = Arc::clone(&backend);
            std::thread::spawn(move || {
                let stats = backend.get_statistics().unwrap();
                assert_eq!(stats.total_podcasts, 2);
                backend.get_podcast_by_name("test podcast").unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

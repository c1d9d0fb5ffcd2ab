//! Shared fixture: a small two-podcast source corpus written as gzip
//! JSONL, converted and indexed into a temp directory.
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use tempfile::TempDir;

use podcorpus::index::run_phases;
use podcorpus::ingest::{run_convert, ConvertOptions, EPISODE_FILE, TURN_FILE};

pub const RSS_A: &str = "http://example.com/rss";
pub const RSS_B: &str = "http://other.org/feed";
pub const MP3_E1: &str = "http://x/1.mp3";
pub const MP3_E2: &str = "http://x/2.mp3";
pub const MP3_E3: &str = "http://x/3.mp3";
pub const MP3_E4: &str = "http://y/1.mp3";

pub fn write_jsonl_gz(path: &Path, lines: &[Value]) {
    let file = File::create(path).expect("create source file");
    let mut enc = GzEncoder::new(file, Compression::default());
    for line in lines {
        writeln!(enc, "{line}").expect("write line");
    }
    // One invalid line; the reader must skip it.
    writeln!(enc, "this is not json").expect("write line");
    enc.finish().expect("finish gzip");
}

pub fn episode_records() -> Vec<Value> {
    vec![
        json!({
            "mp3url": MP3_E1,
            "rssUrl": RSS_A,
            "podTitle": "Test Podcast",
            "podDescription": "A show about tests",
            "epTitle": "Episode One",
            "epDescription": "The first episode",
            "durationSeconds": 1800.0,
            "category1": "Education",
            "category2": "Science",
            "hostPredictedNames": ["John Smith"],
            "guestPredictedNames": "NO_GUEST_PREDICTED",
            "mainEpSpeakers": ["SPEAKER_00", "SPEAKER_01"],
            "hostSpeakerLabels": {"SPEAKER_00": "John Smith"},
            "guestSpeakerLabels": "SPEAKER_DATA_UNAVAILABLE",
            "numMainSpeakers": 2,
            "language": "en",
            "explicit": 0,
            "episodeDateLocalized": 1577836800000_i64,
            "overlapPropDuration": 0.05,
            "avgTurnDuration": 9.5,
            "totalSpLabels": 40,
            "transcript": "full transcript text"
        }),
        // Duplicate mp3 URL; first occurrence wins.
        json!({
            "mp3url": MP3_E1,
            "rssUrl": RSS_A,
            "podTitle": "Test Podcast",
            "epTitle": "Episode One (duplicate)"
        }),
        json!({
            "mp3url": MP3_E2,
            "rssUrl": RSS_A,
            "podTitle": "Test Podcast",
            "epTitle": "Episode Two",
            "durationSeconds": 3600.0,
            "category1": "Education",
            "hostPredictedNames": ["John Smith", "Jane Doe"],
            "guestPredictedNames": ["Guest One"],
            "numMainSpeakers": 3,
            "language": "en",
            "episodeDateLocalized": "1609459200000",
            "overlapPropDuration": 0.2
        }),
        json!({
            "mp3url": MP3_E3,
            "rssUrl": RSS_A,
            "podTitle": "Test Podcast",
            "epTitle": "Episode Three",
            "durationSeconds": 300.0,
            "category1": "Education",
            "hostPredictedNames": ["Jane Doe"],
            "numMainSpeakers": 1,
            "language": "de"
        }),
        // Missing rssUrl; skipped entirely.
        json!({
            "mp3url": "http://x/skipped.mp3",
            "podTitle": "No Feed"
        }),
        json!({
            "mp3url": MP3_E4,
            "rssUrl": RSS_B,
            "podTitle": "Other Show",
            "epTitle": "Other Episode",
            "durationSeconds": 600.0,
            "category1": "Comedy",
            "hostPredictedNames": ["Alex Host"],
            "numMainSpeakers": 1,
            "language": "en"
        }),
    ]
}

pub fn turn_records() -> Vec<Value> {
    vec![
        json!({
            "mp3url": MP3_E1,
            "speaker": ["SPEAKER_00"],
            "turnText": "the quick brown fox jumps over the lazy dog",
            "startTime": 0.0,
            "endTime": 10.0,
            "duration": 10.0,
            "turnCount": 0,
            "inferredSpeakerRole": "host",
            "inferredSpeakerName": "John Smith",
            "mfcc1_sma3Mean": 1.5,
            "F0semitoneFrom27.5Hz_sma3nzMean": 25.0
        }),
        json!({
            "mp3url": MP3_E1,
            "speaker": "SPEAKER_01",
            "turnText": "um well you know I think like that's right",
            "startTime": 10.5,
            "endTime": 20.0,
            "duration": 9.5,
            "turnCount": 1,
            "inferredSpeakerRole": "guest",
            "inferredSpeakerName": "Guest One"
        }),
        json!({
            "mp3url": MP3_E1,
            "speaker": ["SPEAKER_00", "SPEAKER_01"],
            "turnText": "I think you know what I mean",
            "startTime": 19.0,
            "endTime": 30.0,
            "duration": 11.0,
            "turnCount": 2,
            "inferredSpeakerRole": "host",
            "inferredSpeakerName": "John Smith"
        }),
        // Empty text: indexed nowhere, skipped by the object builder.
        json!({
            "mp3url": MP3_E1,
            "speaker": ["SPEAKER_00"],
            "turnText": "",
            "startTime": 30.0,
            "endTime": 31.0,
            "duration": 1.0,
            "turnCount": 3,
            "inferredSpeakerRole": "host"
        }),
        // Inverted times: dropped at object-build time.
        json!({
            "mp3url": MP3_E1,
            "speaker": ["SPEAKER_00"],
            "turnText": "backwards turn",
            "startTime": 40.0,
            "endTime": 35.0,
            "duration": 5.0,
            "turnCount": 4,
            "inferredSpeakerRole": "host"
        }),
        json!({
            "mp3url": MP3_E2,
            "speaker": ["SPEAKER_00"],
            "turnText": "aaaa bbbb",
            "startTime": 10.0,
            "endTime": 20.0,
            "duration": 10.0,
            "turnCount": 0,
            "inferredSpeakerRole": "host",
            "inferredSpeakerName": "John Smith"
        }),
        json!({
            "mp3url": MP3_E2,
            "speaker": ["SPEAKER_01"],
            "turnText": "the fox again and the fox once more",
            "startTime": 21.0,
            "endTime": 29.0,
            "duration": 8.0,
            "turnCount": 1,
            "inferredSpeakerRole": "guest",
            "inferredSpeakerName": "Guest One"
        }),
        json!({
            "mp3url": MP3_E4,
            "speaker": ["SPEAKER_00"],
            "turnText": "some things are good",
            "startTime": 0.0,
            "endTime": 5.0,
            "duration": 5.0,
            "turnCount": 0,
            "inferredSpeakerRole": "host",
            "inferredSpeakerName": "Alex Host"
        }),
        // Orphan record: mp3 URL never seen in the episode pass.
        json!({
            "mp3url": "http://nowhere/ghost.mp3",
            "speaker": ["SPEAKER_00"],
            "turnText": "ghost turn",
            "startTime": 0.0,
            "endTime": 1.0,
            "duration": 1.0,
            "turnCount": 0
        }),
    ]
}

pub struct Fixture {
    /// Owns the temp tree; dropping it removes everything.
    #[allow(dead_code)]
    pub tmp: TempDir,
    pub input_dir: PathBuf,
    pub data_dir: PathBuf,
}

/// Write the source corpus and run the conversion.
pub fn converted_corpus() -> Fixture {
    let tmp = TempDir::new().expect("temp dir");
    let input_dir = tmp.path().join("source");
    let data_dir = tmp.path().join("corpus");
    std::fs::create_dir_all(&input_dir).expect("create input dir");

    write_jsonl_gz(&input_dir.join(EPISODE_FILE), &episode_records());
    write_jsonl_gz(&input_dir.join(TURN_FILE), &turn_records());

    let options = ConvertOptions {
        input_dir: input_dir.clone(),
        output_dir: data_dir.clone(),
        skip_turns: false,
    };
    run_convert(&options).expect("conversion succeeds");

    Fixture {
        tmp,
        input_dir,
        data_dir,
    }
}

/// Conversion plus all three index phases.
pub fn indexed_corpus() -> Fixture {
    let fixture = converted_corpus();
    run_phases(&fixture.data_dir, None).expect("index build succeeds");
    fixture
}

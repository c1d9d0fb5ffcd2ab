//! Phase 3: the full-text search database.
//!
//! All turn text is loaded into a single SQLite file with a monotonic
//! global `row_id`, secondary indexes for the common filters, and an
//! FTS5 index (porter stemming) keyed by `row_id` for BM25 ranking.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::error::{CorpusError, Result};
use crate::index::metrics::count_words;
use crate::store;

/// English stop words stripped from FTS queries. The porter tokenizer
/// stems index terms; stop words carry no ranking signal either way.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "had", "has", "have",
    "he", "her", "his", "i", "if", "in", "into", "is", "it", "its", "me", "my", "no", "not", "of",
    "on", "or", "our", "she", "so", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "to", "was", "we", "were", "what", "when", "which", "who", "will", "with",
    "you", "your",
];

pub fn build(data_dir: &Path) -> Result<()> {
    let turns_root = data_dir.join("turns");
    if !turns_root.is_dir() {
        return Err(CorpusError::DatasetAccess(format!(
            "turn partitions not found under {} (run `convert` first)",
            turns_root.display()
        )));
    }

    let db_path = store::search_db_path(data_dir);
    if db_path.exists() {
        std::fs::remove_file(&db_path)?;
        info!("removed existing {}", db_path.display());
    }
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!("phase 3: building full-text search database");
    let conn = Connection::open(&db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-65536")?;

    conn.execute(
        "CREATE TABLE turns (
            row_id INTEGER PRIMARY KEY,
            episode_id TEXT NOT NULL,
            podcast_id TEXT NOT NULL,
            turn_count INTEGER NOT NULL,
            turn_text TEXT NOT NULL,
            start_time REAL NOT NULL,
            end_time REAL NOT NULL,
            duration REAL NOT NULL,
            speaker_role TEXT,
            speaker_name TEXT,
            word_count INTEGER NOT NULL
        )",
        [],
    )?;

    let partitions = store::list_turn_partitions(data_dir)?;
    let pb = ProgressBar::new(partitions.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} partitions loaded")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut next_row_id: i64 = 1;
    let mut total_inserted: u64 = 0;
    for (podcast_id, _dir) in &partitions {
        match load_partition(&conn, data_dir, podcast_id, &mut next_row_id) {
            Ok(inserted) => total_inserted += inserted,
            Err(e) => warn!("failed to load partition {podcast_id}: {e}"),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    info!("phase 3: inserted {total_inserted} rows, building indexes");

    conn.execute("CREATE INDEX idx_turns_episode ON turns(episode_id)", [])?;
    conn.execute("CREATE INDEX idx_turns_podcast ON turns(podcast_id)", [])?;
    conn.execute("CREATE INDEX idx_turns_role ON turns(speaker_role)", [])?;

    conn.execute(
        "CREATE VIRTUAL TABLE turns_fts USING fts5(
            turn_text,
            content='turns',
            content_rowid='row_id',
            tokenize='porter unicode61'
        )",
        [],
    )?;
    conn.execute(
        "INSERT INTO turns_fts(rowid, turn_text) SELECT row_id, turn_text FROM turns",
        [],
    )?;
    conn.execute("INSERT INTO turns_fts(turns_fts) VALUES('optimize')", [])?;

    let row_count: i64 = conn.query_row("SELECT COUNT(*) FROM turns", [], |r| r.get(0))?;
    info!("phase 3: {} rows in {}", row_count, db_path.display());
    Ok(())
}

fn load_partition(
    conn: &Connection,
    data_dir: &Path,
    podcast_id: &str,
    next_row_id: &mut i64,
) -> Result<u64> {
    let text_path = store::turn_text_path(data_dir, podcast_id);
    if !text_path.exists() {
        return Ok(0);
    }
    let frame = store::read_parquet(&text_path)?;

    let mut inserted = 0u64;
    conn.execute_batch("BEGIN")?;
    {
        let mut stmt = conn.prepare(
            "INSERT INTO turns (row_id, episode_id, podcast_id, turn_count, turn_text,
                                start_time, end_time, duration, speaker_role, speaker_name,
                                word_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        for i in 0..frame.num_rows() {
            let text = frame.str_value("turn_text", i)?;
            if text.is_empty() {
                continue;
            }
            stmt.execute(params![
                *next_row_id,
                frame.str_value("episode_id", i)?,
                podcast_id,
                frame.i64_value("turn_count", i)?,
                text,
                frame.f64_value("start_time", i)?,
                frame.f64_value("end_time", i)?,
                frame.f64_value("duration", i)?,
                frame.str_value("inferred_speaker_role", i)?,
                frame.str_value("inferred_speaker_name", i)?,
                count_words(&text),
            ])?;
            *next_row_id += 1;
            inserted += 1;
        }
    }
    conn.execute_batch("COMMIT")?;
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{turn_text_batch, write_parquet, Codec, TurnTextRow};

    fn turn(eid: &str, tc: i64, text: &str) -> TurnTextRow {
        TurnTextRow {
            episode_id: eid.to_string(),
            podcast_id: "p1".into(),
            mp3_url: "http://x/1.mp3".into(),
            speaker: vec!["SPEAKER_00".into()],
            turn_text: text.to_string(),
            start_time: tc as f64 * 5.0,
            end_time: tc as f64 * 5.0 + 4.0,
            duration: 4.0,
            turn_count: tc,
            inferred_speaker_role: "host".into(),
            inferred_speaker_name: "Jane".into(),
        }
    }

    #[test]
    fn builds_table_and_fts_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let rows = vec![
            turn("e1", 0, "the quick brown fox"),
            turn("e1", 1, ""),
            turn("e2", 0, "jumps over the lazy dog"),
        ];
        write_parquet(
            &store::turn_text_path(root, "p1"),
            &turn_text_batch(&rows).unwrap(),
            Codec::Zstd,
        )
        .unwrap();

        build(root).unwrap();

        let conn = Connection::open(store::search_db_path(root)).unwrap();
        // Empty text row is skipped; row ids are dense from 1.
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM turns", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 2);
        let max_id: i64 = conn
            .query_row("SELECT MAX(row_id) FROM turns", [], |r| r.get(0))
            .unwrap();
        assert_eq!(max_id, 2);

        // Porter stemming: "jumping" matches "jumps".
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM turns_fts WHERE turns_fts MATCH 'jumping'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(hits, 1);
    }
}

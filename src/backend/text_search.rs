//! Full-text, exact, and regex search over turn text, plus
//! key-word-in-context extraction.

use std::str::FromStr;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use rusqlite::functions::FunctionFlags;
use rusqlite::{types::Value as SqlValue, Connection};

use crate::backend::records::{EpisodeTextMatch, KwicHit, TurnSearchHit};
use crate::backend::CorpusBackend;
use crate::error::{CorpusError, Result};
use crate::index::search_db::ENGLISH_STOP_WORDS;

/// How `search_turns` interprets the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// BM25-ranked full-text search with stemming.
    Fts,
    /// Case-insensitive substring match; score fixed at 1.0.
    Exact,
    /// Regular-expression match; score fixed at 1.0.
    Regex,
}

impl FromStr for SearchMode {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fts" => Ok(SearchMode::Fts),
            "exact" => Ok(SearchMode::Exact),
            "regex" => Ok(SearchMode::Regex),
            other => Err(CorpusError::InvalidArgument(format!(
                "invalid search mode '{other}'; use 'fts', 'exact', or 'regex'"
            ))),
        }
    }
}

/// Install a `REGEXP` operator backed by the `regex` crate; the
/// compiled pattern is cached per statement via the aux-data slot.
pub(crate) fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let regexp: Arc<Regex> = ctx.get_or_create_aux(
                0,
                |vr| -> std::result::Result<_, Box<dyn std::error::Error + Send + Sync + 'static>> {
                    Ok(Regex::new(vr.as_str()?)?)
                },
            )?;
            let text = ctx
                .get_raw(1)
                .as_str()
                .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
            Ok(regexp.is_match(text))
        },
    )?;
    Ok(())
}

/// Turn a free-form query into an FTS5 MATCH expression: terms are
/// quoted (to disarm MATCH syntax) and English stop words dropped.
/// `None` when nothing searchable remains.
fn fts_match_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| !ENGLISH_STOP_WORDS.contains(&t.as_str()))
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn push_filters(
    where_clauses: &mut Vec<String>,
    params: &mut Vec<SqlValue>,
    podcast_id: Option<&str>,
    episode_id: Option<&str>,
    speaker_role: Option<&str>,
) {
    if let Some(pid) = podcast_id {
        params.push(SqlValue::Text(pid.to_string()));
        where_clauses.push(format!("t.podcast_id = ?{}", params.len()));
    }
    if let Some(eid) = episode_id {
        params.push(SqlValue::Text(eid.to_string()));
        where_clauses.push(format!("t.episode_id = ?{}", params.len()));
    }
    if let Some(role) = speaker_role {
        params.push(SqlValue::Text(role.to_string()));
        where_clauses.push(format!("t.speaker_role = ?{}", params.len()));
    }
}

fn hit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TurnSearchHit> {
    Ok(TurnSearchHit {
        episode_id: row.get(0)?,
        podcast_id: row.get(1)?,
        turn_count: row.get(2)?,
        turn_text: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        duration: row.get(6)?,
        speaker_role: row.get(7)?,
        speaker_name: row.get(8)?,
        word_count: row.get(9)?,
        score: row.get(10)?,
    })
}

const HIT_COLUMNS: &str = "t.episode_id, t.podcast_id, t.turn_count, t.turn_text, \
     t.start_time, t.end_time, t.duration, t.speaker_role, t.speaker_name, t.word_count";

impl CorpusBackend {
    /// Search turn text across the corpus.
    ///
    /// `fts` ranks by descending BM25 score; `exact` and `regex` return
    /// matches with a fixed score of 1.0. Filters are conjunctive and
    /// results are paginated with `limit` and `offset`.
    pub fn search_turns(
        &self,
        query: &str,
        mode: SearchMode,
        podcast_id: Option<&str>,
        episode_id: Option<&str>,
        speaker_role: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TurnSearchHit>> {
        self.with_search_db(|conn| {
            let mut where_clauses: Vec<String> = Vec::new();
            let mut params: Vec<SqlValue> = Vec::new();

            let sql = match mode {
                SearchMode::Fts => {
                    let Some(expression) = fts_match_expression(query) else {
                        return Ok(Vec::new());
                    };
                    params.push(SqlValue::Text(expression));
                    where_clauses.push(format!("turns_fts MATCH ?{}", params.len()));
                    push_filters(&mut where_clauses, &mut params, podcast_id, episode_id, speaker_role);
                    format!(
                        "SELECT {HIT_COLUMNS}, -bm25(turns_fts) AS score
                         FROM turns_fts
                         JOIN turns t ON t.row_id = turns_fts.rowid
                         WHERE {}
                         ORDER BY score DESC
                         LIMIT ?{} OFFSET ?{}",
                        where_clauses.join(" AND "),
                        params.len() + 1,
                        params.len() + 2,
                    )
                }
                SearchMode::Exact => {
                    params.push(SqlValue::Text(format!("%{query}%")));
                    where_clauses.push(format!("t.turn_text LIKE ?{}", params.len()));
                    push_filters(&mut where_clauses, &mut params, podcast_id, episode_id, speaker_role);
                    format!(
                        "SELECT {HIT_COLUMNS}, 1.0 AS score
                         FROM turns t
                         WHERE {}
                         LIMIT ?{} OFFSET ?{}",
                        where_clauses.join(" AND "),
                        params.len() + 1,
                        params.len() + 2,
                    )
                }
                SearchMode::Regex => {
                    params.push(SqlValue::Text(query.to_string()));
                    where_clauses.push(format!("t.turn_text REGEXP ?{}", params.len()));
                    push_filters(&mut where_clauses, &mut params, podcast_id, episode_id, speaker_role);
                    format!(
                        "SELECT {HIT_COLUMNS}, 1.0 AS score
                         FROM turns t
                         WHERE {}
                         LIMIT ?{} OFFSET ?{}",
                        where_clauses.join(" AND "),
                        params.len() + 1,
                        params.len() + 2,
                    )
                }
            };

            params.push(SqlValue::Integer(limit as i64));
            params.push(SqlValue::Integer(offset as i64));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), hit_from_row)?;
            let mut hits = Vec::new();
            for row in rows {
                hits.push(row?);
            }
            Ok(hits)
        })
    }

    /// Group matching turns by episode. FTS results are ordered by best
    /// BM25 score, exact/regex by match count.
    pub fn search_episodes_by_text(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<EpisodeTextMatch>> {
        self.with_search_db(|conn| {
            let (sql, params): (String, Vec<SqlValue>) = match mode {
                SearchMode::Fts => {
                    let Some(expression) = fts_match_expression(query) else {
                        return Ok(Vec::new());
                    };
                    (
                        "SELECT t.episode_id, t.podcast_id, COUNT(*) AS match_count,
                                MAX(-bm25(turns_fts)) AS best_score
                         FROM turns_fts
                         JOIN turns t ON t.row_id = turns_fts.rowid
                         WHERE turns_fts MATCH ?1
                         GROUP BY t.episode_id, t.podcast_id
                         ORDER BY best_score DESC
                         LIMIT ?2"
                            .to_string(),
                        vec![SqlValue::Text(expression), SqlValue::Integer(limit as i64)],
                    )
                }
                SearchMode::Exact => (
                    "SELECT episode_id, podcast_id, COUNT(*) AS match_count, 1.0 AS best_score
                     FROM turns
                     WHERE turn_text LIKE ?1
                     GROUP BY episode_id, podcast_id
                     ORDER BY match_count DESC
                     LIMIT ?2"
                        .to_string(),
                    vec![
                        SqlValue::Text(format!("%{query}%")),
                        SqlValue::Integer(limit as i64),
                    ],
                ),
                SearchMode::Regex => (
                    "SELECT episode_id, podcast_id, COUNT(*) AS match_count, 1.0 AS best_score
                     FROM turns
                     WHERE turn_text REGEXP ?1
                     GROUP BY episode_id, podcast_id
                     ORDER BY match_count DESC
                     LIMIT ?2"
                        .to_string(),
                    vec![
                        SqlValue::Text(query.to_string()),
                        SqlValue::Integer(limit as i64),
                    ],
                ),
            };

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                Ok(EpisodeTextMatch {
                    episode_id: row.get(0)?,
                    podcast_id: row.get(1)?,
                    match_count: row.get(2)?,
                    best_score: row.get(3)?,
                })
            })?;
            let mut matches = Vec::new();
            for row in rows {
                matches.push(row?);
            }
            Ok(matches)
        })
    }

    /// Key-word-in-context search: a substring pre-filter in SQL, then
    /// word-level context extraction around each case-insensitive match.
    pub fn concordance(
        &self,
        word: &str,
        context_words: usize,
        speaker_role: Option<&str>,
        podcast_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<KwicHit>> {
        let rows: Vec<(String, String, String, String, String, f64, f64)> =
            self.with_search_db(|conn| {
                let mut where_clauses = vec!["turn_text LIKE ?1".to_string()];
                let mut params: Vec<SqlValue> = vec![SqlValue::Text(format!("%{word}%"))];
                if let Some(role) = speaker_role {
                    params.push(SqlValue::Text(role.to_string()));
                    where_clauses.push(format!("speaker_role = ?{}", params.len()));
                }
                if let Some(pid) = podcast_id {
                    params.push(SqlValue::Text(pid.to_string()));
                    where_clauses.push(format!("podcast_id = ?{}", params.len()));
                }
                params.push(SqlValue::Integer(limit as i64));
                let sql = format!(
                    "SELECT episode_id, podcast_id, turn_text, speaker_role, speaker_name,
                            start_time, end_time
                     FROM turns
                     WHERE {}
                     LIMIT ?{}",
                    where_clauses.join(" AND "),
                    params.len(),
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })?;

        let pattern = RegexBuilder::new(&regex::escape(word))
            .case_insensitive(true)
            .build()
            .map_err(|e| CorpusError::InvalidArgument(format!("invalid keyword: {e}")))?;
        let keyword_word_count = word.split_whitespace().count().max(1);

        let mut hits = Vec::new();
        for (episode_id, podcast_id, text, speaker_role, speaker_name, start_time, end_time) in rows
        {
            // The SQL LIKE pre-filter can produce false positives for
            // word-boundary-sensitive keywords; re-verify with the regex.
            let Some(matched) = pattern.find(&text) else {
                continue;
            };
            let words: Vec<&str> = text.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            let word_index = text[..matched.start()]
                .split_whitespace()
                .count()
                .min(words.len() - 1);

            let left_start = word_index.saturating_sub(context_words);
            let keyword_end = (word_index + keyword_word_count).min(words.len());
            let right_end = (keyword_end + context_words).min(words.len());

            hits.push(KwicHit {
                left_context: words[left_start..word_index].join(" "),
                keyword: words[word_index..keyword_end].join(" "),
                right_context: words[keyword_end..right_end].join(" "),
                episode_id,
                podcast_id,
                speaker_role,
                speaker_name,
                start_time,
                end_time,
            });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_known_values_only() {
        assert_eq!(SearchMode::from_str("fts").unwrap(), SearchMode::Fts);
        assert_eq!(SearchMode::from_str("exact").unwrap(), SearchMode::Exact);
        assert_eq!(SearchMode::from_str("regex").unwrap(), SearchMode::Regex);
        assert!(matches!(
            SearchMode::from_str("fuzzy").unwrap_err(),
            CorpusError::InvalidArgument(_)
        ));
    }

    #[test]
    fn fts_expression_quotes_and_strips_stop_words() {
        assert_eq!(
            fts_match_expression("climate change").as_deref(),
            Some("\"climate\" \"change\"")
        );
        // Pure stop-word queries have nothing to rank on.
        assert_eq!(fts_match_expression("the and of"), None);
        assert_eq!(
            fts_match_expression("The Climate!").as_deref(),
            Some("\"climate\"")
        );
        assert_eq!(fts_match_expression("   "), None);
    }

    #[test]
    fn regexp_function_matches() {
        let conn = Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();
        let hit: bool = conn
            .query_row("SELECT 'hello world' REGEXP 'wor.d'", [], |r| r.get(0))
            .unwrap();
        assert!(hit);
        let miss: bool = conn
            .query_row("SELECT 'hello world' REGEXP '^world'", [], |r| r.get(0))
            .unwrap();
        assert!(!miss);
    }
}

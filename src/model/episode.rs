use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;

use crate::error::{CorpusError, Result};
use crate::model::{SlidingWindows, TimeWindows, Turn};

/// How to treat turns that only partially fall inside a time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRangeBehavior {
    /// Only turns completely inside `[start, end]`.
    Strict,
    /// Turns that overlap `[start, end]`.
    IncludePartial,
    /// Complete turns that intersect `[start, end]`, even if they
    /// extend beyond it.
    IncludeFullTurns,
}

/// Loader installed by the object builder so turns are read from the
/// partition files only on first access.
pub type TurnLoader = Arc<dyn Fn() -> Result<Vec<Turn>> + Send + Sync>;

/// A podcast episode: metadata plus a lazily loaded turn list.
#[derive(Clone, Default)]
pub struct Episode {
    pub episode_id: String,
    pub podcast_id: String,
    pub title: String,
    pub description: String,
    pub mp3_url: String,
    pub duration_seconds: f64,
    pub transcript: String,

    pub podcast_title: String,
    pub podcast_description: String,
    pub rss_url: String,

    /// Up to ten ordered categories, empty slots elided.
    pub categories: Vec<String>,

    pub host_predicted_names: Vec<String>,
    pub guest_predicted_names: Vec<String>,
    pub neither_predicted_names: Vec<String>,

    pub main_ep_speakers: Vec<String>,
    pub host_speaker_labels: BTreeMap<String, String>,
    pub guest_speaker_labels: BTreeMap<String, String>,

    pub overlap_prop_duration: f64,
    pub overlap_prop_turn_count: f64,
    pub avg_turn_duration: f64,
    pub total_speaker_labels: i64,

    pub language: String,
    pub explicit: bool,
    pub image_url: Option<String>,
    /// Millisecond epoch as received (int or numeric string).
    pub episode_date_localized: Option<String>,
    pub oldest_episode_date: Option<String>,
    pub last_update: Option<String>,
    pub created_on: Option<String>,

    pub(crate) turns: OnceCell<Vec<Turn>>,
    pub(crate) turn_loader: Option<TurnLoader>,
}

impl fmt::Debug for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Episode")
            .field("episode_id", &self.episode_id)
            .field("title", &self.title)
            .field("podcast_title", &self.podcast_title)
            .field("duration_seconds", &self.duration_seconds)
            .field("turns_loaded", &self.turns_loaded())
            .finish()
    }
}

impl Episode {
    // ------------------------------------------------------------------
    // Turn access
    // ------------------------------------------------------------------

    /// Attach the deferred loader used on first `turns()` access.
    pub fn set_turn_loader(&mut self, loader: TurnLoader) {
        self.turn_loader = Some(loader);
    }

    /// Install an already materialized turn list.
    pub fn set_turns(&mut self, turns: Vec<Turn>) {
        self.turns = OnceCell::with_value(turns);
    }

    pub fn turns_loaded(&self) -> bool {
        self.turns.get().is_some()
    }

    /// All turns, loading them through the attached loader on first use.
    pub fn turns(&self) -> Result<&[Turn]> {
        let turns = self.turns.get_or_try_init(|| match &self.turn_loader {
            Some(loader) => loader(),
            None => Err(CorpusError::TurnsNotLoaded),
        })?;
        Ok(turns.as_slice())
    }

    pub fn turn_count(&self) -> Result<usize> {
        Ok(self.turns()?.len())
    }

    // ------------------------------------------------------------------
    // Derived properties
    // ------------------------------------------------------------------

    pub fn primary_category(&self) -> Option<&str> {
        self.categories.first().map(String::as_str)
    }

    pub fn num_hosts(&self) -> usize {
        self.host_predicted_names.len()
    }

    pub fn num_guests(&self) -> usize {
        self.guest_predicted_names.len()
    }

    pub fn num_main_speakers(&self) -> usize {
        self.main_ep_speakers.len()
    }

    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds / 60.0
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_seconds / 3600.0
    }

    /// Episode date parsed from the millisecond epoch; `None` when the
    /// raw value is absent or not numeric.
    pub fn episode_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.episode_date_localized.as_deref()?;
        let ms = raw.trim().parse::<f64>().ok()?;
        DateTime::from_timestamp_millis(ms as i64)
    }

    pub fn is_long_form(&self) -> bool {
        self.duration_minutes() > 30.0
    }

    pub fn is_short_form(&self) -> bool {
        self.duration_minutes() < 10.0
    }

    pub fn has_guests(&self) -> bool {
        !self.guest_predicted_names.is_empty()
    }

    pub fn is_solo(&self) -> bool {
        self.num_hosts() == 1 && self.num_guests() == 0
    }

    pub fn is_interview(&self) -> bool {
        self.num_hosts() >= 1 && self.num_guests() >= 1
    }

    pub fn is_panel(&self) -> bool {
        self.num_hosts() + self.num_guests() > 2
    }

    // ------------------------------------------------------------------
    // Turn filters
    // ------------------------------------------------------------------

    /// Turns inside `[start, end]` according to `behavior`. The range is
    /// clamped to `[0, duration_seconds]`.
    pub fn turns_by_time_range(
        &self,
        start_time: f64,
        end_time: f64,
        behavior: TimeRangeBehavior,
    ) -> Result<Vec<&Turn>> {
        let start = start_time.max(0.0);
        let end = end_time.min(self.duration_seconds);
        let turns = self.turns()?;
        let filtered = match behavior {
            TimeRangeBehavior::Strict => turns
                .iter()
                .filter(|t| t.start_time >= start && t.end_time <= end)
                .collect(),
            TimeRangeBehavior::IncludePartial | TimeRangeBehavior::IncludeFullTurns => turns
                .iter()
                .filter(|t| t.overlaps_range(start, end))
                .collect(),
        };
        Ok(filtered)
    }

    /// Turns whose speaker label or inferred name matches `speaker_name`.
    pub fn turns_by_speaker(&self, speaker_name: &str) -> Result<Vec<&Turn>> {
        Ok(self
            .turns()?
            .iter()
            .filter(|t| {
                t.speaker.iter().any(|s| s == speaker_name)
                    || t.inferred_speaker_name.as_deref() == Some(speaker_name)
            })
            .collect())
    }

    pub fn turns_by_role(&self, role: &str) -> Result<Vec<&Turn>> {
        Ok(self
            .turns()?
            .iter()
            .filter(|t| t.inferred_speaker_role.as_deref() == Some(role))
            .collect())
    }

    pub fn host_turns(&self) -> Result<Vec<&Turn>> {
        self.turns_by_role("host")
    }

    pub fn guest_turns(&self) -> Result<Vec<&Turn>> {
        self.turns_by_role("guest")
    }

    /// Turns with at least `min_words` whitespace-separated words.
    pub fn turns_by_min_length(&self, min_words: usize) -> Result<Vec<&Turn>> {
        Ok(self
            .turns()?
            .iter()
            .filter(|t| t.word_count() >= min_words)
            .collect())
    }

    // ------------------------------------------------------------------
    // Sliding windows
    // ------------------------------------------------------------------

    /// Windows of `window_size` turns advanced by
    /// `window_size - overlap`.
    pub fn sliding_window(&self, window_size: usize, overlap: usize) -> Result<SlidingWindows<'_>> {
        if window_size == 0 {
            return Err(CorpusError::InvalidArgument(
                "window size must be positive".into(),
            ));
        }
        if window_size <= overlap {
            return Err(CorpusError::InvalidArgument(format!(
                "window size ({window_size}) must be greater than overlap ({overlap})"
            )));
        }
        Ok(SlidingWindows::new(self.turns()?, window_size, overlap))
    }

    /// Time-based windows of `window_duration` seconds advanced by
    /// `window_duration - overlap_duration`.
    pub fn sliding_window_by_time(
        &self,
        window_duration: f64,
        overlap_duration: f64,
    ) -> Result<TimeWindows<'_>> {
        if window_duration <= 0.0 {
            return Err(CorpusError::InvalidArgument(
                "window duration must be positive".into(),
            ));
        }
        if overlap_duration < 0.0 {
            return Err(CorpusError::InvalidArgument(
                "overlap duration must be non-negative".into(),
            ));
        }
        if window_duration <= overlap_duration {
            return Err(CorpusError::InvalidArgument(format!(
                "window duration ({window_duration}) must be greater than overlap duration ({overlap_duration})"
            )));
        }
        Ok(TimeWindows::new(
            self.turns()?,
            window_duration,
            overlap_duration,
            0.0,
            self.duration_seconds,
        ))
    }

    /// Summary numbers for a prospective windowing of this episode.
    pub fn window_statistics(&self, window_size: usize, overlap: usize) -> Result<WindowStatistics> {
        if window_size == 0 || window_size <= overlap {
            return Err(CorpusError::InvalidArgument(
                "window size must be positive and greater than overlap".into(),
            ));
        }
        let turns = self.turns()?;
        let total_turns = turns.len();
        let step = window_size - overlap;
        let total_windows = if total_turns == 0 {
            0
        } else if total_turns <= window_size {
            1
        } else {
            (total_turns - window_size) / step + 1
        };
        let total_duration: f64 = turns.iter().map(|t| t.duration).sum();
        let avg_turn_duration = if total_turns > 0 {
            total_duration / total_turns as f64
        } else {
            0.0
        };
        Ok(WindowStatistics {
            total_turns,
            window_size,
            overlap,
            step,
            total_windows,
            total_duration,
            avg_turn_duration,
            avg_window_duration: avg_turn_duration * window_size as f64,
        })
    }

    /// Aggregate numbers over the loaded turn list. Zeroed when the
    /// episode has no turns.
    pub fn turn_statistics(&self) -> Result<TurnStatistics> {
        let turns = self.turns()?;
        if turns.is_empty() {
            return Ok(TurnStatistics::default());
        }
        let total_words: usize = turns.iter().map(|t| t.word_count()).sum();
        let total_duration: f64 = turns.iter().map(|t| t.duration).sum();
        let mut speaker_distribution = BTreeMap::new();
        let mut role_distribution = BTreeMap::new();
        for turn in turns {
            for speaker in &turn.speaker {
                *speaker_distribution.entry(speaker.clone()).or_insert(0) += 1;
            }
            let role = turn
                .inferred_speaker_role
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            *role_distribution.entry(role).or_insert(0) += 1;
        }
        Ok(TurnStatistics {
            total_turns: turns.len(),
            total_words,
            avg_turn_duration: total_duration / turns.len() as f64,
            avg_words_per_turn: total_words as f64 / turns.len() as f64,
            speaker_distribution,
            role_distribution,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowStatistics {
    pub total_turns: usize,
    pub window_size: usize,
    pub overlap: usize,
    pub step: usize,
    pub total_windows: usize,
    pub total_duration: f64,
    pub avg_turn_duration: f64,
    pub avg_window_duration: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnStatistics {
    pub total_turns: usize,
    pub total_words: usize,
    pub avg_turn_duration: f64,
    pub avg_words_per_turn: f64,
    pub speaker_distribution: BTreeMap<String, usize>,
    pub role_distribution: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode_with_turns(turns: Vec<Turn>) -> Episode {
        let mut ep = Episode {
            episode_id: "e1".into(),
            podcast_id: "p1".into(),
            title: "Test Episode".into(),
            mp3_url: "http://x/1.mp3".into(),
            duration_seconds: 100.0,
            host_predicted_names: vec!["Host".into()],
            ..Episode::default()
        };
        ep.set_turns(turns);
        ep
    }

    fn turn(start: f64, end: f64, role: &str) -> Turn {
        Turn {
            speaker: vec!["SPEAKER_00".into()],
            text: "a few words here".into(),
            start_time: start,
            end_time: end,
            duration: end - start,
            inferred_speaker_role: Some(role.into()),
            ..Turn::default()
        }
    }

    #[test]
    fn turns_error_without_loader() {
        let ep = Episode::default();
        assert!(matches!(
            ep.turns().unwrap_err(),
            CorpusError::TurnsNotLoaded
        ));
    }

    #[test]
    fn lazy_loader_runs_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let mut ep = Episode {
            duration_seconds: 100.0,
            ..Episode::default()
        };
        ep.set_turn_loader(Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            Ok(vec![turn(0.0, 5.0, "host")])
        }));
        assert!(!ep.turns_loaded());
        assert_eq!(ep.turns().unwrap().len(), 1);
        assert_eq!(ep.turns().unwrap().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(ep.turns_loaded());
    }

    #[test]
    fn time_range_behaviors() {
        let ep = episode_with_turns(vec![
            turn(0.0, 10.0, "host"),
            turn(8.0, 20.0, "guest"),
            turn(30.0, 40.0, "guest"),
        ]);
        // Turn starting exactly at range start 0 is included by both.
        let strict = ep
            .turns_by_time_range(0.0, 10.0, TimeRangeBehavior::Strict)
            .unwrap();
        assert_eq!(strict.len(), 1);
        let partial = ep
            .turns_by_time_range(0.0, 10.0, TimeRangeBehavior::IncludePartial)
            .unwrap();
        assert_eq!(partial.len(), 2);
        let full = ep
            .turns_by_time_range(0.0, 10.0, TimeRangeBehavior::IncludeFullTurns)
            .unwrap();
        assert_eq!(full.len(), 2);
    }

    #[test]
    fn role_and_length_filters() {
        let mut long_turn = turn(0.0, 5.0, "host");
        long_turn.text = "one two three four five six seven".into();
        let ep = episode_with_turns(vec![long_turn, turn(5.0, 8.0, "guest")]);
        assert_eq!(ep.host_turns().unwrap().len(), 1);
        assert_eq!(ep.guest_turns().unwrap().len(), 1);
        assert_eq!(ep.turns_by_min_length(5).unwrap().len(), 1);
    }

    #[test]
    fn form_predicates() {
        let mut ep = episode_with_turns(vec![]);
        ep.duration_seconds = 45.0 * 60.0;
        assert!(ep.is_long_form());
        assert!(!ep.is_short_form());
        assert!(ep.is_solo());
        ep.guest_predicted_names = vec!["G1".into(), "G2".into()];
        assert!(ep.is_interview());
        assert!(ep.is_panel());
        assert!(!ep.is_solo());
    }

    #[test]
    fn episode_date_parses_ms_epoch_from_string_or_none() {
        let mut ep = episode_with_turns(vec![]);
        assert!(ep.episode_date().is_none());
        ep.episode_date_localized = Some("1577836800000".into());
        let date = ep.episode_date().unwrap();
        assert_eq!(date.format("%Y-%m-%d").to_string(), "2020-01-01");
        ep.episode_date_localized = Some("next tuesday".into());
        assert!(ep.episode_date().is_none());
    }

    #[test]
    fn sliding_window_validates_overlap() {
        let ep = episode_with_turns(vec![turn(0.0, 5.0, "host")]);
        assert!(matches!(
            ep.sliding_window(2, 2).unwrap_err(),
            CorpusError::InvalidArgument(_)
        ));
        assert!(ep.sliding_window(2, 1).is_ok());
        assert!(matches!(
            ep.sliding_window_by_time(10.0, 10.0).unwrap_err(),
            CorpusError::InvalidArgument(_)
        ));
    }

    #[test]
    fn empty_statistics_are_zeroed() {
        let ep = episode_with_turns(vec![]);
        let stats = ep.turn_statistics().unwrap();
        assert_eq!(stats, TurnStatistics::default());
        let ws = ep.window_statistics(5, 0).unwrap();
        assert_eq!(ws.total_windows, 0);
    }
}

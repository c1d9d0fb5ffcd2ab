//! Sliding windows over an episode's turns, the core iteration
//! primitive for local conversational analysis.

use std::collections::BTreeMap;

use crate::model::Turn;

/// A contiguous window of turns with bookkeeping about its position in
/// the full sequence.
#[derive(Debug, Clone)]
pub struct TurnWindow<'a> {
    pub turns: &'a [Turn],
    pub window_index: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub total_windows: usize,
    /// 0 on the first window, the configured overlap afterwards.
    pub overlap_size: usize,
}

impl<'a> TurnWindow<'a> {
    pub fn size(&self) -> usize {
        self.turns.len()
    }

    pub fn is_first(&self) -> bool {
        self.window_index == 0
    }

    pub fn is_last(&self) -> bool {
        self.window_index + 1 == self.total_windows
    }

    pub fn has_overlap(&self) -> bool {
        self.overlap_size > 0
    }

    /// Turns shared with the previous window.
    pub fn overlap_turns(&self) -> &'a [Turn] {
        if self.overlap_size > 0 && !self.is_first() {
            &self.turns[..self.overlap_size.min(self.turns.len())]
        } else {
            &[]
        }
    }

    /// Turns first seen in this window.
    pub fn new_turns(&self) -> &'a [Turn] {
        if self.overlap_size > 0 && !self.is_first() {
            &self.turns[self.overlap_size.min(self.turns.len())..]
        } else {
            self.turns
        }
    }

    /// `(first turn start, last turn end)`, or zeros when empty.
    pub fn time_range(&self) -> (f64, f64) {
        match (self.turns.first(), self.turns.last()) {
            (Some(first), Some(last)) => (first.start_time, last.end_time),
            _ => (0.0, 0.0),
        }
    }

    pub fn duration(&self) -> f64 {
        let (start, end) = self.time_range();
        end - start
    }

    pub fn speaker_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for turn in self.turns {
            for speaker in &turn.speaker {
                *counts.entry(speaker.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn role_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for turn in self.turns {
            let role = turn
                .inferred_speaker_role
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            *counts.entry(role).or_insert(0) += 1;
        }
        counts
    }

    /// Text of all turns joined with `separator`.
    pub fn text(&self, separator: &str) -> String {
        self.turns
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

/// Iterator over fixed-size windows advanced by `window_size - overlap`.
#[derive(Debug)]
pub struct SlidingWindows<'a> {
    turns: &'a [Turn],
    window_size: usize,
    step: usize,
    overlap: usize,
    total_windows: usize,
    next_window: usize,
}

impl<'a> SlidingWindows<'a> {
    /// `window_size` must exceed `overlap`; validated by the caller.
    pub(crate) fn new(turns: &'a [Turn], window_size: usize, overlap: usize) -> Self {
        let step = window_size - overlap;
        let n = turns.len();
        let total_windows = if n == 0 {
            0
        } else if n <= window_size {
            1
        } else {
            (n - window_size) / step + 1
        };
        SlidingWindows {
            turns,
            window_size,
            step,
            overlap,
            total_windows,
            next_window: 0,
        }
    }
}

impl<'a> Iterator for SlidingWindows<'a> {
    type Item = TurnWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_window >= self.total_windows {
            return None;
        }
        let window_index = self.next_window;
        self.next_window += 1;

        let start = window_index * self.step;
        let end = (start + self.window_size).min(self.turns.len());
        Some(TurnWindow {
            turns: &self.turns[start..end],
            window_index,
            start_index: start,
            end_index: end,
            total_windows: self.total_windows,
            overlap_size: if window_index > 0 { self.overlap } else { 0 },
        })
    }
}

/// Iterator over time-based windows; each window holds every turn that
/// intersects its time band.
#[derive(Debug)]
pub struct TimeWindows<'a> {
    turns: &'a [Turn],
    window_duration: f64,
    step: f64,
    start_time: f64,
    end_time: f64,
    total_windows: usize,
    next_window: usize,
}

impl<'a> TimeWindows<'a> {
    pub(crate) fn new(
        turns: &'a [Turn],
        window_duration: f64,
        overlap_duration: f64,
        start_time: f64,
        end_time: f64,
    ) -> Self {
        let step = window_duration - overlap_duration;
        let total_duration = end_time - start_time;
        let total_windows = if total_duration <= 0.0 {
            0
        } else {
            (((total_duration - window_duration) / step) as i64 + 1).max(1) as usize
        };
        TimeWindows {
            turns,
            window_duration,
            step,
            start_time,
            end_time,
            total_windows,
            next_window: 0,
        }
    }
}

impl<'a> Iterator for TimeWindows<'a> {
    type Item = TimeWindowItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_window >= self.total_windows {
            return None;
        }
        let window_index = self.next_window;
        self.next_window += 1;

        let window_start = self.start_time + window_index as f64 * self.step;
        let window_end = (window_start + self.window_duration).min(self.end_time);

        let turns: Vec<&'a Turn> = self
            .turns
            .iter()
            .filter(|t| t.start_time < window_end && t.end_time > window_start)
            .collect();

        Some(TimeWindowItem {
            turns,
            window_index,
            total_windows: self.total_windows,
            window_start,
            window_end,
        })
    }
}

/// A time-based window. Unlike index windows, membership is computed
/// per window, so turns are referenced rather than sliced.
#[derive(Debug, Clone)]
pub struct TimeWindowItem<'a> {
    pub turns: Vec<&'a Turn>,
    pub window_index: usize,
    pub total_windows: usize,
    pub window_start: f64,
    pub window_end: f64,
}

impl<'a> TimeWindowItem<'a> {
    pub fn size(&self) -> usize {
        self.turns.len()
    }

    pub fn is_first(&self) -> bool {
        self.window_index == 0
    }

    pub fn is_last(&self) -> bool {
        self.window_index + 1 == self.total_windows
    }

    pub fn text(&self, separator: &str) -> String {
        self.turns
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turns(n: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| Turn {
                speaker: vec![format!("SPEAKER_{:02}", i % 3)],
                text: format!("turn {i}"),
                start_time: i as f64 * 10.0,
                end_time: i as f64 * 10.0 + 8.0,
                duration: 8.0,
                turn_count: i as i64,
                inferred_speaker_role: Some(if i % 3 == 0 { "host" } else { "guest" }.into()),
                ..Turn::default()
            })
            .collect()
    }

    #[test]
    fn window_count_formula() {
        let ts = turns(10);
        // (10 - 4) / 2 + 1 = 4 windows
        let windows: Vec<_> = SlidingWindows::new(&ts, 4, 2).collect();
        assert_eq!(windows.len(), 4);
        assert!(windows[0].is_first());
        assert!(windows[3].is_last());
        assert_eq!(windows[1].start_index, 2);
        assert_eq!(windows[1].overlap_size, 2);
        assert_eq!(windows[0].overlap_size, 0);
    }

    #[test]
    fn single_window_when_fewer_turns_than_size() {
        let ts = turns(3);
        let windows: Vec<_> = SlidingWindows::new(&ts, 5, 0).collect();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].size(), 3);
        assert!(windows[0].is_last());
    }

    #[test]
    fn empty_turn_list_yields_no_windows() {
        let ts: Vec<Turn> = Vec::new();
        assert_eq!(SlidingWindows::new(&ts, 5, 0).count(), 0);
    }

    #[test]
    fn new_turns_cover_everything_exactly_once() {
        let ts = turns(10);
        let mut seen: Vec<i64> = Vec::new();
        for w in SlidingWindows::new(&ts, 4, 2) {
            seen.extend(w.new_turns().iter().map(|t| t.turn_count));
        }
        assert_eq!(seen, (0..10).collect::<Vec<i64>>());
    }

    #[test]
    fn windows_are_monotonic() {
        let ts = turns(9);
        let mut prev_index = None;
        let mut prev_start = 0usize;
        for w in SlidingWindows::new(&ts, 3, 1) {
            if let Some(p) = prev_index {
                assert_eq!(w.window_index, p + 1);
                assert!(w.start_index >= prev_start);
            }
            prev_index = Some(w.window_index);
            prev_start = w.start_index;
        }
    }

    #[test]
    fn distributions_and_text() {
        let ts = turns(3);
        let w = SlidingWindows::new(&ts, 3, 0).next().unwrap();
        let roles = w.role_distribution();
        assert_eq!(roles["host"], 1);
        assert_eq!(roles["guest"], 2);
        assert_eq!(w.text(" "), "turn 0 turn 1 turn 2");
        assert_eq!(w.time_range(), (0.0, 28.0));
    }

    #[test]
    fn time_windows_include_intersecting_turns() {
        let ts = turns(6); // spans 0..58
        let windows: Vec<_> = TimeWindows::new(&ts, 20.0, 5.0, 0.0, 58.0).collect();
        assert!(!windows.is_empty());
        // First window [0, 20): turns starting at 0 and 10 intersect.
        assert_eq!(windows[0].size(), 2);
        for w in &windows {
            for t in &w.turns {
                assert!(t.start_time < w.window_end && t.end_time > w.window_start);
            }
        }
    }
}

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::error::{CorpusError, Result};
use crate::model::Episode;

/// A podcast and its episodes. Aggregate views (category union, date
/// range, type breakdown) are derived from the episode list.
#[derive(Debug, Clone, Default)]
pub struct Podcast {
    pub podcast_id: String,
    pub title: String,
    pub description: String,
    pub rss_url: String,
    pub language: String,
    pub explicit: bool,
    pub image_url: Option<String>,
    pub itunes_author: Option<String>,
    pub episodes: Vec<Episode>,
}

/// Episode-type counts across a podcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpisodeTypeBreakdown {
    pub solo: usize,
    pub interview: usize,
    pub panel: usize,
    pub long_form: usize,
    pub short_form: usize,
}

impl Podcast {
    /// Add an episode; the episode must belong to this podcast.
    pub fn add_episode(&mut self, episode: Episode) -> Result<()> {
        if episode.podcast_title != self.title {
            return Err(CorpusError::InvalidArgument(format!(
                "episode belongs to podcast '{}', not '{}'",
                episode.podcast_title, self.title
            )));
        }
        self.episodes.push(episode);
        Ok(())
    }

    pub fn num_episodes(&self) -> usize {
        self.episodes.len()
    }

    /// Union of predicted host names across episodes.
    pub fn host_names(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .episodes
            .iter()
            .flat_map(|e| e.host_predicted_names.iter())
            .collect();
        set.into_iter().cloned().collect()
    }

    /// Union of predicted guest names across episodes.
    pub fn guest_names(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .episodes
            .iter()
            .flat_map(|e| e.guest_predicted_names.iter())
            .collect();
        set.into_iter().cloned().collect()
    }

    /// Union of categories across episodes.
    pub fn categories(&self) -> Vec<String> {
        let set: BTreeSet<&String> = self
            .episodes
            .iter()
            .flat_map(|e| e.categories.iter())
            .collect();
        set.into_iter().cloned().collect()
    }

    /// The category occurring in the most episodes.
    pub fn primary_category(&self) -> Option<String> {
        let mut counts: BTreeMap<&String, usize> = BTreeMap::new();
        for episode in &self.episodes {
            for category in &episode.categories {
                *counts.entry(category).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .max_by_key(|&(_, count)| count)
            .map(|(category, _)| category.clone())
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.episodes.iter().map(|e| e.duration_seconds).sum()
    }

    pub fn total_duration_hours(&self) -> f64 {
        self.total_duration_seconds() / 3600.0
    }

    pub fn avg_episode_duration_seconds(&self) -> f64 {
        if self.episodes.is_empty() {
            0.0
        } else {
            self.total_duration_seconds() / self.episodes.len() as f64
        }
    }

    pub fn earliest_episode_date(&self) -> Option<DateTime<Utc>> {
        self.episodes.iter().filter_map(|e| e.episode_date()).min()
    }

    pub fn latest_episode_date(&self) -> Option<DateTime<Utc>> {
        self.episodes.iter().filter_map(|e| e.episode_date()).max()
    }

    pub fn shortest_episode(&self) -> Option<&Episode> {
        self.episodes
            .iter()
            .min_by(|a, b| a.duration_seconds.total_cmp(&b.duration_seconds))
    }

    pub fn longest_episode(&self) -> Option<&Episode> {
        self.episodes
            .iter()
            .max_by(|a, b| a.duration_seconds.total_cmp(&b.duration_seconds))
    }

    pub fn episode_type_breakdown(&self) -> EpisodeTypeBreakdown {
        let mut breakdown = EpisodeTypeBreakdown::default();
        for episode in &self.episodes {
            if episode.is_solo() {
                breakdown.solo += 1;
            }
            if episode.is_interview() {
                breakdown.interview += 1;
            }
            if episode.is_panel() {
                breakdown.panel += 1;
            }
            if episode.is_long_form() {
                breakdown.long_form += 1;
            }
            if episode.is_short_form() {
                breakdown.short_form += 1;
            }
        }
        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(title: &str, podcast_title: &str, minutes: f64) -> Episode {
        Episode {
            title: title.into(),
            podcast_title: podcast_title.into(),
            mp3_url: format!("http://x/{title}.mp3"),
            duration_seconds: minutes * 60.0,
            ..Episode::default()
        }
    }

    #[test]
    fn add_episode_rejects_title_mismatch() {
        let mut podcast = Podcast {
            title: "Show A".into(),
            ..Podcast::default()
        };
        assert!(podcast.add_episode(episode("e1", "Show A", 20.0)).is_ok());
        let err = podcast
            .add_episode(episode("e2", "Show B", 20.0))
            .unwrap_err();
        assert!(matches!(err, CorpusError::InvalidArgument(_)));
        assert_eq!(podcast.num_episodes(), 1);
    }

    #[test]
    fn aggregates_unions_and_extremes() {
        let mut podcast = Podcast {
            title: "Show".into(),
            ..Podcast::default()
        };
        let mut e1 = episode("e1", "Show", 5.0);
        e1.categories = vec!["Education".into()];
        e1.host_predicted_names = vec!["Ann".into()];
        e1.episode_date_localized = Some("1577836800000".into());
        let mut e2 = episode("e2", "Show", 45.0);
        e2.categories = vec!["Education".into(), "Science".into()];
        e2.host_predicted_names = vec!["Ann".into(), "Ben".into()];
        e2.guest_predicted_names = vec!["Cal".into()];
        e2.episode_date_localized = Some("1609459200000".into());
        podcast.add_episode(e1).unwrap();
        podcast.add_episode(e2).unwrap();

        assert_eq!(podcast.host_names(), vec!["Ann".to_string(), "Ben".to_string()]);
        assert_eq!(podcast.categories().len(), 2);
        assert_eq!(podcast.primary_category().as_deref(), Some("Education"));
        assert_eq!(podcast.total_duration_seconds(), 3000.0);
        assert_eq!(podcast.shortest_episode().unwrap().title, "e1");
        assert_eq!(podcast.longest_episode().unwrap().title, "e2");
        assert!(podcast.earliest_episode_date().unwrap() < podcast.latest_episode_date().unwrap());

        let breakdown = podcast.episode_type_breakdown();
        assert_eq!(breakdown.short_form, 1);
        assert_eq!(breakdown.long_form, 1);
        assert_eq!(breakdown.interview, 1);
    }
}

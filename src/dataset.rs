//! Host-facing facade over the query backend: materialized domain
//! objects, iteration with sampling, and pass-throughs for the search
//! and metric operations.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::debug;

use crate::backend::{
    CorpusBackend, DatasetStatistics, EpisodeMetricsRecord, EpisodeSearchCriteria,
    EpisodeTextMatch, KwicHit, MetricsFilter, SearchMode, SpeakerNameHit, TurnMetricsRecord,
    TurnSearchHit, WordAudioEstimate,
};
use crate::error::{CorpusError, Result};
use crate::model::{Episode, Podcast};

/// How `iterate_podcasts` / `iterate_episodes` pick rows when capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMode {
    #[default]
    First,
    Random,
}

impl FromStr for SamplingMode {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first" => Ok(SamplingMode::First),
            "random" => Ok(SamplingMode::Random),
            other => Err(CorpusError::InvalidArgument(format!(
                "invalid sampling mode '{other}'; use 'first' or 'random'"
            ))),
        }
    }
}

fn sample<T>(mut items: Vec<T>, max: Option<usize>, mode: SamplingMode) -> Vec<T> {
    match max {
        Some(max) if items.len() > max => match mode {
            SamplingMode::First => {
                items.truncate(max);
                items
            }
            SamplingMode::Random => {
                let mut rng = rand::thread_rng();
                items.shuffle(&mut rng);
                items.truncate(max);
                items
            }
        },
        _ => items,
    }
}

/// The corpus dataset. All operations go through the single backend.
pub struct Dataset {
    backend: Arc<CorpusBackend>,
}

impl Dataset {
    /// Open a dataset over a converted store directory.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Dataset> {
        Ok(Dataset {
            backend: Arc::new(CorpusBackend::open(data_dir)?),
        })
    }

    pub fn backend(&self) -> &CorpusBackend {
        &self.backend
    }

    pub fn num_podcasts(&self) -> usize {
        self.backend.num_podcasts()
    }

    pub fn num_episodes(&self) -> usize {
        self.backend.num_episodes()
    }

    // ------------------------------------------------------------------
    // Podcast / episode retrieval
    // ------------------------------------------------------------------

    /// Find a podcast by title (exact case-insensitive, then substring)
    /// and materialize it with its episodes.
    pub fn search_podcast(&self, name: &str) -> Result<Podcast> {
        let info = self.backend.get_podcast_by_name(name)?;
        self.backend.build_podcast(&info.podcast_id, false)
    }

    /// Filtered episode search, materialized as domain objects with
    /// lazy turn loaders. Episodes that fail to build are skipped.
    pub fn search_episodes(&self, criteria: &EpisodeSearchCriteria) -> Result<Vec<Episode>> {
        let rows = self.backend.search_episodes(criteria)?;
        let mut episodes = Vec::with_capacity(rows.len());
        for row in rows {
            match self
                .backend
                .build_episode(&row.podcast_id, &row.episode_id, false)
            {
                Ok(episode) => episodes.push(episode),
                Err(e) => debug!("skipping episode {}: {e}", row.episode_id),
            }
        }
        Ok(episodes)
    }

    /// Episodes in a category/subcategory (substring match), optionally
    /// further constrained.
    pub fn search_episodes_by_subcategory(
        &self,
        subcategory: &str,
        additional: &EpisodeSearchCriteria,
    ) -> Result<Vec<Episode>> {
        let mut criteria = additional.clone();
        criteria.subcategory = Some(subcategory.to_string());
        self.search_episodes(&criteria)
    }

    /// Podcasts with at least one episode in a category (exact
    /// case-insensitive index lookup).
    pub fn search_podcasts_by_subcategory(&self, subcategory: &str) -> Result<Vec<Podcast>> {
        let mut podcasts = Vec::new();
        for pid in self.backend.get_podcasts_by_category(subcategory) {
            match self.backend.build_podcast(&pid, false) {
                Ok(podcast) => podcasts.push(podcast),
                Err(e) => debug!("skipping podcast {pid}: {e}"),
            }
        }
        Ok(podcasts)
    }

    pub fn get_all_podcasts(&self) -> Result<Vec<Podcast>> {
        let mut podcasts = Vec::new();
        for pid in self.backend.podcast_ids()? {
            match self.backend.build_podcast(&pid, false) {
                Ok(podcast) => podcasts.push(podcast),
                Err(e) => debug!("skipping podcast {pid}: {e}"),
            }
        }
        Ok(podcasts)
    }

    pub fn get_all_episodes(&self) -> Result<Vec<Episode>> {
        self.search_episodes(&EpisodeSearchCriteria::default())
    }

    /// Iterate podcasts lazily, optionally capped with first/random
    /// sampling.
    pub fn iterate_podcasts(
        &self,
        max: Option<usize>,
        mode: SamplingMode,
    ) -> Result<impl Iterator<Item = Podcast> + '_> {
        let ids = sample(self.backend.podcast_ids()?, max, mode);
        let backend = Arc::clone(&self.backend);
        Ok(ids.into_iter().filter_map(move |pid| {
            match backend.build_podcast(&pid, false) {
                Ok(podcast) => Some(podcast),
                Err(e) => {
                    debug!("skipping podcast {pid}: {e}");
                    None
                }
            }
        }))
    }

    /// Iterate episodes lazily, optionally capped with first/random
    /// sampling.
    pub fn iterate_episodes(
        &self,
        max: Option<usize>,
        mode: SamplingMode,
    ) -> Result<impl Iterator<Item = Episode> + '_> {
        let rows = self
            .backend
            .search_episodes(&EpisodeSearchCriteria::default())?;
        let keys: Vec<(String, String)> = rows
            .into_iter()
            .map(|r| (r.podcast_id, r.episode_id))
            .collect();
        let keys = sample(keys, max, mode);
        let backend = Arc::clone(&self.backend);
        Ok(keys.into_iter().filter_map(move |(pid, eid)| {
            match backend.build_episode(&pid, &eid, false) {
                Ok(episode) => Some(episode),
                Err(e) => {
                    debug!("skipping episode {eid}: {e}");
                    None
                }
            }
        }))
    }

    pub fn get_dataset_statistics(&self) -> Result<DatasetStatistics> {
        self.backend.get_statistics()
    }

    // ------------------------------------------------------------------
    // Search / metrics pass-throughs
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
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
        self.backend
            .search_turns(query, mode, podcast_id, episode_id, speaker_role, limit, offset)
    }

    pub fn search_episodes_by_text(
        &self,
        query: &str,
        mode: SearchMode,
        limit: usize,
    ) -> Result<Vec<EpisodeTextMatch>> {
        self.backend.search_episodes_by_text(query, mode, limit)
    }

    pub fn search_by_speaker_name(
        &self,
        name: &str,
        role: Option<&str>,
        exact: bool,
        limit: usize,
    ) -> Result<Vec<SpeakerNameHit>> {
        self.backend.search_by_speaker_name(name, role, exact, limit)
    }

    pub fn concordance(
        &self,
        word: &str,
        context_words: usize,
        speaker_role: Option<&str>,
        podcast_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<KwicHit>> {
        self.backend
            .concordance(word, context_words, speaker_role, podcast_id, limit)
    }

    pub fn get_episode_metrics(&self, episode_id: &str) -> Result<Option<EpisodeMetricsRecord>> {
        self.backend.get_episode_metrics(episode_id)
    }

    pub fn filter_episodes_by_metrics(
        &self,
        filter: &MetricsFilter,
        limit: usize,
    ) -> Result<Vec<EpisodeMetricsRecord>> {
        self.backend.filter_episodes_by_metrics(filter, limit)
    }

    pub fn get_turn_metrics(
        &self,
        podcast_id: &str,
        episode_id: &str,
    ) -> Result<Vec<TurnMetricsRecord>> {
        self.backend.get_turn_metrics(podcast_id, episode_id)
    }

    pub fn estimate_word_audio(
        &self,
        podcast_id: &str,
        episode_id: &str,
        word: &str,
        occurrence: usize,
    ) -> Result<Option<WordAudioEstimate>> {
        self.backend
            .estimate_word_audio(podcast_id, episode_id, word, occurrence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampling_mode_parse() {
        assert_eq!(SamplingMode::from_str("first").unwrap(), SamplingMode::First);
        assert_eq!(SamplingMode::from_str("random").unwrap(), SamplingMode::Random);
        assert!(SamplingMode::from_str("middle").is_err());
    }

    #[test]
    fn sample_respects_cap_and_mode() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(sample(items.clone(), None, SamplingMode::First).len(), 10);
        assert_eq!(
            sample(items.clone(), Some(3), SamplingMode::First),
            vec![0, 1, 2]
        );
        let random = sample(items.clone(), Some(4), SamplingMode::Random);
        assert_eq!(random.len(), 4);
        for value in &random {
            assert!(items.contains(value));
        }
        // Cap above length is a no-op.
        assert_eq!(sample(items, Some(50), SamplingMode::Random).len(), 10);
    }
}

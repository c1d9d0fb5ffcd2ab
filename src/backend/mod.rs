//! Query backend: in-memory lookup maps over the columnar store, with
//! lazy one-shot loads for the heavier catalogs, the metric indexes,
//! and the full-text search connection.

mod audio;
mod builder;
pub mod cache;
mod metrics;
mod records;
mod search;
mod text_search;

pub use cache::LookupIndexes;
pub use records::{
    DatasetStatistics, EpisodeMetricsRecord, EpisodeRecord, EpisodeTextMatch, KwicHit,
    PodcastRecord, SpeakerNameHit, TurnMetricsRecord, TurnSearchHit, WordAudioEstimate,
};
pub use search::EpisodeSearchCriteria;
pub use text_search::SearchMode;
pub use metrics::MetricsFilter;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use crate::error::{CorpusError, Result};
use crate::manifest::Manifest;
use crate::store::{self, Frame};

/// The sole entry point for all queries. Indexes are loaded once at
/// construction (from cache when valid) and read-only afterwards, so
/// query operations are reentrant.
pub struct CorpusBackend {
    data_dir: PathBuf,
    indexes: LookupIndexes,
    podcast_df: Mutex<Option<Arc<Frame>>>,
    episode_df: Mutex<Option<Arc<Frame>>>,
    speaker_index: Mutex<Option<Arc<Frame>>>,
    episode_metrics: Mutex<Option<Arc<Frame>>>,
    search_db: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for CorpusBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusBackend")
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

impl CorpusBackend {
    /// Open a backend over a converted store. Loads the lightweight
    /// lookup maps from the binary cache when its fingerprint matches,
    /// otherwise rebuilds them from the catalog files and saves the
    /// cache for the next start-up.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<CorpusBackend> {
        let data_dir = data_dir.into();
        let start = Instant::now();
        let meta_dir = store::meta_dir(&data_dir);
        if !meta_dir.is_dir() {
            return Err(CorpusError::DatasetAccess(format!(
                "metadata directory not found: {} (run `convert` first)",
                meta_dir.display()
            )));
        }

        let mut podcast_df = None;
        let mut episode_df = None;
        let indexes = match cache::load(&data_dir) {
            Some(indexes) => indexes,
            None => {
                let (indexes, pc, ec) = build_indexes(&data_dir)?;
                // Persist the maps and frames for the next start-up.
                cache::save(&data_dir, &indexes);
                if let Err(e) = store::write_ipc(&store::podcast_df_cache_path(&data_dir), &pc) {
                    tracing::warn!("failed to save podcast frame cache: {e}");
                }
                if let Err(e) = store::write_ipc(&store::episode_df_cache_path(&data_dir), &ec) {
                    tracing::warn!("failed to save episode frame cache: {e}");
                }
                podcast_df = Some(Arc::new(pc));
                episode_df = Some(Arc::new(ec));
                indexes
            }
        };

        info!(
            "backend loaded in {:.2}s ({} podcasts, {} episodes)",
            start.elapsed().as_secs_f64(),
            indexes.num_podcasts,
            indexes.num_episodes
        );

        Ok(CorpusBackend {
            data_dir,
            indexes,
            podcast_df: Mutex::new(podcast_df),
            episode_df: Mutex::new(episode_df),
            speaker_index: Mutex::new(None),
            episode_metrics: Mutex::new(None),
            search_db: Mutex::new(None),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn num_podcasts(&self) -> usize {
        self.indexes.num_podcasts
    }

    pub fn num_episodes(&self) -> usize {
        self.indexes.num_episodes
    }

    pub fn manifest(&self) -> &Manifest {
        &self.indexes.manifest
    }

    pub(crate) fn indexes(&self) -> &LookupIndexes {
        &self.indexes
    }

    // ------------------------------------------------------------------
    // Lazy catalog access
    // ------------------------------------------------------------------

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Podcast catalog frame, materialized on first access (IPC cache
    /// preferred over the parquet file).
    pub(crate) fn podcast_frame(&self) -> Result<Arc<Frame>> {
        let mut guard = Self::lock(&self.podcast_df);
        if let Some(frame) = guard.as_ref() {
            return Ok(frame.clone());
        }
        let cache_path = store::podcast_df_cache_path(&self.data_dir);
        let frame = if cache_path.exists() {
            info!("loading podcast catalog from IPC cache");
            store::read_ipc(&cache_path)?
        } else {
            info!("loading podcast catalog from parquet");
            store::read_parquet(&store::podcast_catalog_path(&self.data_dir))?
        };
        let frame = Arc::new(frame);
        *guard = Some(frame.clone());
        Ok(frame)
    }

    /// Episode catalog frame, materialized on first access.
    pub(crate) fn episode_frame(&self) -> Result<Arc<Frame>> {
        let mut guard = Self::lock(&self.episode_df);
        if let Some(frame) = guard.as_ref() {
            return Ok(frame.clone());
        }
        let cache_path = store::episode_df_cache_path(&self.data_dir);
        let frame = if cache_path.exists() {
            info!("loading episode catalog from IPC cache");
            store::read_ipc(&cache_path)?
        } else {
            info!("loading episode catalog from parquet");
            store::read_parquet(&store::episode_catalog_path(&self.data_dir))?
        };
        let frame = Arc::new(frame);
        *guard = Some(frame.clone());
        Ok(frame)
    }

    /// Speaker name index, loaded on first speaker search.
    pub(crate) fn speaker_index_frame(&self) -> Result<Arc<Frame>> {
        let mut guard = Self::lock(&self.speaker_index);
        if let Some(frame) = guard.as_ref() {
            return Ok(frame.clone());
        }
        let path = store::speaker_name_index_path(&self.data_dir);
        if !path.exists() {
            return Err(CorpusError::index_not_built(path, 1));
        }
        info!("loading speaker name index from {}", path.display());
        let frame = Arc::new(store::read_parquet(&path)?);
        *guard = Some(frame.clone());
        Ok(frame)
    }

    /// Episode metrics catalog, loaded on first metrics query.
    pub(crate) fn episode_metrics_frame(&self) -> Result<Arc<Frame>> {
        let mut guard = Self::lock(&self.episode_metrics);
        if let Some(frame) = guard.as_ref() {
            return Ok(frame.clone());
        }
        let path = store::episode_metrics_path(&self.data_dir);
        if !path.exists() {
            return Err(CorpusError::index_not_built(path, 2));
        }
        info!("loading episode metrics from {}", path.display());
        let frame = Arc::new(store::read_parquet(&path)?);
        *guard = Some(frame.clone());
        Ok(frame)
    }

    /// Run `f` against the read-only full-text search connection,
    /// opening it on first use. Calls are serialized behind the mutex.
    pub(crate) fn with_search_db<R>(&self, f: impl FnOnce(&Connection) -> Result<R>) -> Result<R> {
        let mut guard = Self::lock(&self.search_db);
        if guard.is_none() {
            let path = store::search_db_path(&self.data_dir);
            if !path.exists() {
                return Err(CorpusError::index_not_built(path, 3));
            }
            info!("opening search database at {}", path.display());
            let conn = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            text_search::register_regexp(&conn)?;
            *guard = Some(conn);
        }
        let conn = guard.as_ref().ok_or_else(|| {
            CorpusError::DatasetAccess("search database connection unavailable".into())
        })?;
        f(conn)
    }

    // ------------------------------------------------------------------
    // Podcast / episode lookups
    // ------------------------------------------------------------------

    /// Exact case-insensitive title match first, then substring over
    /// lowercased titles.
    pub fn get_podcast_by_name(&self, name: &str) -> Result<PodcastRecord> {
        let name_lower = name.to_lowercase();
        if let Some(pid) = self.indexes.title_lower_to_pid.get(&name_lower) {
            if let Some(&idx) = self.indexes.pid_to_idx.get(pid) {
                return PodcastRecord::from_frame(&*self.podcast_frame()?, idx);
            }
        }
        for (title_lower, pid) in &self.indexes.title_lower_to_pid {
            if title_lower.contains(&name_lower) {
                if let Some(&idx) = self.indexes.pid_to_idx.get(pid) {
                    return PodcastRecord::from_frame(&*self.podcast_frame()?, idx);
                }
            }
        }
        Err(CorpusError::NotFound(format!("podcast '{name}' not found")))
    }

    pub fn get_podcast_by_id(&self, podcast_id: &str) -> Result<PodcastRecord> {
        let idx = self
            .indexes
            .pid_to_idx
            .get(podcast_id)
            .copied()
            .ok_or_else(|| CorpusError::NotFound(format!("podcast id '{podcast_id}' not found")))?;
        PodcastRecord::from_frame(&*self.podcast_frame()?, idx)
    }

    /// Podcast ids with episodes in `category` (case-insensitive exact
    /// match over index keys).
    pub fn get_podcasts_by_category(&self, category: &str) -> Vec<String> {
        let category_lower = category.to_lowercase();
        for (key, pids) in &self.indexes.category_to_pids {
            if key.to_lowercase() == category_lower {
                return pids.iter().cloned().collect();
            }
        }
        Vec::new()
    }

    /// Podcast ids whose RSS URL hostname equals `hostname`.
    pub fn get_podcasts_by_hostname(&self, hostname: &str) -> Vec<String> {
        self.indexes
            .hostname_to_pids
            .get(hostname)
            .map(|pids| pids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All podcast ids in catalog order.
    pub fn podcast_ids(&self) -> Result<Vec<String>> {
        let frame = self.podcast_frame()?;
        let mut ids = Vec::with_capacity(frame.num_rows());
        for i in 0..frame.num_rows() {
            ids.push(frame.str_value("podcast_id", i)?);
        }
        Ok(ids)
    }

    /// Catalog lookup by episode id; no transcript.
    pub fn get_episode_by_id(&self, episode_id: &str) -> Result<Option<EpisodeRecord>> {
        match self.indexes.eid_to_idx.get(episode_id) {
            Some(&idx) => Ok(Some(EpisodeRecord::from_catalog(
                &*self.episode_frame()?,
                idx,
            )?)),
            None => Ok(None),
        }
    }

    /// Episode metadata for a podcast. With `include_transcript`, reads
    /// the per-podcast partition file; otherwise serves the in-memory
    /// catalog slice.
    pub fn get_episodes_for_podcast(
        &self,
        podcast_id: &str,
        include_transcript: bool,
    ) -> Result<Vec<EpisodeRecord>> {
        if include_transcript {
            let Some(frame) = store::read_episode_partition(&self.data_dir, podcast_id)? else {
                return Ok(Vec::new());
            };
            let mut records = Vec::with_capacity(frame.num_rows());
            for i in 0..frame.num_rows() {
                records.push(EpisodeRecord::from_partition(&frame, i)?);
            }
            return Ok(records);
        }
        let frame = self.episode_frame()?;
        let idxs = self
            .indexes
            .pid_to_ep_idxs
            .get(podcast_id)
            .cloned()
            .unwrap_or_default();
        let mut records = Vec::with_capacity(idxs.len());
        for idx in idxs {
            records.push(EpisodeRecord::from_catalog(&frame, idx)?);
        }
        Ok(records)
    }

    /// All turns of one episode, sorted by start time.
    pub fn get_turns_for_episode(
        &self,
        podcast_id: &str,
        episode_id: &str,
        include_audio: bool,
    ) -> Result<Vec<store::TurnRow>> {
        store::read_episode_turns(&self.data_dir, podcast_id, episode_id, include_audio)
    }
}

/// Build the lookup maps from the catalog files, column-wise.
fn build_indexes(data_dir: &Path) -> Result<(LookupIndexes, Frame, Frame)> {
    let mut indexes = LookupIndexes::default();

    let pc_path = store::podcast_catalog_path(data_dir);
    info!("loading podcast catalog from {}", pc_path.display());
    let podcast_frame = store::read_podcast_catalog(data_dir)?;
    indexes.num_podcasts = podcast_frame.num_rows();
    {
        let pids = podcast_frame.str_col("podcast_id")?;
        let titles = podcast_frame.str_col("pod_title")?;
        for i in 0..podcast_frame.num_rows() {
            let pid = pids.value(i).to_string();
            indexes.pid_to_idx.insert(pid.clone(), i);
            indexes
                .title_lower_to_pid
                .insert(titles.value(i).to_lowercase(), pid);
        }
    }

    let ec_path = store::episode_catalog_path(data_dir);
    info!("loading episode catalog from {}", ec_path.display());
    let episode_frame = store::read_episode_catalog(data_dir)?;
    indexes.num_episodes = episode_frame.num_rows();
    {
        let eids = episode_frame.str_col("episode_id")?;
        let pids = episode_frame.str_col("podcast_id")?;
        for i in 0..episode_frame.num_rows() {
            indexes.eid_to_idx.insert(eids.value(i).to_string(), i);
            indexes
                .pid_to_ep_idxs
                .entry(pids.value(i).to_string())
                .or_default()
                .push(i);
        }
    }

    let ci_path = store::category_index_path(data_dir);
    info!("loading category index from {}", ci_path.display());
    let category_frame = store::read_parquet(&ci_path)?;
    {
        let categories = category_frame.str_col("category")?;
        let pids = category_frame.str_col("podcast_id")?;
        for i in 0..category_frame.num_rows() {
            indexes
                .category_to_pids
                .entry(categories.value(i).to_string())
                .or_default()
                .insert(pids.value(i).to_string());
        }
    }

    let hi_path = store::hostname_index_path(data_dir);
    info!("loading hostname index from {}", hi_path.display());
    let hostname_frame = store::read_parquet(&hi_path)?;
    {
        let hostnames = hostname_frame.str_col("hostname")?;
        let pids = hostname_frame.str_col("podcast_id")?;
        for i in 0..hostname_frame.num_rows() {
            indexes
                .hostname_to_pids
                .entry(hostnames.value(i).to_string())
                .or_default()
                .insert(pids.value(i).to_string());
        }
    }

    let manifest_path = store::manifest_path(data_dir);
    if manifest_path.exists() {
        indexes.manifest = Manifest::load(&manifest_path)?;
    }

    Ok((indexes, podcast_frame, episode_frame))
}

//! Corpus query engine for a large-scale podcast research dataset.
//!
//! The engine covers three stages of the corpus lifecycle:
//!
//! 1. **Ingestion** ([`ingest`]): two streaming passes over the
//!    compressed source files produce a partitioned Parquet layout with
//!    deterministic ids (see the `convert` binary).
//! 2. **Index building** ([`index`]): offline passes add a speaker-name
//!    index, per-turn and per-episode metrics, and an SQLite FTS5
//!    full-text search database (see the `build-indexes` binary).
//! 3. **Queries** ([`backend`], [`dataset`]): an in-memory lookup layer
//!    with a durable binary cache serves podcast/episode lookups,
//!    filtered scans, BM25-ranked text search, concordance extraction,
//!    metric filters, and audio-offset estimation.
//!
//! ```no_run
//! use podcorpus::Dataset;
//!
//! # fn main() -> podcorpus::Result<()> {
//! let dataset = Dataset::open("/data/corpus/v1")?;
//! let podcast = dataset.search_podcast("test podcast")?;
//! for episode in &podcast.episodes {
//!     println!("{} ({:.1} min)", episode.title, episode.duration_minutes());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod coerce;
pub mod dataset;
pub mod error;
pub mod ids;
pub mod index;
pub mod ingest;
pub mod manifest;
pub mod model;
pub mod store;

pub use backend::{
    CorpusBackend, DatasetStatistics, EpisodeMetricsRecord, EpisodeRecord, EpisodeSearchCriteria,
    EpisodeTextMatch, KwicHit, MetricsFilter, PodcastRecord, SearchMode, SpeakerNameHit,
    TurnMetricsRecord, TurnSearchHit, WordAudioEstimate,
};
pub use dataset::{Dataset, SamplingMode};
pub use error::{CorpusError, Result};
pub use model::{Episode, Podcast, TimeRangeBehavior, Turn, TurnWindow};

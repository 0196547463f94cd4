//! Chess game review with a UCI engine.
//!
//! This crate runs an external engine (normally Stockfish) over every
//! position of a game and grades each move played.
//!
//! # Overview
//!
//! - [`EngineSession`] - One engine instance behind a request/response API
//! - [`EvaluationPipeline`] - Evaluates a list of positions in order, with
//!   caching, progress reporting and supersession of stale runs
//! - [`Classifier`] - Grades a move from the analyses either side of it
//! - [`GameReviewer`] - Parses a game record and produces a [`GameReview`]
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{AnalysisConfig, EvaluationPipeline, GameReviewer, PipelineSettings,
//!     ProcessEngineFactory, ReviewOutcome};
//!
//! let config = AnalysisConfig::load("review.toml")?;
//! let factory = ProcessEngineFactory::new(&config.engine_path);
//! let pipeline = EvaluationPipeline::new(factory, PipelineSettings::from_config(&config));
//! let reviewer = GameReviewer::new(pipeline, chess_openings::builtin_book(), &config);
//! if let ReviewOutcome::Completed(review) = reviewer.review_text(pgn, |_| {}).await? {
//!     println!("White accuracy: {:.1}%", review.white.accuracy);
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod pipeline;
pub mod pv;
pub mod quality;
pub mod review;
pub mod session;

pub use cache::KeyedCache;
pub use config::{AnalysisConfig, BookLookup, ConfigError};
pub use engine::{
    EngineFactory, EngineOptions, EngineSession, ProcessEngineFactory, SearchLimit,
};
pub use error::{AnalysisError, EngineError};
pub use evaluation::{Evaluation, PositionAnalysis, MATE_VALUE};
pub use pipeline::{EvaluationPipeline, PipelineOutcome, PipelineSettings, Progress};
pub use pv::{PvTracker, SearchOutcome};
pub use quality::{
    accuracy, move_loss, BookTracker, Classifier, MoveEvaluation, MoveQuality, PlayerStats,
};
pub use review::{GameReview, GameReviewer, ReviewOutcome};
pub use session::{SessionRegistry, SessionToken};

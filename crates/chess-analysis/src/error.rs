//! Error types for engine sessions and game analysis.

use chess_game::RecordError;
use thiserror::Error;

/// Errors that can occur when talking to an analysis engine.
///
/// Only transport problems are errors. An engine that is not ready yet or
/// that has no legal move answers with `None` instead.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to spawn the engine process.
    #[error("failed to spawn engine '{path}': {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// Reading from or writing to the engine failed.
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The engine did not answer in time.
    #[error("engine timed out waiting for {0}")]
    Timeout(&'static str),
    /// The engine exited or the session was disposed.
    #[error("engine session closed")]
    Closed,
}

/// Errors that can occur while reviewing a game.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The game record could not be parsed; the pipeline never started.
    #[error("invalid game record: {0}")]
    InvalidRecord(#[from] RecordError),
    /// The engine failed underneath the pipeline.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

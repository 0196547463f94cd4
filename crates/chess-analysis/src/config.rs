//! Analysis configuration.
//!
//! Loaded from `review.toml` in the working directory when present. Every
//! field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chess_core::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{EngineOptions, SearchLimit};

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// When to stop consulting the opening book during classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookLookup {
    /// Stop looking once a position is not found.
    #[default]
    FreezeOnFirstMiss,
    /// Look up every ply up to the ply limit.
    EveryPly,
}

/// Configuration for engine analysis and move classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Engine executable. Overridden by `STOCKFISH_PATH` when set.
    #[serde(default = "default_engine_path")]
    pub engine_path: String,
    /// Time per position in milliseconds.
    #[serde(default = "default_movetime_ms")]
    pub movetime_ms: u64,
    /// Fixed search depth; takes precedence over `movetime_ms`.
    #[serde(default)]
    pub depth: Option<u32>,
    #[serde(default = "default_threads")]
    pub threads: u32,
    #[serde(default = "default_hash_mb")]
    pub hash_mb: u32,
    /// Principal variations per search. Two gives best and second-best.
    #[serde(default = "default_multi_pv")]
    pub multi_pv: u32,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    /// Grace period after `quit` before the engine is killed.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// Side whose point of view all scores are reported from.
    #[serde(default = "default_reference_side")]
    pub reference_side: Color,
    /// Moves at or beyond this ply are never book moves.
    #[serde(default = "default_book_ply_limit")]
    pub book_ply_limit: usize,
    #[serde(default)]
    pub book_lookup: BookLookup,
    /// JSON opening file; the built-in book is used when absent.
    #[serde(default)]
    pub opening_book: Option<PathBuf>,
}

fn default_engine_path() -> String {
    "stockfish".to_string()
}

fn default_movetime_ms() -> u64 {
    500
}

fn default_threads() -> u32 {
    1
}

fn default_hash_mb() -> u32 {
    128
}

fn default_multi_pv() -> u32 {
    2
}

fn default_handshake_timeout_ms() -> u64 {
    10_000
}

fn default_shutdown_timeout_ms() -> u64 {
    500
}

fn default_reference_side() -> Color {
    Color::White
}

fn default_book_ply_limit() -> usize {
    20
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            movetime_ms: default_movetime_ms(),
            depth: None,
            threads: default_threads(),
            hash_mb: default_hash_mb(),
            multi_pv: default_multi_pv(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            reference_side: default_reference_side(),
            book_ply_limit: default_book_ply_limit(),
            book_lookup: BookLookup::default(),
            opening_book: None,
        }
    }
}

impl AnalysisConfig {
    /// Loads configuration from `path`, falling back to defaults when the file
    /// does not exist. `STOCKFISH_PATH` overrides the engine path either way.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        if let Ok(engine) = std::env::var("STOCKFISH_PATH") {
            if !engine.is_empty() {
                config.engine_path = engine;
            }
        }
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn config_path() -> PathBuf {
        PathBuf::from("review.toml")
    }

    /// The per-position search budget.
    pub fn search_limit(&self) -> SearchLimit {
        match self.depth {
            Some(depth) => SearchLimit::Depth(depth),
            None => SearchLimit::MoveTime(self.movetime_ms),
        }
    }

    /// Options sent to the engine during the handshake.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            threads: self.threads,
            hash_mb: self.hash_mb,
            multi_pv: self.multi_pv.max(1),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.movetime_ms, 500);
        assert_eq!(config.multi_pv, 2);
        assert_eq!(config.reference_side, Color::White);
        assert_eq!(config.book_ply_limit, 20);
        assert_eq!(config.book_lookup, BookLookup::FreezeOnFirstMiss);
        assert_eq!(config.search_limit(), SearchLimit::MoveTime(500));
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml_content = r#"
movetime_ms = 200
depth = 14
reference_side = "black"
book_lookup = "every_ply"
opening_book = "books/eco.json"
"#;
        let config: AnalysisConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.movetime_ms, 200);
        assert_eq!(config.search_limit(), SearchLimit::Depth(14));
        assert_eq!(config.reference_side, Color::Black);
        assert_eq!(config.book_lookup, BookLookup::EveryPly);
        assert_eq!(config.opening_book, Some(PathBuf::from("books/eco.json")));
        // Unspecified fields keep their defaults.
        assert_eq!(config.hash_mb, 128);
        assert_eq!(config.engine_path, "stockfish");
    }

    #[test]
    fn test_invalid_toml() {
        let result: Result<AnalysisConfig, _> = toml::from_str("movetime_ms = \"fast\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threads = 4\nhash_mb = 512").unwrap();
        let config = AnalysisConfig::load(file.path()).unwrap();
        assert_eq!(config.threads, 4);
        assert_eq!(config.engine_options().hash_mb, 512);
    }

    #[test]
    fn test_load_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threads = [").unwrap();
        assert!(matches!(
            AnalysisConfig::load(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::load(dir.path().join("review.toml")).unwrap();
        assert_eq!(config.movetime_ms, AnalysisConfig::default().movetime_ms);
    }
}

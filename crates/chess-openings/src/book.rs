//! Position-keyed opening book.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use chess_core::{position_key, Move, Position};
use chess_game::{RulesOracle, StandardRules};
use thiserror::Error;
use tracing::{info, warn};

use crate::builtin::builtin_book;
use crate::opening::Opening;

/// Errors that can occur when building or loading an opening book.
#[derive(Debug, Error)]
pub enum BookError {
    /// Failed to read the opening file.
    #[error("failed to read opening book: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A line contains a move that is not legal where it is played.
    #[error("opening '{opening}' has an illegal move '{mv}' at ply {ply}")]
    IllegalLine {
        opening: String,
        mv: String,
        ply: usize,
    },
}

/// Anything that can name the opening a position belongs to.
pub trait OpeningMatcher {
    /// Returns the opening for a FEN, ignoring move clocks.
    fn find_opening(&self, fen: &str) -> Option<&Opening>;
}

impl<T: OpeningMatcher + ?Sized> OpeningMatcher for &T {
    fn find_opening(&self, fen: &str) -> Option<&Opening> {
        (**self).find_opening(fen)
    }
}

/// Opening lines indexed by every position they pass through.
///
/// Transpositions are recognised: lookups are by position, not by move order.
/// When several lines pass through a position, the line that ends there wins,
/// otherwise the first line registered.
#[derive(Debug, Clone, Default)]
pub struct OpeningBook {
    openings: Vec<Opening>,
    /// Position key -> (index into `openings`, line ends here).
    positions: HashMap<String, (usize, bool)>,
}

impl OpeningBook {
    /// Builds a book by replaying every line from the standard start.
    pub fn from_openings(openings: Vec<Opening>) -> Result<Self, BookError> {
        let mut positions: HashMap<String, (usize, bool)> = HashMap::new();

        for (index, opening) in openings.iter().enumerate() {
            let mut position = Position::startpos();
            for (ply, uci) in opening.moves.iter().enumerate() {
                let illegal = || BookError::IllegalLine {
                    opening: opening.name.clone(),
                    mv: uci.clone(),
                    ply: ply + 1,
                };
                let mv = Move::from_uci(uci).ok_or_else(illegal)?;
                let applied = StandardRules
                    .apply_move(&position, mv.from, mv.to, mv.promotion)
                    .ok_or_else(illegal)?;
                position = applied.position;

                let ends_here = ply + 1 == opening.moves.len();
                positions
                    .entry(position.key())
                    .and_modify(|entry| {
                        if ends_here && !entry.1 {
                            *entry = (index, true);
                        }
                    })
                    .or_insert((index, ends_here));
            }
        }

        Ok(Self {
            openings,
            positions,
        })
    }

    /// Loads a JSON array of [`Opening`]s.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, BookError> {
        let text = fs::read_to_string(path)?;
        let openings: Vec<Opening> = serde_json::from_str(&text)?;
        Self::from_openings(openings)
    }

    /// Number of indexed positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// All openings in the book.
    #[must_use]
    pub fn openings(&self) -> &[Opening] {
        &self.openings
    }
}

impl OpeningMatcher for OpeningBook {
    fn find_opening(&self, fen: &str) -> Option<&Opening> {
        let (index, _) = self.positions.get(&position_key(fen))?;
        self.openings.get(*index)
    }
}

static SHARED: OnceLock<OpeningBook> = OnceLock::new();

/// Returns the process-wide book, loading it on first use.
///
/// With a path, the JSON file is loaded; without one, the built-in book is
/// used. Only the first call's argument matters. A load failure is logged and
/// leaves an empty book, so book recognition is simply switched off.
pub fn shared_book(path: Option<&Path>) -> &'static OpeningBook {
    SHARED.get_or_init(|| {
        let book = load_or_empty(path);
        info!(
            openings = book.openings().len(),
            positions = book.len(),
            "opening book loaded"
        );
        book
    })
}

fn load_or_empty(path: Option<&Path>) -> OpeningBook {
    let Some(path) = path else {
        return builtin_book();
    };
    OpeningBook::load_json(path).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "failed to load opening book");
        OpeningBook::default()
    })
}

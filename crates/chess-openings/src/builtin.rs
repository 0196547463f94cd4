//! Built-in opening catalogue.
//!
//! Main lines of common openings, by ECO code. Used when no opening file is
//! configured.

use crate::book::OpeningBook;
use crate::opening::Opening;
use tracing::warn;

/// (ECO, name, UCI moves)
const LINES: &[(&str, &str, &str)] = &[
    ("A01", "Larsen's Opening", "b2b3"),
    ("A02", "Bird's Opening", "f2f4"),
    ("A04", "Reti Opening", "g1f3"),
    ("A07", "Reti Opening: King's Indian Attack", "g1f3 d7d5 g2g3"),
    ("A07", "King's Indian Attack", "g1f3 d7d5 g2g3 g8f6 f1g2"),
    ("A10", "English Opening", "c2c4"),
    ("A30", "English Opening: Symmetrical Variation", "c2c4 c7c5"),
    ("A45", "Trompowsky Attack", "d2d4 g8f6 c1g5"),
    ("A46", "Torre Attack", "d2d4 g8f6 g1f3 e7e6 c1g5"),
    ("A51", "Budapest Gambit", "d2d4 g8f6 c2c4 e7e5"),
    ("A57", "Benko Gambit", "d2d4 g8f6 c2c4 c7c5 d4d5 b7b5"),
    ("A60", "Benoni Defense", "d2d4 g8f6 c2c4 c7c5 d4d5"),
    ("A70", "Modern Benoni", "d2d4 g8f6 c2c4 c7c5 d4d5 e7e6 b1c3 e6d5 c4d5 d7d6"),
    ("A80", "Dutch Defense", "d2d4 f7f5"),
    ("A87", "Dutch Defense: Leningrad Variation", "d2d4 f7f5 g2g3 g8f6 f1g2 g7g6"),
    ("B01", "Scandinavian Defense", "e2e4 d7d5"),
    ("B02", "Alekhine Defense", "e2e4 g8f6"),
    ("B06", "Modern Defense", "e2e4 g7g6"),
    ("B07", "Pirc Defense", "e2e4 d7d6 d2d4 g8f6 b1c3 g7g6"),
    ("B10", "Caro-Kann Defense", "e2e4 c7c6"),
    ("B18", "Caro-Kann Defense: Classical Variation", "e2e4 c7c6 d2d4 d7d5 b1c3 d5e4 c3e4 c8f5"),
    ("B20", "Sicilian Defense", "e2e4 c7c5"),
    ("B21", "Sicilian Defense: Smith-Morra Gambit", "e2e4 c7c5 d2d4 c5d4 c2c3"),
    ("B30", "Sicilian Defense: Open", "e2e4 c7c5 g1f3 b8c6"),
    ("B70", "Sicilian Defense: Dragon Variation", "e2e4 c7c5 g1f3 d7d6 d2d4 c5d4 f3d4 g8f6 b1c3 g7g6"),
    ("B90", "Sicilian Defense: Najdorf Variation", "e2e4 c7c5 g1f3 d7d6 d2d4 c5d4 f3d4 g8f6 b1c3 a7a6"),
    ("C00", "French Defense", "e2e4 e7e6"),
    ("C02", "French Defense: Advance Variation", "e2e4 e7e6 d2d4 d7d5 e4e5"),
    ("C21", "Danish Gambit", "e2e4 e7e5 d2d4 e5d4 c2c3"),
    ("C23", "Bishop's Opening", "e2e4 e7e5 f1c4"),
    ("C25", "Vienna Game", "e2e4 e7e5 b1c3"),
    ("C30", "King's Gambit", "e2e4 e7e5 f2f4"),
    ("C33", "King's Gambit Accepted", "e2e4 e7e5 f2f4 e5f4"),
    ("C41", "Philidor Defense", "e2e4 e7e5 g1f3 d7d6"),
    ("C42", "Petrov Defense", "e2e4 e7e5 g1f3 g8f6"),
    ("C45", "Scotch Game", "e2e4 e7e5 g1f3 b8c6 d2d4"),
    ("C47", "Four Knights Game", "e2e4 e7e5 g1f3 b8c6 b1c3 g8f6"),
    ("C50", "Italian Game", "e2e4 e7e5 g1f3 b8c6 f1c4"),
    ("C51", "Evans Gambit", "e2e4 e7e5 g1f3 b8c6 f1c4 f8c5 b2b4"),
    ("C53", "Giuoco Piano", "e2e4 e7e5 g1f3 b8c6 f1c4 f8c5"),
    ("C60", "Ruy Lopez", "e2e4 e7e5 g1f3 b8c6 f1b5"),
    ("C65", "Ruy Lopez: Morphy Defense", "e2e4 e7e5 g1f3 b8c6 f1b5 a7a6"),
    ("D00", "London System", "d2d4 d7d5 c1f4"),
    ("D00", "Blackmar-Diemer Gambit", "d2d4 d7d5 e2e4 d5e4 b1c3"),
    ("D05", "Colle System", "d2d4 d7d5 g1f3 g8f6 e2e3"),
    ("D06", "Queen's Gambit", "d2d4 d7d5 c2c4"),
    ("D10", "Slav Defense", "d2d4 d7d5 c2c4 c7c6"),
    ("D20", "Queen's Gambit Accepted", "d2d4 d7d5 c2c4 d5c4"),
    ("D30", "Queen's Gambit Declined", "d2d4 d7d5 c2c4 e7e6"),
    ("D80", "Grunfeld Defense", "d2d4 g8f6 c2c4 g7g6 b1c3 d7d5"),
    ("E00", "Catalan Opening", "d2d4 g8f6 c2c4 e7e6 g2g3"),
    ("E11", "Bogo-Indian Defense", "d2d4 g8f6 c2c4 e7e6 g1f3 f8b4"),
    ("E12", "Queen's Indian Defense", "d2d4 g8f6 c2c4 e7e6 g1f3 b7b6"),
    ("E20", "Nimzo-Indian Defense", "d2d4 g8f6 c2c4 e7e6 b1c3 f8b4"),
    ("E60", "King's Indian Defense", "d2d4 g8f6 c2c4 g7g6"),
    ("E90", "King's Indian Defense: Classical Variation", "d2d4 g8f6 c2c4 g7g6 b1c3 f8g7 e2e4 d7d6 g1f3"),
];

/// Returns the built-in openings.
#[must_use]
pub fn builtin_openings() -> Vec<Opening> {
    LINES
        .iter()
        .map(|(eco, name, moves)| {
            Opening::new(*eco, *name, moves.split_whitespace().map(String::from).collect())
        })
        .collect()
}

/// Builds a book from the built-in openings.
#[must_use]
pub fn builtin_book() -> OpeningBook {
    OpeningBook::from_openings(builtin_openings()).unwrap_or_else(|e| {
        warn!(error = %e, "built-in opening book is invalid");
        OpeningBook::default()
    })
}

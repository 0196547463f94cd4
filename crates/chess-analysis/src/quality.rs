//! Move quality classification and accuracy.

use std::fmt;

use chess_core::Color;
use chess_game::RecordedMove;
use chess_openings::{Opening, OpeningMatcher};
use serde::{Deserialize, Serialize};

use crate::config::BookLookup;
use crate::evaluation::PositionAnalysis;

/// Loss at or above which a move is a blunder.
pub const BLUNDER_THRESHOLD: i32 = 240;
/// Loss at or above which a move is a mistake.
pub const MISTAKE_THRESHOLD: i32 = 130;
/// Loss at or above which a move is an inaccuracy.
pub const INACCURACY_THRESHOLD: i32 = 70;
/// Loss at or below which a move is still excellent.
pub const EXCELLENT_THRESHOLD: i32 = 20;

/// Accuracy points lost per centipawn of average loss.
const ACCURACY_PER_CP: f64 = 0.12;

/// Classification of move quality.
///
/// Variants are listed in precedence order: a move is checked against the
/// opening book, then against the engine's first and second choices, and
/// only then graded by how much evaluation it gave away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveQuality {
    /// Leads to a known opening position
    Book,
    /// The engine's first choice
    Best,
    /// The engine's second choice, or a loss of at most 20 centipawns
    Excellent,
    /// Small centipawn loss, or no score to judge by
    Good,
    /// Noticeable centipawn loss
    Inaccuracy,
    /// Significant centipawn loss
    Mistake,
    /// Major centipawn loss
    Blunder,
}

impl MoveQuality {
    /// Grades a move by centipawn loss alone.
    pub fn from_loss(loss: i32) -> Self {
        match loss {
            l if l >= BLUNDER_THRESHOLD => MoveQuality::Blunder,
            l if l >= MISTAKE_THRESHOLD => MoveQuality::Mistake,
            l if l >= INACCURACY_THRESHOLD => MoveQuality::Inaccuracy,
            l if l <= EXCELLENT_THRESHOLD => MoveQuality::Excellent,
            _ => MoveQuality::Good,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MoveQuality::Book => "Book Move",
            MoveQuality::Best => "Best Move",
            MoveQuality::Excellent => "Excellent",
            MoveQuality::Good => "Good Move",
            MoveQuality::Inaccuracy => "Inaccuracy",
            MoveQuality::Mistake => "Mistake",
            MoveQuality::Blunder => "Blunder",
        }
    }
}

impl fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// The verdict on one played move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEvaluation {
    /// Zero-based ply index.
    pub ply: usize,
    pub side: Color,
    /// SAN as written in the game.
    pub notation: String,
    pub uci: String,
    pub quality: MoveQuality,
    /// Centipawns the mover gave away, `None` when either score is missing.
    pub loss: Option<i32>,
    /// What the engine preferred in the position before the move.
    pub best_move: Option<String>,
}

/// How much of the mover's advantage a move gave away.
///
/// Scores are from `reference`'s point of view. The result is never
/// negative; improving on the engine's estimate costs nothing.
pub fn move_loss(mover: Color, reference: Color, before: i32, after: i32) -> i32 {
    let swing = if mover == reference {
        before - after
    } else {
        after - before
    };
    swing.max(0)
}

/// Grades moves from consecutive position analyses.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    reference: Color,
}

impl Classifier {
    /// `reference` must match the side the analyses were normalized to.
    pub fn new(reference: Color) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> Color {
        self.reference
    }

    /// Classifies the move played at `ply`.
    ///
    /// `before` and `after` are the analyses of the positions either side of
    /// the move; `in_book` says whether the position after it is a known
    /// opening position.
    pub fn classify(
        &self,
        ply: usize,
        mv: &RecordedMove,
        before: &PositionAnalysis,
        after: &PositionAnalysis,
        in_book: bool,
    ) -> MoveEvaluation {
        let uci = mv.uci();
        let loss = match (
            before.centipawns(self.reference),
            after.centipawns(self.reference),
        ) {
            (Some(b), Some(a)) => Some(move_loss(mv.side, self.reference, b, a)),
            _ => None,
        };

        let quality = if in_book {
            MoveQuality::Book
        } else if before.best_move.as_deref() == Some(uci.as_str()) {
            MoveQuality::Best
        } else if before.second_best.as_deref() == Some(uci.as_str()) {
            MoveQuality::Excellent
        } else {
            loss.map_or(MoveQuality::Good, MoveQuality::from_loss)
        };

        MoveEvaluation {
            ply,
            side: mv.side,
            notation: mv.notation.clone(),
            uci,
            quality,
            loss,
            best_move: before.best_move.clone(),
        }
    }
}

/// Decides which plies of a game are still book moves.
///
/// With [`BookLookup::FreezeOnFirstMiss`] the first position the book does
/// not know ends the opening for the rest of the game.
pub struct BookTracker<M> {
    matcher: M,
    ply_limit: usize,
    policy: BookLookup,
    frozen: bool,
    deepest: Option<Opening>,
}

impl<M: OpeningMatcher> BookTracker<M> {
    pub fn new(matcher: M, ply_limit: usize, policy: BookLookup) -> Self {
        Self {
            matcher,
            ply_limit,
            policy,
            frozen: false,
            deepest: None,
        }
    }

    /// Whether the move at `ply`, leading to `fen_after`, is a book move.
    pub fn is_book(&mut self, ply: usize, fen_after: &str) -> bool {
        if self.frozen || ply >= self.ply_limit {
            return false;
        }
        match self.matcher.find_opening(fen_after) {
            Some(opening) => {
                self.deepest = Some(opening.clone());
                true
            }
            None => {
                if self.policy == BookLookup::FreezeOnFirstMiss {
                    self.frozen = true;
                }
                false
            }
        }
    }

    /// The opening of the last book position seen.
    pub fn into_opening(self) -> Option<Opening> {
        self.deepest
    }
}

/// Averages losses into a 0-100 accuracy, one decimal place.
///
/// A missing loss counts as zero. No moves at all scores 100.
pub fn accuracy(losses: &[Option<i32>]) -> f64 {
    if losses.is_empty() {
        return 100.0;
    }
    let total: f64 = losses.iter().map(|l| f64::from(l.unwrap_or(0))).sum();
    let average = total / losses.len() as f64;
    let raw = (100.0 - ACCURACY_PER_CP * average).clamp(0.0, 100.0);
    (raw * 10.0).round() / 10.0
}

/// Statistics for one side's moves in a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub total_moves: u32,
    pub book_moves: u32,
    pub best_moves: u32,
    pub excellent_moves: u32,
    pub good_moves: u32,
    pub inaccuracies: u32,
    pub mistakes: u32,
    pub blunders: u32,
    /// Mean loss over moves with a score
    pub average_loss: f64,
    /// Accuracy percentage (0-100)
    pub accuracy: f64,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            total_moves: 0,
            book_moves: 0,
            best_moves: 0,
            excellent_moves: 0,
            good_moves: 0,
            inaccuracies: 0,
            mistakes: 0,
            blunders: 0,
            average_loss: 0.0,
            accuracy: 100.0,
        }
    }
}

impl PlayerStats {
    /// Aggregates the moves made by `side`.
    pub fn for_side<'a>(side: Color, moves: impl IntoIterator<Item = &'a MoveEvaluation>) -> Self {
        let mut stats = Self::default();
        let mut losses = Vec::new();
        for mv in moves.into_iter().filter(|m| m.side == side) {
            stats.total_moves += 1;
            match mv.quality {
                MoveQuality::Book => stats.book_moves += 1,
                MoveQuality::Best => stats.best_moves += 1,
                MoveQuality::Excellent => stats.excellent_moves += 1,
                MoveQuality::Good => stats.good_moves += 1,
                MoveQuality::Inaccuracy => stats.inaccuracies += 1,
                MoveQuality::Mistake => stats.mistakes += 1,
                MoveQuality::Blunder => stats.blunders += 1,
            }
            losses.push(mv.loss);
        }

        let scored: Vec<i32> = losses.iter().flatten().copied().collect();
        if !scored.is_empty() {
            let sum: f64 = scored.iter().map(|&l| f64::from(l)).sum();
            stats.average_loss = (sum / scored.len() as f64 * 10.0).round() / 10.0;
        }
        stats.accuracy = accuracy(&losses);
        stats
    }
}

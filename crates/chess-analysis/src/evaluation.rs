//! Chess position evaluation types.

use chess_core::Color;
use serde::{Deserialize, Serialize};
use uci::Score;

/// Centipawn value a forced mate is worth before subtracting its distance.
pub const MATE_VALUE: i32 = 10_000;

/// Represents a chess position evaluation.
///
/// Evaluations can be either centipawn scores (for normal positions)
/// or mate scores (when a forced mate is found). The side the numbers are
/// relative to depends on context: engine output is relative to the side to
/// move, [`PositionAnalysis`] stores them relative to a fixed reference side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// Centipawn evaluation (positive = advantage)
    Centipawns(i32),
    /// Mate in N moves (positive = delivering mate, negative = being mated)
    Mate(i32),
}

impl Evaluation {
    /// Re-expresses a score given from `side`'s point of view from
    /// `reference`'s point of view instead.
    ///
    /// Applying it twice with the sides swapped yields the original score.
    #[must_use]
    pub fn from_perspective(self, side: Color, reference: Color) -> Self {
        if side == reference {
            return self;
        }
        match self {
            Evaluation::Centipawns(cp) => Evaluation::Centipawns(-cp),
            Evaluation::Mate(n) => Evaluation::Mate(-n),
        }
    }

    /// Converts to a single centipawn scale where mates dominate every
    /// material score and shorter mates score higher.
    ///
    /// `Mate(0)` carries no sign; callers that know who is mated should use
    /// [`PositionAnalysis::centipawns`] instead.
    pub fn to_centipawns(self) -> i32 {
        match self {
            Evaluation::Centipawns(cp) => cp,
            Evaluation::Mate(n) if n >= 0 => MATE_VALUE - n,
            Evaluation::Mate(n) => -(MATE_VALUE + n),
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Evaluation::Mate(_))
    }
}

impl From<Score> for Evaluation {
    fn from(score: Score) -> Self {
        match score {
            Score::Cp(cp) => Evaluation::Centipawns(cp),
            Score::Mate(n) => Evaluation::Mate(n),
        }
    }
}

/// The engine's verdict on one position of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionAnalysis {
    pub fen: String,
    pub side_to_move: Color,
    /// Score relative to the reference side, `None` when the engine gave none.
    pub evaluation: Option<Evaluation>,
    /// Best move in UCI notation, `None` at terminal positions.
    pub best_move: Option<String>,
    pub second_best: Option<String>,
    pub depth: u32,
}

impl PositionAnalysis {
    /// An analysis with no engine output, used when a search yields nothing.
    pub fn unevaluated(fen: impl Into<String>, side_to_move: Color) -> Self {
        Self {
            fen: fen.into(),
            side_to_move,
            evaluation: None,
            best_move: None,
            second_best: None,
            depth: 0,
        }
    }

    /// Centipawn score, if the evaluation is not a mate.
    pub fn cp(&self) -> Option<i32> {
        match self.evaluation? {
            Evaluation::Centipawns(cp) => Some(cp),
            Evaluation::Mate(_) => None,
        }
    }

    /// Mate distance, if the evaluation is a mate.
    pub fn mate(&self) -> Option<i32> {
        match self.evaluation? {
            Evaluation::Mate(n) => Some(n),
            Evaluation::Centipawns(_) => None,
        }
    }

    /// The score on a single centipawn scale from `reference`'s point of view.
    ///
    /// `reference` must be the side the analysis was normalized to.
    pub fn centipawns(&self, reference: Color) -> Option<i32> {
        match self.evaluation? {
            // The side to move has been mated.
            Evaluation::Mate(0) if self.side_to_move == reference => Some(-MATE_VALUE),
            Evaluation::Mate(0) => Some(MATE_VALUE),
            eval => Some(eval.to_centipawns()),
        }
    }
}

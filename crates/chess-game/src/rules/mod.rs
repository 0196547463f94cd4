//! Rules oracle abstraction.
//!
//! The game state machine never decides legality itself. It asks a
//! [`RulesOracle`] and trusts the answer, so a different rule set (or a test
//! double) can be plugged in without touching the state machine.

mod standard;

pub use standard::StandardRules;

use chess_core::{Color, Move, Piece, Position, Square};
use serde::{Deserialize, Serialize};

/// Reason for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    /// Stalemate - no legal moves but not in check.
    Stalemate,
    /// Insufficient material to checkmate.
    InsufficientMaterial,
    /// 50-move rule (100 half-moves without pawn move or capture).
    FiftyMoveRule,
    /// The same position occurred for the third time.
    ThreefoldRepetition,
}

/// Side facts about an applied move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MoveFlags {
    pub capture: bool,
    pub castle: bool,
    pub en_passant: bool,
    pub promotion: Option<Piece>,
    pub check: bool,
    pub checkmate: bool,
}

/// The result of a legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// The move as actually played, with any promotion resolved.
    pub mv: Move,
    /// The position after the move.
    pub position: Position,
    /// Standard algebraic notation, including a `+`/`#` suffix.
    pub san: String,
    pub flags: MoveFlags,
}

/// Trait for the external rules engine consulted by the game state machine.
pub trait RulesOracle {
    /// Returns every square the piece on `from` may legally move to.
    ///
    /// Empty when the square is empty, holds a piece of the side not to move,
    /// or the piece has no legal moves.
    fn legal_destinations(&self, position: &Position, from: Square) -> Vec<Square>;

    /// Validates and plays a move, returning `None` if it is illegal.
    ///
    /// A pawn reaching the last rank without a promotion hint promotes to a queen.
    fn apply_move(
        &self,
        position: &Position,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Option<AppliedMove>;

    /// Returns true if the side to move is in check.
    fn is_check(&self, position: &Position) -> bool;

    /// Returns true if the side to move is checkmated.
    fn is_checkmate(&self, position: &Position) -> bool;

    /// Returns the draw condition holding in this single position, if any.
    ///
    /// Repetition needs history and is tracked by the game state, not here.
    fn draw_reason(&self, position: &Position) -> Option<DrawReason>;

    /// Returns true if the position is drawn on its own.
    fn is_draw(&self, position: &Position) -> bool {
        self.draw_reason(position).is_some()
    }

    /// Returns the side to move.
    fn side_to_move(&self, position: &Position) -> Color {
        position.side_to_move()
    }
}

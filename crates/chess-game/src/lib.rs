//! Chess game state machine, rules oracle, and game-record parsing.
//!
//! This crate provides:
//! - [`RulesOracle`] - the seam through which the game asks "is this legal?"
//! - [`StandardRules`] - FIDE rules backed by `shakmaty`
//! - [`GameState`] - an immutable game state advanced by [`GameAction`]s
//! - [`parse_game_record`] - PGN text to an ordered list of moves and positions
//!
//! # Example
//!
//! ```
//! use chess_core::Square;
//! use chess_game::{GameAction, GameState, GameStatus, StandardRules};
//!
//! let rules = StandardRules;
//! let e2 = Square::from_algebraic("e2").unwrap();
//! let e4 = Square::from_algebraic("e4").unwrap();
//!
//! let game = GameState::new()
//!     .apply(GameAction::Click(e2), &rules)
//!     .apply(GameAction::Click(e4), &rules);
//!
//! assert_eq!(game.status(), GameStatus::Playing);
//! assert_eq!(game.history()[0].notation, "e4");
//! ```

mod game;
mod record;
pub mod rules;

pub use game::{GameAction, GameState, GameStatus, PlayedMove};
pub use record::{parse_game_record, GameRecord, RecordError, RecordedMove};
pub use rules::{AppliedMove, DrawReason, MoveFlags, RulesOracle, StandardRules};

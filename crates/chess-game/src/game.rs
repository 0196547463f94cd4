//! The live game state machine.
//!
//! A [`GameState`] is a value. [`GameState::apply`] never mutates; it returns
//! the next state, or an equal copy when the action is illegal or irrelevant.
//! Checkmate and draw are absorbing: only [`GameAction::Reset`] leaves them.

use crate::rules::{DrawReason, RulesOracle};
use chess_core::{Board, Color, Piece, Position, Square};
use serde::Serialize;
use tracing::{debug, trace};

/// Overall status of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Playing,
    Check,
    Checkmate,
    Draw,
}

impl GameStatus {
    /// Returns true for checkmate and draw.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Checkmate | GameStatus::Draw)
    }
}

/// One ply of the move history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayedMove {
    pub from: Square,
    pub to: Square,
    /// Standard algebraic notation, e.g. `"Nf3"`, `"exd8=Q+"`.
    pub notation: String,
    /// The side that made the move.
    pub side: Color,
    pub promotion: Option<Piece>,
    /// FEN of the position after the move.
    pub fen_after: String,
}

/// Input to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    /// Select a square holding a piece of the side to move.
    Select(Square),
    /// Select, reselect, deselect, or move depending on the current selection.
    Click(Square),
    /// Move directly from one square to another.
    Move {
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    },
    ClearSelection,
    /// Start a fresh game from the standard position.
    Reset,
}

/// A chess game: position, selection, history and outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameState {
    position: Position,
    selected: Option<Square>,
    legal_targets: Vec<Square>,
    history: Vec<PlayedMove>,
    status: GameStatus,
    winner: Option<Color>,
    loser: Option<Color>,
    in_check: Option<Color>,
    draw_reason: Option<DrawReason>,
    /// Clock-independent keys of every position reached, for repetition.
    #[serde(skip)]
    seen: Vec<String>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl GameState {
    /// Creates a new game in the standard starting position.
    pub fn new() -> Self {
        let position = Position::startpos();
        GameState {
            seen: vec![position.key()],
            position,
            selected: None,
            legal_targets: Vec::new(),
            history: Vec::new(),
            status: GameStatus::Playing,
            winner: None,
            loser: None,
            in_check: None,
            draw_reason: None,
        }
    }

    /// Creates a game from an arbitrary position, deriving its status.
    pub fn from_position<R: RulesOracle + ?Sized>(position: Position, rules: &R) -> Self {
        let state = GameState {
            seen: vec![position.key()],
            position,
            ..GameState::new()
        };
        state.settle(rules)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// The decoded piece grid of the current position.
    pub fn board(&self) -> &Board {
        self.position.board()
    }

    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move()
    }

    pub fn selected(&self) -> Option<Square> {
        self.selected
    }

    /// Legal destinations of the selected piece.
    pub fn legal_targets(&self) -> &[Square] {
        &self.legal_targets
    }

    pub fn history(&self) -> &[PlayedMove] {
        &self.history
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    pub fn loser(&self) -> Option<Color> {
        self.loser
    }

    /// The side currently in check (or mated).
    pub fn in_check(&self) -> Option<Color> {
        self.in_check
    }

    pub fn draw_reason(&self) -> Option<DrawReason> {
        self.draw_reason
    }

    pub fn is_over(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies an action, returning the next state.
    pub fn apply<R: RulesOracle + ?Sized>(&self, action: GameAction, rules: &R) -> GameState {
        if action == GameAction::Reset {
            return GameState::new();
        }
        if self.is_over() {
            trace!(?action, "ignored: game is over");
            return self.clone();
        }

        match action {
            GameAction::Select(square) => self.select(square, rules),
            GameAction::Click(square) => self.click(square, rules),
            GameAction::Move {
                from,
                to,
                promotion,
            } => self.play(from, to, promotion, rules),
            GameAction::ClearSelection => self.with_selection(None, Vec::new()),
            GameAction::Reset => GameState::new(),
        }
    }

    fn owns(&self, square: Square) -> bool {
        self.position
            .board()
            .get(square)
            .is_some_and(|o| o.color == self.side_to_move())
    }

    fn with_selection(&self, selected: Option<Square>, targets: Vec<Square>) -> GameState {
        GameState {
            selected,
            legal_targets: targets,
            ..self.clone()
        }
    }

    fn select<R: RulesOracle + ?Sized>(&self, square: Square, rules: &R) -> GameState {
        if !self.owns(square) {
            return self.clone();
        }
        let targets = rules.legal_destinations(&self.position, square);
        self.with_selection(Some(square), targets)
    }

    fn click<R: RulesOracle + ?Sized>(&self, square: Square, rules: &R) -> GameState {
        match self.selected {
            Some(sel) if sel == square => self.with_selection(None, Vec::new()),
            _ if self.owns(square) => self.select(square, rules),
            Some(sel) if self.legal_targets.contains(&square) => {
                self.play(sel, square, None, rules)
            }
            _ => self.clone(),
        }
    }

    fn play<R: RulesOracle + ?Sized>(
        &self,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
        rules: &R,
    ) -> GameState {
        if !self.owns(from) {
            return self.clone();
        }
        let Some(applied) = rules.apply_move(&self.position, from, to, promotion) else {
            debug!(%from, %to, "illegal move rejected");
            return self.clone();
        };

        let mut history = self.history.clone();
        history.push(PlayedMove {
            from,
            to,
            notation: applied.san,
            side: self.side_to_move(),
            promotion: applied.mv.promotion,
            fen_after: applied.position.fen().to_string(),
        });
        let mut seen = self.seen.clone();
        seen.push(applied.position.key());

        let next = GameState {
            position: applied.position,
            selected: None,
            legal_targets: Vec::new(),
            history,
            status: GameStatus::Playing,
            winner: None,
            loser: None,
            in_check: None,
            draw_reason: None,
            seen,
        };
        next.settle(rules)
    }

    /// Derives status, winner and check from the current position.
    fn settle<R: RulesOracle + ?Sized>(mut self, rules: &R) -> GameState {
        let to_move = rules.side_to_move(&self.position);
        if rules.is_checkmate(&self.position) {
            self.status = GameStatus::Checkmate;
            self.winner = Some(to_move.opposite());
            self.loser = Some(to_move);
            self.in_check = Some(to_move);
        } else if let Some(reason) = rules
            .draw_reason(&self.position)
            .or_else(|| self.repetition())
        {
            self.status = GameStatus::Draw;
            self.draw_reason = Some(reason);
            self.in_check = rules.is_check(&self.position).then_some(to_move);
        } else if rules.is_check(&self.position) {
            self.status = GameStatus::Check;
            self.in_check = Some(to_move);
        } else {
            self.status = GameStatus::Playing;
        }
        if self.status.is_terminal() {
            debug!(status = ?self.status, winner = ?self.winner, "game over");
        }
        self
    }

    fn repetition(&self) -> Option<DrawReason> {
        let current = self.seen.last()?;
        let count = self.seen.iter().filter(|k| *k == current).count();
        (count >= 3).then_some(DrawReason::ThreefoldRepetition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::StandardRules;
    use proptest::prelude::*;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    fn click_move(state: &GameState, from: &str, to: &str) -> GameState {
        state
            .apply(GameAction::Click(sq(from)), &StandardRules)
            .apply(GameAction::Click(sq(to)), &StandardRules)
    }

    #[test]
    fn new_game() {
        let game = GameState::new();
        assert_eq!(game.status(), GameStatus::Playing);
        assert_eq!(game.side_to_move(), Color::White);
        assert!(game.history().is_empty());
        assert_eq!(game.selected(), None);
    }

    #[test]
    fn e4_flips_turn() {
        let game = click_move(&GameState::new(), "e2", "e4");
        assert_eq!(game.status(), GameStatus::Playing);
        assert_eq!(game.history().len(), 1);
        assert_eq!(game.history()[0].notation, "e4");
        assert_eq!(game.history()[0].side, Color::White);
        assert_eq!(game.side_to_move(), Color::Black);
        assert_eq!(game.selected(), None);
        assert!(game.legal_targets().is_empty());
        assert!(game.board().get(sq("e4")).is_some());
        assert!(game.board().get(sq("e2")).is_none());
    }

    #[test]
    fn select_populates_targets() {
        let game = GameState::new().apply(GameAction::Select(sq("b1")), &StandardRules);
        assert_eq!(game.selected(), Some(sq("b1")));
        assert_eq!(game.legal_targets(), &[sq("a3"), sq("c3")]);
    }

    #[test]
    fn select_empty_or_enemy_square_is_noop() {
        let start = GameState::new();
        assert_eq!(start.apply(GameAction::Select(sq("e4")), &StandardRules), start);
        assert_eq!(start.apply(GameAction::Select(sq("e7")), &StandardRules), start);
    }

    #[test]
    fn click_selected_square_clears_selection() {
        let start = GameState::new();
        let selected = start.apply(GameAction::Click(sq("g1")), &StandardRules);
        assert_eq!(selected.selected(), Some(sq("g1")));
        let cleared = selected.apply(GameAction::Click(sq("g1")), &StandardRules);
        assert_eq!(cleared, start);
    }

    #[test]
    fn click_own_piece_reselects() {
        let game = GameState::new()
            .apply(GameAction::Click(sq("g1")), &StandardRules)
            .apply(GameAction::Click(sq("b1")), &StandardRules);
        assert_eq!(game.selected(), Some(sq("b1")));
        assert_eq!(game.legal_targets(), &[sq("a3"), sq("c3")]);
    }

    #[test]
    fn click_non_target_keeps_selection() {
        let selected = GameState::new().apply(GameAction::Click(sq("g1")), &StandardRules);
        let after = selected.apply(GameAction::Click(sq("g4")), &StandardRules);
        assert_eq!(after, selected);
    }

    #[test]
    fn direct_illegal_move_is_noop() {
        let start = GameState::new();
        let action = GameAction::Move {
            from: sq("e2"),
            to: sq("e5"),
            promotion: None,
        };
        assert_eq!(start.apply(action, &StandardRules), start);
    }

    #[test]
    fn fools_mate_is_terminal() {
        let mut game = GameState::new();
        for (from, to) in [("f2", "f3"), ("e7", "e5"), ("g2", "g4"), ("d8", "h4")] {
            game = click_move(&game, from, to);
        }
        assert_eq!(game.status(), GameStatus::Checkmate);
        assert_eq!(game.winner(), Some(Color::Black));
        assert_eq!(game.loser(), Some(Color::White));
        assert_eq!(game.in_check(), Some(Color::White));
        assert_eq!(game.history().last().unwrap().notation, "Qh4#");

        // Absorbing: every non-reset action leaves the state unchanged.
        for action in [
            GameAction::Select(sq("e1")),
            GameAction::Click(sq("a2")),
            GameAction::ClearSelection,
            GameAction::Move {
                from: sq("a2"),
                to: sq("a3"),
                promotion: None,
            },
        ] {
            assert_eq!(game.apply(action, &StandardRules), game);
        }
        assert_eq!(game.apply(GameAction::Reset, &StandardRules), GameState::new());
    }

    #[test]
    fn check_status() {
        let mut game = GameState::new();
        for (from, to) in [("e2", "e4"), ("f7", "f6"), ("d1", "h5")] {
            game = click_move(&game, from, to);
        }
        assert_eq!(game.status(), GameStatus::Check);
        assert_eq!(game.in_check(), Some(Color::Black));
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn stalemate_from_position() {
        let pos = Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let game = GameState::from_position(pos, &StandardRules);
        assert_eq!(game.status(), GameStatus::Draw);
        assert_eq!(game.draw_reason(), Some(DrawReason::Stalemate));
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn stalemating_move_draws() {
        let pos = Position::from_fen("7k/8/5QK1/8/8/8/8/8 w - - 0 1").unwrap();
        let game = GameState::from_position(pos, &StandardRules);
        let game = click_move(&game, "f6", "f7");
        assert_eq!(game.status(), GameStatus::Draw);
        assert_eq!(game.draw_reason(), Some(DrawReason::Stalemate));
        assert_eq!(game.in_check(), None);
    }

    #[test]
    fn threefold_repetition() {
        let mut game = GameState::new();
        let shuffle = [("g1", "f3"), ("g8", "f6"), ("f3", "g1"), ("f6", "g8")];
        for (from, to) in shuffle.iter().chain(shuffle.iter()) {
            assert!(!game.is_over());
            game = click_move(&game, from, to);
        }
        assert_eq!(game.status(), GameStatus::Draw);
        assert_eq!(game.draw_reason(), Some(DrawReason::ThreefoldRepetition));
        assert_eq!(game.history().len(), 8);
    }

    #[test]
    fn promotion_through_click_defaults_to_queen() {
        let pos = Position::from_fen("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let game = GameState::from_position(pos, &StandardRules);
        let game = click_move(&game, "a7", "a8");
        assert_eq!(game.history()[0].promotion, Some(Piece::Queen));
        let a8 = game.board().get(sq("a8")).unwrap();
        assert_eq!(a8.piece, Piece::Queen);
    }

    fn arb_action() -> impl Strategy<Value = GameAction> {
        let square = (0u8..64).prop_map(|i| Square::from_index(i).unwrap());
        prop_oneof![
            square.clone().prop_map(GameAction::Select),
            square.clone().prop_map(GameAction::Click),
            (square.clone(), square).prop_map(|(from, to)| GameAction::Move {
                from,
                to,
                promotion: None
            }),
            Just(GameAction::ClearSelection),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Whatever happens, history grows by at most one ply per action and
        /// a rejected move never touches position or history.
        #[test]
        fn actions_advance_at_most_one_ply(actions in proptest::collection::vec(arb_action(), 1..40)) {
            let mut game = GameState::new();
            for action in actions {
                let next = game.apply(action, &StandardRules);
                let grew = next.history().len() - game.history().len();
                prop_assert!(grew <= 1);
                if grew == 0 {
                    prop_assert_eq!(next.position(), game.position());
                    prop_assert_eq!(next.status(), game.status());
                } else {
                    prop_assert_ne!(next.side_to_move(), game.side_to_move());
                    prop_assert_eq!(next.selected(), None);
                }
                if game.is_over() {
                    prop_assert_eq!(&next, &game);
                }
                game = next;
            }
        }
    }
}

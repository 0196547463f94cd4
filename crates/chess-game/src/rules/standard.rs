//! Standard chess rules implementation backed by `shakmaty`.

use super::{AppliedMove, DrawReason, MoveFlags, RulesOracle};
use chess_core::{Move, Piece, Position, Square};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position as _};
use tracing::debug;

/// Standard chess rules (FIDE).
///
/// Stateless: every call decodes the position's FEN, so the FEN string stays
/// the single source of truth.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    /// Builds a `shakmaty` position from a FEN string.
    ///
    /// Returns `None` for syntactically valid but unplayable positions
    /// (missing kings, side not to move in check, ...).
    pub fn setup(fen: &str) -> Option<Chess> {
        let parsed: Fen = match fen.parse() {
            Ok(f) => f,
            Err(e) => {
                debug!(fen, error = %e, "rejected FEN");
                return None;
            }
        };
        match parsed.into_position::<Chess>(CastlingMode::Standard) {
            Ok(pos) => Some(pos),
            Err(e) => {
                debug!(fen, error = %e, "unplayable position");
                None
            }
        }
    }

    /// Encodes a `shakmaty` position as our [`Position`].
    pub fn encode(pos: &Chess) -> Option<Position> {
        let fen = Fen::from_position(pos, EnPassantMode::Legal).to_string();
        Position::from_fen(&fen).ok()
    }

    /// Converts a `shakmaty` move to coordinate form (castling as king move).
    pub fn to_core_move(m: &shakmaty::Move) -> Option<Move> {
        Move::from_uci(&m.to_uci(CastlingMode::Standard).to_string())
    }

    /// Finds the legal move matching a coordinate move.
    ///
    /// Promotions without a piece resolve to a queen.
    pub fn find_move(
        pos: &Chess,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Option<shakmaty::Move> {
        let wanted = promotion.unwrap_or(Piece::Queen);
        pos.legal_moves()
            .into_iter()
            .find(|m| match Self::to_core_move(m) {
                Some(core) if core.from == from && core.to == to => {
                    core.promotion.map_or(true, |p| p == wanted)
                }
                _ => false,
            })
    }

    /// Plays a legal `shakmaty` move, returning the SAN with check suffix.
    pub fn play(pos: &Chess, m: shakmaty::Move) -> (Chess, String, MoveFlags) {
        let san = San::from_move(pos, m.clone());
        let mut flags = MoveFlags {
            capture: m.is_capture(),
            castle: m.is_castle(),
            en_passant: m.is_en_passant(),
            promotion: Self::to_core_move(&m).and_then(|c| c.promotion),
            ..MoveFlags::default()
        };

        let mut next = pos.clone();
        next.play_unchecked(m);

        let mut notation = san.to_string();
        if next.is_checkmate() {
            flags.check = true;
            flags.checkmate = true;
            notation.push('#');
        } else if next.is_check() {
            flags.check = true;
            notation.push('+');
        }
        (next, notation, flags)
    }
}

impl RulesOracle for StandardRules {
    fn legal_destinations(&self, position: &Position, from: Square) -> Vec<Square> {
        let Some(pos) = Self::setup(position.fen()) else {
            return Vec::new();
        };
        let mut targets: Vec<Square> = pos
            .legal_moves()
            .iter()
            .filter_map(Self::to_core_move)
            .filter(|m| m.from == from)
            .map(|m| m.to)
            .collect();
        targets.sort();
        targets.dedup();
        targets
    }

    fn apply_move(
        &self,
        position: &Position,
        from: Square,
        to: Square,
        promotion: Option<Piece>,
    ) -> Option<AppliedMove> {
        let pos = Self::setup(position.fen())?;
        let m = Self::find_move(&pos, from, to, promotion)?;
        let mv = Self::to_core_move(&m)?;
        let (next, san, flags) = Self::play(&pos, m);
        Some(AppliedMove {
            mv,
            position: Self::encode(&next)?,
            san,
            flags,
        })
    }

    fn is_check(&self, position: &Position) -> bool {
        Self::setup(position.fen()).is_some_and(|p| p.is_check())
    }

    fn is_checkmate(&self, position: &Position) -> bool {
        Self::setup(position.fen()).is_some_and(|p| p.is_checkmate())
    }

    fn draw_reason(&self, position: &Position) -> Option<DrawReason> {
        let pos = Self::setup(position.fen())?;
        if pos.is_stalemate() {
            Some(DrawReason::Stalemate)
        } else if pos.is_insufficient_material() {
            Some(DrawReason::InsufficientMaterial)
        } else if pos.halfmoves() >= 100 && !pos.is_checkmate() {
            Some(DrawReason::FiftyMoveRule)
        } else {
            None
        }
    }
}

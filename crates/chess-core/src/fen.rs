//! FEN parsing and the [`Position`] exchange type.

use crate::board::Board;
use crate::color::Color;
use crate::square::Square;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors that can occur when parsing FEN strings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FenError {
    #[error("invalid FEN: expected 6 parts, got {0}")]
    InvalidPartCount(usize),

    #[error("invalid piece placement: {0}")]
    InvalidPiecePlacement(String),

    #[error("invalid active color: expected 'w' or 'b', got '{0}'")]
    InvalidActiveColor(String),

    #[error("invalid castling rights: {0}")]
    InvalidCastlingRights(String),

    #[error("invalid en passant square: {0}")]
    InvalidEnPassantSquare(String),

    #[error("invalid halfmove clock: {0}")]
    InvalidHalfmoveClock(String),

    #[error("invalid fullmove number: {0}")]
    InvalidFullmoveNumber(String),
}

/// The six fields of a FEN string, syntactically validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenParser {
    pub piece_placement: String,
    pub active_color: Color,
    pub castling: String,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl FenParser {
    /// The standard starting position FEN.
    pub const STARTPOS: &'static str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    /// Parses a FEN string.
    ///
    /// The clocks may be omitted, in which case they default to `0 1`.
    pub fn parse(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(FenError::InvalidPartCount(parts.len()));
        }

        let piece_placement = parts[0];
        Board::decode_placement(piece_placement)?;

        let active_color = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::InvalidActiveColor(other.to_string())),
        };

        let castling = parts[2];
        Self::validate_castling(castling)?;

        let en_passant = Self::parse_en_passant(parts[3])?;

        let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
            let half = parts[4]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidHalfmoveClock(parts[4].to_string()))?;
            let full = parts[5]
                .parse::<u32>()
                .map_err(|_| FenError::InvalidFullmoveNumber(parts[5].to_string()))?;
            (half, full)
        } else {
            (0, 1)
        };

        Ok(FenParser {
            piece_placement: piece_placement.to_string(),
            active_color,
            castling: castling.to_string(),
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    fn validate_castling(castling: &str) -> Result<(), FenError> {
        if castling == "-" {
            return Ok(());
        }
        if castling.is_empty() || castling.len() > 4 {
            return Err(FenError::InvalidCastlingRights(castling.to_string()));
        }
        let mut seen = [false; 4];
        for c in castling.chars() {
            let idx = match c {
                'K' => 0,
                'Q' => 1,
                'k' => 2,
                'q' => 3,
                _ => return Err(FenError::InvalidCastlingRights(castling.to_string())),
            };
            if seen[idx] {
                return Err(FenError::InvalidCastlingRights(castling.to_string()));
            }
            seen[idx] = true;
        }
        Ok(())
    }

    fn parse_en_passant(field: &str) -> Result<Option<Square>, FenError> {
        if field == "-" {
            return Ok(None);
        }
        match Square::from_algebraic(field) {
            Some(sq) if matches!(sq.rank().to_char(), '3' | '6') => Ok(Some(sq)),
            _ => Err(FenError::InvalidEnPassantSquare(field.to_string())),
        }
    }

    /// Re-assembles the six FEN fields.
    pub fn to_fen(&self) -> String {
        let ep = self
            .en_passant
            .map_or_else(|| "-".to_string(), |sq| sq.to_algebraic());
        format!(
            "{} {} {} {} {} {}",
            self.piece_placement,
            self.active_color.to_fen_char(),
            self.castling,
            ep,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}

/// Returns the first four FEN fields (placement, side, castling, en passant).
///
/// Two positions with the same key are the same position for repetition and
/// opening-book purposes regardless of move clocks.
pub fn position_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// A chess position: the FEN exchange string plus its decoded grid.
///
/// The FEN string is the source of truth. The grid is always decoded from it,
/// so the two cannot drift apart.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Position {
    fen: String,
    board: Board,
    side_to_move: Color,
}

impl Position {
    /// Decodes a position from a FEN string.
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parsed = FenParser::parse(fen)?;
        let board = Board::decode_placement(&parsed.piece_placement)?;
        Ok(Position {
            fen: parsed.to_fen(),
            board,
            side_to_move: parsed.active_color,
        })
    }

    /// The standard starting position.
    pub fn startpos() -> Self {
        Position {
            fen: FenParser::STARTPOS.to_string(),
            board: Board::decode_placement("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR")
                .unwrap_or_default(),
            side_to_move: Color::White,
        }
    }

    /// The canonical FEN string.
    pub fn fen(&self) -> &str {
        &self.fen
    }

    /// The decoded piece grid.
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    /// The clock-independent identity of this position.
    pub fn key(&self) -> String {
        position_key(&self.fen)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.fen)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fen)
    }
}

impl std::str::FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.fen)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Position::from_fen(&s).map_err(serde::de::Error::custom)
    }
}

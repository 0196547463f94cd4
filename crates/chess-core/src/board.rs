//! The 8x8 piece grid and its FEN placement codec.

use crate::color::Color;
use crate::fen::FenError;
use crate::piece::Piece;
use crate::square::Square;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A piece standing on a square, together with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occupant {
    pub piece: Piece,
    pub color: Color,
}

impl Occupant {
    pub const fn new(piece: Piece, color: Color) -> Self {
        Occupant { piece, color }
    }
}

/// An 8x8 grid of optional occupants.
///
/// Rows follow FEN reading order: row 0 is rank 8, row 7 is rank 1.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Board {
    grid: [[Option<Occupant>; 8]; 8],
}

impl Board {
    /// Creates an empty board.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the occupant of a square, if any.
    #[inline]
    pub fn get(&self, square: Square) -> Option<Occupant> {
        self.grid[square.row()][square.col()]
    }

    /// Places (or removes, with `None`) an occupant on a square.
    #[inline]
    pub fn set(&mut self, square: Square, occupant: Option<Occupant>) {
        self.grid[square.row()][square.col()] = occupant;
    }

    /// Returns the raw grid rows.
    pub fn rows(&self) -> &[[Option<Occupant>; 8]; 8] {
        &self.grid
    }

    /// Iterates over every occupied square.
    pub fn occupied(&self) -> impl Iterator<Item = (Square, Occupant)> + '_ {
        Square::all().filter_map(move |sq| self.get(sq).map(|o| (sq, o)))
    }

    /// Decodes the piece-placement field of a FEN string.
    pub fn decode_placement(placement: &str) -> Result<Self, FenError> {
        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::InvalidPiecePlacement(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }

        let mut board = Board::empty();
        for (row, rank) in ranks.iter().enumerate() {
            let mut col = 0usize;
            for c in rank.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if skip == 0 || skip > 8 {
                        return Err(FenError::InvalidPiecePlacement(format!(
                            "invalid empty count '{}' in rank {}",
                            c,
                            8 - row
                        )));
                    }
                    col += skip as usize;
                } else if let Some((piece, color)) = Piece::from_fen_char(c) {
                    if col >= 8 {
                        return Err(FenError::InvalidPiecePlacement(format!(
                            "rank {} overflows",
                            8 - row
                        )));
                    }
                    board.grid[row][col] = Some(Occupant::new(piece, color));
                    col += 1;
                } else {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "invalid character '{}' in rank {}",
                        c,
                        8 - row
                    )));
                }
                if col > 8 {
                    return Err(FenError::InvalidPiecePlacement(format!(
                        "rank {} overflows",
                        8 - row
                    )));
                }
            }
            if col != 8 {
                return Err(FenError::InvalidPiecePlacement(format!(
                    "rank {} has {} squares, expected 8",
                    8 - row,
                    col
                )));
            }
        }
        Ok(board)
    }

    /// Encodes the grid as a FEN piece-placement field.
    pub fn encode_placement(&self) -> String {
        let mut out = String::with_capacity(64);
        for (row, cells) in self.grid.iter().enumerate() {
            if row > 0 {
                out.push('/');
            }
            let mut empty = 0u8;
            for cell in cells {
                match cell {
                    Some(o) => {
                        if empty > 0 {
                            out.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        out.push(o.piece.to_fen_char(o.color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push((b'0' + empty) as char);
            }
        }
        out
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({})", self.encode_placement())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.grid.iter().enumerate() {
            write!(f, "{} ", 8 - row)?;
            for cell in cells {
                let c = cell.map_or('.', |o| o.piece.to_fen_char(o.color));
                write!(f, "{} ", c)?;
            }
            writeln!(f)?;
        }
        write!(f, "  a b c d e f g h")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

    #[test]
    fn decode_start_placement() {
        let board = Board::decode_placement(START).unwrap();
        let e1 = Square::from_algebraic("e1").unwrap();
        let d8 = Square::from_algebraic("d8").unwrap();
        let e4 = Square::from_algebraic("e4").unwrap();
        assert_eq!(board.get(e1), Some(Occupant::new(Piece::King, Color::White)));
        assert_eq!(board.get(d8), Some(Occupant::new(Piece::Queen, Color::Black)));
        assert_eq!(board.get(e4), None);
        assert_eq!(board.occupied().count(), 32);
    }

    #[test]
    fn encode_start_placement() {
        let board = Board::decode_placement(START).unwrap();
        assert_eq!(board.encode_placement(), START);
    }

    #[test]
    fn empty_board_placement() {
        assert_eq!(Board::empty().encode_placement(), "8/8/8/8/8/8/8/8");
    }

    #[test]
    fn rejects_malformed_placements() {
        assert!(Board::decode_placement("8/8/8/8/8/8/8").is_err());
        assert!(Board::decode_placement("9/8/8/8/8/8/8/8").is_err());
        assert!(Board::decode_placement("ppppppppp/8/8/8/8/8/8/8").is_err());
        assert!(Board::decode_placement("7/8/8/8/8/8/8/8").is_err());
        assert!(Board::decode_placement("x7/8/8/8/8/8/8/8").is_err());
        assert!(Board::decode_placement("0pppppppp/8/8/8/8/8/8/8").is_err());
    }

    fn arb_cell() -> impl Strategy<Value = Option<Occupant>> {
        prop_oneof![
            2 => Just(None),
            1 => (0usize..6, any::<bool>()).prop_map(|(p, white)| {
                let color = if white { Color::White } else { Color::Black };
                Some(Occupant::new(Piece::ALL[p], color))
            }),
        ]
    }

    proptest! {
        #[test]
        fn placement_round_trip(cells in proptest::collection::vec(arb_cell(), 64)) {
            let mut board = Board::empty();
            for (i, cell) in cells.into_iter().enumerate() {
                board.grid[i / 8][i % 8] = cell;
            }
            let encoded = board.encode_placement();
            let decoded = Board::decode_placement(&encoded).unwrap();
            prop_assert_eq!(decoded, board);
        }
    }
}

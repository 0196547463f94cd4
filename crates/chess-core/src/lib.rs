//! Core types for chess.
//!
//! This crate provides the fundamental types shared by the game state machine
//! and the analysis pipeline:
//! - [`Piece`] and [`Color`] for piece representation
//! - [`Square`], [`File`], and [`Rank`] for board coordinates
//! - [`Move`] for coordinate (UCI) moves
//! - [`Board`] and [`Position`], the FEN codec that keeps an 8x8 grid and its
//!   exchange string consistent

mod board;
mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use board::{Board, Occupant};
pub use color::Color;
pub use fen::{position_key, FenError, FenParser, Position};
pub use mov::Move;
pub use piece::Piece;
pub use square::{File, Rank, Square};

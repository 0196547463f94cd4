//! Game-record (PGN) parsing.
//!
//! Turns PGN text into the ordered move list and the position before and
//! after every ply. Only the mainline of the first game is read; variations
//! are skipped.

use crate::rules::StandardRules;
use chess_core::{Color, Piece, Position, Square};
use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use serde::Serialize;
use shakmaty::san::San;
use shakmaty::{Chess, Position as _};
use std::io;
use std::ops::ControlFlow;
use thiserror::Error;

/// Errors that can occur while reading a game record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("no moves found in record")]
    Empty,

    #[error("invalid FEN tag: {0}")]
    InvalidFen(String),

    /// `ply` counts from 0, like the move indices of a review.
    #[error("invalid move '{san}' at ply {ply}")]
    IllegalMove { ply: usize, san: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// One ply of a parsed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Piece>,
    /// SAN as written in the record, e.g. `"Nxe5+"`.
    pub notation: String,
    pub side: Color,
}

impl RecordedMove {
    /// The move in UCI coordinate form.
    pub fn uci(&self) -> String {
        chess_core::Move {
            from: self.from,
            to: self.to,
            promotion: self.promotion,
        }
        .to_uci()
    }
}

/// A parsed game: moves plus every position from the start to the end.
///
/// `positions().len() == moves().len() + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRecord {
    moves: Vec<RecordedMove>,
    positions: Vec<Position>,
    tags: Vec<(String, String)>,
}

impl GameRecord {
    pub fn moves(&self) -> &[RecordedMove] {
        &self.moves
    }

    /// Positions at ply 0..=N.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Returns the value of a header tag, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// A canonical text for the game, independent of headers, comments,
    /// move numbers and whitespace. Two records describing the same moves
    /// from the same start normalize identically.
    pub fn normalized(&self) -> String {
        let mut out = self
            .positions
            .first()
            .map(|p| p.fen().to_string())
            .unwrap_or_default();
        for mv in &self.moves {
            out.push(' ');
            out.push_str(&mv.uci());
        }
        out
    }
}

/// Parses the first game in `text`.
pub fn parse_game_record(text: &str) -> Result<GameRecord, RecordError> {
    let mut reader = Reader::new(io::Cursor::new(text.as_bytes()));
    let mut visitor = RecordVisitor;
    let record = reader.read_game(&mut visitor)?.ok_or(RecordError::Empty)??;
    if record.moves.is_empty() {
        return Err(RecordError::Empty);
    }
    Ok(record)
}

#[derive(Default)]
struct Tags {
    fen: Option<String>,
    all: Vec<(String, String)>,
}

struct Movetext {
    pos: Chess,
    moves: Vec<RecordedMove>,
    positions: Vec<Position>,
    tags: Vec<(String, String)>,
}

struct RecordVisitor;

impl Visitor for RecordVisitor {
    type Tags = Tags;
    type Movetext = Movetext;
    type Output = Result<GameRecord, RecordError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(Tags::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let key = String::from_utf8_lossy(key).into_owned();
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        if key == "FEN" {
            tags.fen = Some(value.clone());
        }
        tags.all.push((key, value));
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        let (pos, start) = match tags.fen {
            Some(fen) => {
                let setup = StandardRules::setup(&fen)
                    .and_then(|pos| StandardRules::encode(&pos).map(|start| (pos, start)));
                match setup {
                    Some(pair) => pair,
                    None => return ControlFlow::Break(Err(RecordError::InvalidFen(fen))),
                }
            }
            None => (Chess::default(), Position::startpos()),
        };
        ControlFlow::Continue(Movetext {
            pos,
            moves: Vec::new(),
            positions: vec![start],
            tags: tags.all,
        })
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(
        &mut self,
        movetext: &mut Self::Movetext,
        san_plus: SanPlus,
    ) -> ControlFlow<Self::Output> {
        let ply = movetext.moves.len();
        let written = san_plus.to_string();
        let illegal = || RecordError::IllegalMove {
            ply,
            san: written.clone(),
        };

        // Re-parse so the SAN binds to this crate's shakmaty position type.
        let Ok(san) = san_plus.san.to_string().parse::<San>() else {
            return ControlFlow::Break(Err(illegal()));
        };
        let Ok(m) = san.to_move(&movetext.pos) else {
            return ControlFlow::Break(Err(illegal()));
        };
        let Some(core) = StandardRules::to_core_move(&m) else {
            return ControlFlow::Break(Err(illegal()));
        };

        let side = match movetext.pos.turn() {
            shakmaty::Color::White => Color::White,
            shakmaty::Color::Black => Color::Black,
        };
        movetext.pos.play_unchecked(m);
        let Some(after) = StandardRules::encode(&movetext.pos) else {
            return ControlFlow::Break(Err(illegal()));
        };

        movetext.moves.push(RecordedMove {
            from: core.from,
            to: core.to,
            promotion: core.promotion,
            notation: written.clone(),
            side,
        });
        movetext.positions.push(after);
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        Ok(GameRecord {
            moves: movetext.moves,
            positions: movetext.positions,
            tags: movetext.tags,
        })
    }
}

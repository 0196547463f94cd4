//! Whole-game review: parse, evaluate, classify, aggregate.

use chess_core::Color;
use chess_game::{parse_game_record, GameRecord};
use chess_openings::{Opening, OpeningMatcher};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::KeyedCache;
use crate::config::{AnalysisConfig, BookLookup};
use crate::engine::EngineFactory;
use crate::error::AnalysisError;
use crate::evaluation::PositionAnalysis;
use crate::pipeline::{EvaluationPipeline, PipelineOutcome, Progress};
use crate::quality::{BookTracker, Classifier, MoveEvaluation, PlayerStats};

/// The finished review of one game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameReview {
    /// One entry per ply.
    pub moves: Vec<MoveEvaluation>,
    /// One entry per position, starting with the initial one.
    pub positions: Vec<PositionAnalysis>,
    pub white: PlayerStats,
    pub black: PlayerStats,
    /// The deepest opening recognised among the early plies.
    pub opening: Option<Opening>,
}

impl GameReview {
    pub fn stats(&self, side: Color) -> &PlayerStats {
        match side {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

/// How a review attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    Completed(GameReview),
    /// A newer review started first.
    Aborted,
}

/// Reviews games with an [`EvaluationPipeline`] and an opening book.
///
/// Completed reviews are cached by the game's normalized move text, so the
/// same game pasted twice (with different headers or comments) is only
/// analysed once.
pub struct GameReviewer<F, M> {
    pipeline: EvaluationPipeline<F>,
    matcher: M,
    classifier: Classifier,
    book_ply_limit: usize,
    book_lookup: BookLookup,
    reviews: KeyedCache<GameReview>,
}

impl<F: EngineFactory, M: OpeningMatcher> GameReviewer<F, M> {
    pub fn new(pipeline: EvaluationPipeline<F>, matcher: M, config: &AnalysisConfig) -> Self {
        let classifier = Classifier::new(pipeline.settings().reference);
        Self {
            pipeline,
            matcher,
            classifier,
            book_ply_limit: config.book_ply_limit,
            book_lookup: config.book_lookup,
            reviews: KeyedCache::new(),
        }
    }

    pub fn pipeline(&self) -> &EvaluationPipeline<F> {
        &self.pipeline
    }

    /// Parses `text` as a game record and reviews it.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::InvalidRecord`] if the text is not a playable game;
    /// no engine is started in that case.
    pub async fn review_text<P>(
        &self,
        text: &str,
        on_progress: P,
    ) -> Result<ReviewOutcome, AnalysisError>
    where
        P: FnMut(Progress<'_>),
    {
        let record = parse_game_record(text)?;
        self.review(&record, on_progress).await
    }

    /// Reviews a parsed game.
    pub async fn review<P>(
        &self,
        record: &GameRecord,
        on_progress: P,
    ) -> Result<ReviewOutcome, AnalysisError>
    where
        P: FnMut(Progress<'_>),
    {
        let key = record.normalized();
        if let Some(review) = self.reviews.get(&key) {
            debug!(moves = record.moves().len(), "review cache hit");
            // Whatever was running is no longer wanted.
            drop(self.pipeline.registry().begin());
            return Ok(ReviewOutcome::Completed(review));
        }

        let (token, outcome) = self
            .pipeline
            .run_session(record.positions(), on_progress)
            .await?;
        let analyses = match outcome {
            PipelineOutcome::Completed(analyses) => analyses,
            PipelineOutcome::Aborted => return Ok(ReviewOutcome::Aborted),
        };
        // A newer review may have begun after the last position was published.
        let published = token.emit(|| {
            let review = self.assemble(record, analyses);
            self.reviews.insert(key, review.clone());
            review
        });
        Ok(match published {
            Some(review) => ReviewOutcome::Completed(review),
            None => {
                debug!(session = token.id(), "review superseded after analysis");
                ReviewOutcome::Aborted
            }
        })
    }

    /// Classifies every move of `record` given one analysis per position.
    pub fn assemble(&self, record: &GameRecord, positions: Vec<PositionAnalysis>) -> GameReview {
        let mut book = BookTracker::new(&self.matcher, self.book_ply_limit, self.book_lookup);
        let moves: Vec<MoveEvaluation> = record
            .moves()
            .iter()
            .zip(positions.windows(2))
            .enumerate()
            .map(|(ply, (mv, pair))| {
                let in_book = book.is_book(ply, &pair[1].fen);
                self.classifier.classify(ply, mv, &pair[0], &pair[1], in_book)
            })
            .collect();

        GameReview {
            white: PlayerStats::for_side(Color::White, &moves),
            black: PlayerStats::for_side(Color::Black, &moves),
            opening: book.into_opening(),
            moves,
            positions,
        }
    }
}

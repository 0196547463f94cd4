//! Evaluates every position of a game in order with one engine.

use std::sync::Arc;

use chess_core::{Color, Position};
use tracing::{debug, info};

use crate::cache::KeyedCache;
use crate::config::AnalysisConfig;
use crate::engine::{EngineFactory, EngineOptions, EngineSession, SearchLimit};
use crate::error::EngineError;
use crate::evaluation::{Evaluation, PositionAnalysis};
use crate::pv::SearchOutcome;
use crate::session::{SessionRegistry, SessionToken};

/// Search settings shared by every run of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub limit: SearchLimit,
    /// Principal variations per search; two gives best and second-best.
    pub width: u32,
    /// Side every score is reported from.
    pub reference: Color,
    pub options: EngineOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            limit: config.search_limit(),
            width: config.multi_pv.max(1),
            reference: config.reference_side,
            options: config.engine_options(),
        }
    }
}

/// Reported after each position is evaluated.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    pub session: u64,
    /// Positions done so far, including this one.
    pub completed: usize,
    pub total: usize,
    pub analysis: &'a PositionAnalysis,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// One analysis per input position, in order.
    Completed(Vec<PositionAnalysis>),
    /// A newer run started before this one finished.
    Aborted,
}

/// Drives an engine over a list of positions.
///
/// Each run is a session. Starting a run supersedes the previous one: the old
/// run stops its engine, disposes it, and reports [`PipelineOutcome::Aborted`]
/// without publishing anything further. Runs never overlap on an engine; a
/// new run waits until the old one has released its engine.
pub struct EvaluationPipeline<F> {
    factory: F,
    settings: PipelineSettings,
    registry: SessionRegistry,
    cache: Arc<KeyedCache<PositionAnalysis>>,
    lease: tokio::sync::Mutex<()>,
}

impl<F: EngineFactory> EvaluationPipeline<F> {
    pub fn new(factory: F, settings: PipelineSettings) -> Self {
        Self {
            factory,
            settings,
            registry: SessionRegistry::new(),
            cache: Arc::new(KeyedCache::new()),
            lease: tokio::sync::Mutex::new(()),
        }
    }

    /// Shares a position cache with other pipelines.
    pub fn with_cache(mut self, cache: Arc<KeyedCache<PositionAnalysis>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<KeyedCache<PositionAnalysis>> {
        &self.cache
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Evaluates `positions` in order, calling `on_progress` after each one.
    ///
    /// Cached positions skip the engine; the engine is only started once a
    /// position misses the cache.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] if the engine cannot be started or its
    /// transport fails. Supersession is not an error.
    pub async fn run<P>(
        &self,
        positions: &[Position],
        on_progress: P,
    ) -> Result<PipelineOutcome, EngineError>
    where
        P: FnMut(Progress<'_>),
    {
        let (_, outcome) = self.run_session(positions, on_progress).await?;
        Ok(outcome)
    }

    /// Like [`run`](Self::run), also handing back the session token so the
    /// caller can publish derived results under the same session.
    pub(crate) async fn run_session<P>(
        &self,
        positions: &[Position],
        on_progress: P,
    ) -> Result<(SessionToken, PipelineOutcome), EngineError>
    where
        P: FnMut(Progress<'_>),
    {
        let token = self.registry.begin();
        debug!(session = token.id(), positions = positions.len(), "analysis started");

        let _lease = tokio::select! {
            biased;
            _ = token.superseded() => return Ok((token, PipelineOutcome::Aborted)),
            lease = self.lease.lock() => lease,
        };

        let mut engine = None;
        let result = self
            .evaluate_all(&token, positions, &mut engine, on_progress)
            .await;
        if let Some(engine) = engine {
            engine.dispose().await;
        }
        if matches!(result, Ok(PipelineOutcome::Aborted)) {
            info!(session = token.id(), "analysis superseded");
        }
        Ok((token, result?))
    }

    async fn evaluate_all<P>(
        &self,
        token: &SessionToken,
        positions: &[Position],
        engine: &mut Option<EngineSession>,
        mut on_progress: P,
    ) -> Result<PipelineOutcome, EngineError>
    where
        P: FnMut(Progress<'_>),
    {
        let total = positions.len();
        let mut analyses = Vec::with_capacity(total);

        for (index, position) in positions.iter().enumerate() {
            if !token.is_current() {
                return Ok(PipelineOutcome::Aborted);
            }

            let (analysis, fresh) = match self.cache.get(position.fen()) {
                Some(hit) => (hit, false),
                None => {
                    if engine.is_none() {
                        let session = engine.insert(self.factory.create()?);
                        session.configure(self.settings.options.clone()).await?;
                    }
                    let Some(session) = engine.as_ref() else {
                        return Err(EngineError::Closed);
                    };
                    let search = session.evaluate_principal_variations(
                        position.fen(),
                        self.settings.limit,
                        self.settings.width,
                    );
                    let outcome = tokio::select! {
                        biased;
                        _ = token.superseded() => {
                            session.stop().await?;
                            return Ok(PipelineOutcome::Aborted);
                        }
                        outcome = search => outcome?,
                    };
                    let fresh = outcome.is_some();
                    (self.analyse(position, outcome), fresh)
                }
            };

            let published = token.emit(|| {
                if fresh {
                    self.cache.insert(position.fen(), analysis.clone());
                }
            });
            if published.is_none() {
                return Ok(PipelineOutcome::Aborted);
            }
            // Outside the publish lock: the callback may start a new session.
            on_progress(Progress {
                session: token.id(),
                completed: index + 1,
                total,
                analysis: &analysis,
            });
            analyses.push(analysis);
        }

        debug!(session = token.id(), "analysis complete");
        Ok(PipelineOutcome::Completed(analyses))
    }

    /// Turns a side-to-move relative search result into an analysis from
    /// the reference side's point of view.
    fn analyse(&self, position: &Position, outcome: Option<SearchOutcome>) -> PositionAnalysis {
        let side = position.side_to_move();
        let Some(outcome) = outcome else {
            return PositionAnalysis::unevaluated(position.fen(), side);
        };
        PositionAnalysis {
            fen: position.fen().to_string(),
            side_to_move: side,
            evaluation: outcome
                .score
                .map(|score| Evaluation::from(score).from_perspective(side, self.settings.reference)),
            best_move: outcome.best,
            second_best: outcome.second,
            depth: outcome.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uci::Score;

    fn pipeline() -> EvaluationPipeline<impl EngineFactory> {
        EvaluationPipeline::new(
            || -> Result<EngineSession, EngineError> { Err(EngineError::Closed) },
            PipelineSettings::default(),
        )
    }

    #[test]
    fn test_settings_from_config() {
        let config = AnalysisConfig {
            depth: Some(12),
            multi_pv: 3,
            reference_side: Color::Black,
            ..AnalysisConfig::default()
        };
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.limit, SearchLimit::Depth(12));
        assert_eq!(settings.width, 3);
        assert_eq!(settings.reference, Color::Black);
    }

    #[test]
    fn test_analyse_flips_black_to_move() {
        let position =
            Position::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1")
                .unwrap();
        let outcome = SearchOutcome {
            best: Some("e7e5".into()),
            second: Some("c7c5".into()),
            score: Some(Score::Cp(-30)),
            depth: 14,
        };
        let analysis = pipeline().analyse(&position, Some(outcome));
        assert_eq!(analysis.evaluation, Some(Evaluation::Centipawns(30)));
        assert_eq!(analysis.best_move.as_deref(), Some("e7e5"));
        assert_eq!(analysis.second_best.as_deref(), Some("c7c5"));
        assert_eq!(analysis.side_to_move, Color::Black);
    }

    #[test]
    fn test_analyse_without_outcome() {
        let analysis = pipeline().analyse(&Position::startpos(), None);
        assert_eq!(analysis.evaluation, None);
        assert_eq!(analysis.best_move, None);
    }

    #[tokio::test]
    async fn test_empty_input_never_starts_engine() {
        let outcome = pipeline().run(&[], |_| {}).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Completed(Vec::new()));
    }

    #[tokio::test]
    async fn test_factory_error_propagates() {
        let result = pipeline().run(&[Position::startpos()], |_| {}).await;
        assert!(matches!(result, Err(EngineError::Closed)));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_engine() {
        let pipeline = pipeline();
        let start = Position::startpos();
        let mut cached = PositionAnalysis::unevaluated(start.fen(), Color::White);
        cached.evaluation = Some(Evaluation::Centipawns(20));
        pipeline.cache().insert(start.fen(), cached.clone());

        let mut seen = Vec::new();
        let outcome = pipeline
            .run(&[start], |progress| {
                seen.push((progress.completed, progress.total))
            })
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Completed(vec![cached]));
        assert_eq!(seen, vec![(1, 1)]);
    }
}

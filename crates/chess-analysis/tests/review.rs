//! Pipeline and review tests against scripted in-process engines.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess_analysis::{
    AnalysisConfig, AnalysisError, Evaluation, EvaluationPipeline, GameReviewer, MoveQuality,
    PipelineOutcome, PipelineSettings, ReviewOutcome, SearchLimit,
};
use chess_core::Color;
use chess_game::{parse_game_record, RecordError};
use chess_openings::{builtin_book, OpeningBook};
use common::{fast_options, FakeFactory, Reply, Script};

const FOOLS_MATE: &str = "1. f3 e5 2. g4 Qh4# 0-1";
const RUY_LOPEZ: &str = "1. e4 e5 2. Nf3 Nc6 3. Bb5 a6 4. h4";

fn settings() -> PipelineSettings {
    PipelineSettings {
        limit: SearchLimit::MoveTime(50),
        width: 2,
        reference: Color::White,
        options: fast_options(),
    }
}

fn reviewer(factory: FakeFactory) -> GameReviewer<FakeFactory, OpeningBook> {
    let pipeline = EvaluationPipeline::new(factory, settings());
    GameReviewer::new(pipeline, builtin_book(), &AnalysisConfig::default())
}

fn fools_mate_script() -> Script {
    let record = parse_game_record(FOOLS_MATE).unwrap();
    let positions = record.positions();
    Script::default()
        // Black to move with mate in one.
        .on(
            positions[3].fen(),
            Reply::new(
                &[
                    "info depth 1 multipv 1 score mate 1 pv d8h4",
                    "info depth 1 multipv 2 score cp 150 pv f8c5",
                ],
                "d8h4",
            ),
        )
        // White is mated.
        .on(
            positions[4].fen(),
            Reply::new(&["info depth 0 score mate 0"], "(none)"),
        )
}

#[tokio::test]
async fn mate_in_one_is_found_and_graded_best() {
    let reviewer = reviewer(FakeFactory::new(fools_mate_script()));

    let outcome = reviewer.review_text(FOOLS_MATE, |_| {}).await.unwrap();
    let ReviewOutcome::Completed(review) = outcome else {
        panic!("review was aborted");
    };

    assert_eq!(review.positions.len(), 5);
    assert_eq!(review.moves.len(), 4);

    // Normalized to White: Black mating in one is negative.
    let before_mate = &review.positions[3];
    assert_eq!(before_mate.evaluation, Some(Evaluation::Mate(-1)));
    assert_eq!(before_mate.best_move.as_deref(), Some("d8h4"));
    assert_eq!(review.positions[4].best_move, None);

    let mating = &review.moves[3];
    assert_eq!(mating.notation, "Qh4#");
    assert_eq!(mating.side, Color::Black);
    assert_eq!(mating.uci, "d8h4");
    assert_eq!(mating.quality, MoveQuality::Best);
    assert_eq!(mating.loss, Some(0));

    let g4 = &review.moves[2];
    assert_eq!(g4.quality, MoveQuality::Blunder);
    assert_eq!(review.white.blunders, 1);
    assert_eq!(review.white.accuracy, 0.0);
    assert_eq!(review.black.accuracy, 100.0);
    assert!(review.opening.is_none());
}

#[tokio::test]
async fn progress_is_reported_in_order() {
    let reviewer = reviewer(FakeFactory::new(fools_mate_script()));
    let mut seen = Vec::new();

    reviewer
        .review_text(FOOLS_MATE, |progress| {
            seen.push((progress.completed, progress.total, progress.analysis.fen.clone()))
        })
        .await
        .unwrap();

    let record = parse_game_record(FOOLS_MATE).unwrap();
    let expected: Vec<_> = record
        .positions()
        .iter()
        .enumerate()
        .map(|(i, p)| (i + 1, 5, p.fen().to_string()))
        .collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn book_moves_take_precedence_and_name_the_opening() {
    let record = parse_game_record(RUY_LOPEZ).unwrap();
    // The engine agrees with White's third move; book still wins.
    let script = Script::default().on(
        record.positions()[4].fen(),
        Reply::lines("cp 30", "f1b5", "f1c4"),
    );
    let reviewer = reviewer(FakeFactory::new(script));

    let ReviewOutcome::Completed(review) = reviewer.review(&record, |_| {}).await.unwrap() else {
        panic!("review was aborted");
    };

    let qualities: Vec<_> = review.moves.iter().map(|m| m.quality).collect();
    assert_eq!(&qualities[..6], &[MoveQuality::Book; 6]);
    assert_ne!(qualities[6], MoveQuality::Book);
    let opening = review.opening.expect("opening recognised");
    assert_eq!(opening.eco, "C65");
    assert_eq!(review.white.book_moves, 3);
}

#[tokio::test]
async fn invalid_record_never_starts_an_engine() {
    let factory = FakeFactory::new(Script::default());
    let created = Arc::clone(&factory.created);
    let reviewer = reviewer(factory);

    let illegal = reviewer.review_text("1. e4 e5 2. Ke3", |_| {}).await;
    assert!(matches!(
        illegal,
        Err(AnalysisError::InvalidRecord(RecordError::IllegalMove { .. }))
    ));
    let empty = reviewer.review_text("", |_| {}).await;
    assert!(matches!(empty, Err(AnalysisError::InvalidRecord(_))));

    assert_eq!(created.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_review_hits_the_cache() {
    let factory = FakeFactory::new(fools_mate_script());
    let created = Arc::clone(&factory.created);
    let log = factory.log.clone();
    let reviewer = reviewer(factory);

    let first = reviewer.review_text(FOOLS_MATE, |_| {}).await.unwrap();
    let searches = log.count_prefix("0: go");
    // Same moves, different headers and spacing.
    let again = "[Event \"Casual\"]\n\n1. f3  e5\n2. g4 {only move?} Qh4# 0-1";
    let mut progress_calls = 0;
    let second = reviewer
        .review_text(again, |_| progress_calls += 1)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(created.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(log.count_prefix("0: go"), searches);
    assert_eq!(progress_calls, 0);
}

#[tokio::test]
async fn shared_positions_come_from_the_position_cache() {
    let factory = FakeFactory::new(Script::default());
    let log = factory.log.clone();
    let pipeline = EvaluationPipeline::new(factory, settings());

    let first = parse_game_record("1. e4 e5").unwrap();
    let second = parse_game_record("1. e4 c5").unwrap();
    pipeline.run(first.positions(), |_| {}).await.unwrap();
    pipeline.run(second.positions(), |_| {}).await.unwrap();

    // Only the Sicilian position is new the second time round.
    assert_eq!(log.count_prefix("0: go"), 3);
    assert_eq!(log.count_prefix("1: go"), 1);
    assert_eq!(pipeline.cache().len(), 4);
}

#[tokio::test]
async fn newer_session_supersedes_running_one() {
    let factory = FakeFactory::new(Script::default()).holding_first();
    let log = factory.log.clone();
    let pipeline = Arc::new(EvaluationPipeline::new(factory, settings()));
    let progress: Arc<Mutex<Vec<u64>>> = Arc::default();

    let older = parse_game_record("1. e4 e5").unwrap();
    let newer = parse_game_record("1. d4 d5").unwrap();

    let first = tokio::spawn({
        let pipeline = Arc::clone(&pipeline);
        let progress = Arc::clone(&progress);
        async move {
            pipeline
                .run(older.positions(), |p| progress.lock().unwrap().push(p.session))
                .await
        }
    });
    log.wait_for("0: go movetime 50").await;
    let older_session = pipeline.registry().current();

    let progress_newer = Arc::clone(&progress);
    let second = pipeline
        .run(newer.positions(), |p| progress_newer.lock().unwrap().push(p.session))
        .await
        .unwrap();

    assert_eq!(first.await.unwrap().unwrap(), PipelineOutcome::Aborted);
    let PipelineOutcome::Completed(analyses) = second else {
        panic!("newer session aborted");
    };
    assert_eq!(analyses.len(), 3);

    let stop = log.position_of("0: stop").expect("older engine stopped");
    let quit = log.position_of("0: quit").expect("older engine released");
    let next = log.position_of("1: go movetime 50").expect("newer search ran");
    assert!(stop < next && quit < next, "{:?}", log.lines());

    let seen = progress.lock().unwrap().clone();
    assert!(!seen.contains(&older_session));
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn progress_handler_can_start_a_new_session() {
    let pipeline = EvaluationPipeline::new(FakeFactory::new(Script::default()), settings());
    let registry = pipeline.registry().clone();
    let record = parse_game_record("1. e4 e5 2. Nf3").unwrap();
    let mut calls = 0;

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.run(record.positions(), |progress| {
            calls += 1;
            if progress.completed == 1 {
                let _newer = registry.begin();
            }
        }),
    )
    .await
    .expect("run finished")
    .unwrap();

    assert_eq!(outcome, PipelineOutcome::Aborted);
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn review_superseded_after_last_position_is_discarded() {
    let reviewer = reviewer(FakeFactory::new(fools_mate_script()));
    let registry = reviewer.pipeline().registry().clone();

    let outcome = reviewer
        .review_text(FOOLS_MATE, |progress| {
            if progress.completed == progress.total {
                let _newer = registry.begin();
            }
        })
        .await
        .unwrap();
    assert_eq!(outcome, ReviewOutcome::Aborted);

    // The review itself was not cached: the next attempt walks every
    // position again, even though each one now hits the position cache.
    let mut progress_calls = 0;
    let again = reviewer
        .review_text(FOOLS_MATE, |_| progress_calls += 1)
        .await
        .unwrap();
    assert!(matches!(again, ReviewOutcome::Completed(_)));
    assert_eq!(progress_calls, 5);
}

//! game-review - Review a finished game with a UCI engine, or play one
//! against it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chess_analysis::{
    AnalysisConfig, EngineSession, EvaluationPipeline, GameReview, GameReviewer, MoveQuality,
    PipelineSettings, ProcessEngineFactory, ReviewOutcome,
};
use chess_core::{Color, Move};
use chess_game::{GameAction, GameState, GameStatus, StandardRules};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "game-review")]
#[command(about = "Chess game review with a UCI engine")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "review.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a game record in PGN; `-` reads standard input
    Review {
        pgn: PathBuf,
        /// Print the full review as JSON
        #[arg(long)]
        json: bool,
    },
    /// Play against the engine, entering moves like `e2e4`
    Play {
        /// The side you play
        #[arg(long, value_enum, default_value = "white")]
        side: Side,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = AnalysisConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::debug!(engine = %config.engine_path, "configuration loaded");

    match cli.command {
        Commands::Review { pgn, json } => review(&config, &pgn, json).await,
        Commands::Play { side } => play(&config, side.into()).await,
    }
}

async fn review(config: &AnalysisConfig, pgn: &Path, json: bool) -> anyhow::Result<()> {
    let text = if pgn == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        text
    } else {
        tokio::fs::read_to_string(pgn)
            .await
            .with_context(|| format!("reading {}", pgn.display()))?
    };

    let pipeline = EvaluationPipeline::new(
        ProcessEngineFactory::new(&config.engine_path),
        PipelineSettings::from_config(config),
    );
    let book = chess_openings::shared_book(config.opening_book.as_deref());
    let reviewer = GameReviewer::new(pipeline, book, config);

    let outcome = reviewer
        .review_text(&text, |progress| {
            eprint!("\ranalysing position {}/{}", progress.completed, progress.total);
        })
        .await?;
    eprintln!();

    let ReviewOutcome::Completed(review) = outcome else {
        bail!("review was superseded");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&review)?);
    } else {
        print_summary(&review);
    }
    Ok(())
}

fn print_summary(review: &GameReview) {
    if let Some(opening) = &review.opening {
        println!("Opening: {} ({})\n", opening.name, opening.eco);
    }
    for mv in &review.moves {
        let number = mv.ply / 2 + 1;
        let prefix = match mv.side {
            Color::White => format!("{number}."),
            Color::Black => format!("{number}..."),
        };
        let loss = mv.loss.map(|l| format!("-{l}")).unwrap_or_default();
        let best = match (&mv.best_move, mv.quality) {
            (
                Some(best),
                MoveQuality::Inaccuracy | MoveQuality::Mistake | MoveQuality::Blunder,
            ) => format!("  best {best}"),
            _ => String::new(),
        };
        println!(
            "{prefix:>6} {:<8} {:<11} {loss:>6}{best}",
            mv.notation, mv.quality
        );
    }
    println!();
    for side in [Color::White, Color::Black] {
        let stats = review.stats(side);
        println!(
            "{side}: accuracy {:.1}%, average loss {:.1}, {} inaccuracies, {} mistakes, {} blunders",
            stats.accuracy, stats.average_loss, stats.inaccuracies, stats.mistakes, stats.blunders
        );
    }
}

async fn play(config: &AnalysisConfig, human: Color) -> anyhow::Result<()> {
    let engine = EngineSession::spawn(&config.engine_path)?;
    engine.configure(config.engine_options()).await?;
    if let Some(name) = engine.name() {
        println!("Playing against {name}");
    }

    let rules = StandardRules;
    let mut game = GameState::new();
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    while !game.is_over() {
        if game.side_to_move() == human {
            println!("\n{}", game.board());
            println!("Your move ({}):", game.side_to_move());
            let Some(line) = input.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line == "quit" {
                break;
            }
            let Some(mv) = Move::from_uci(line) else {
                println!("Enter a move like e2e4 or e7e8q, or quit");
                continue;
            };
            let next = game.apply(as_action(mv), &rules);
            if next == game {
                println!("Illegal move: {line}");
                continue;
            }
            game = next;
        } else {
            let fen = game.position().fen().to_string();
            let Some(reply) = engine.evaluate(&fen, config.search_limit()).await? else {
                break;
            };
            let Some(mv) = Move::from_uci(&reply) else {
                bail!("engine sent unreadable move {reply}");
            };
            let next = game.apply(as_action(mv), &rules);
            if next == game {
                bail!("engine sent illegal move {reply} in {fen}");
            }
            game = next;
        }
        if let Some(last) = game.history().last() {
            println!("{}: {}", last.side, last.notation);
        }
    }

    println!("\n{}", game.board());
    match game.status() {
        GameStatus::Checkmate => {
            if let Some(winner) = game.winner() {
                println!("Checkmate, {winner} wins");
            }
        }
        GameStatus::Draw => println!("Draw ({:?})", game.draw_reason()),
        GameStatus::Playing | GameStatus::Check => println!("Game abandoned"),
    }
    engine.dispose().await;
    Ok(())
}

fn as_action(mv: Move) -> GameAction {
    GameAction::Move {
        from: mv.from,
        to: mv.to,
        promotion: mv.promotion,
    }
}

//! Folding streamed `info` lines into a search result.

use uci::{EngineInfo, Score};

/// What a finished search produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchOutcome {
    /// First move of the top line, or the engine's `bestmove` if no scored
    /// line named one. `None` when the position has no legal move.
    pub best: Option<String>,
    /// First move of the second line.
    pub second: Option<String>,
    /// Score of the top line, relative to the side to move.
    pub score: Option<Score>,
    pub depth: u32,
}

#[derive(Debug, Clone, Default)]
struct Line {
    depth: u32,
    score: Option<Score>,
    first_move: Option<String>,
}

/// Keeps the deepest report for the two top principal variations.
#[derive(Debug, Default)]
pub struct PvTracker {
    best: Option<Line>,
    second: Option<Line>,
}

impl PvTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one `info` line. Bound-only scores and lines without a score
    /// or a variation are ignored; a later line at equal or greater depth
    /// replaces an earlier one.
    pub fn observe(&mut self, info: &EngineInfo) {
        if info.bound.is_some() || (info.score.is_none() && info.pv.is_empty()) {
            return;
        }
        let slot = match info.pv_rank() {
            1 => &mut self.best,
            2 => &mut self.second,
            _ => return,
        };
        let depth = info.depth.unwrap_or(0);
        if slot.as_ref().is_some_and(|line| depth < line.depth) {
            return;
        }
        let previous = slot.take().unwrap_or_default();
        *slot = Some(Line {
            depth,
            // A pv-only refresh keeps the score from the same line.
            score: info.score.or(previous.score),
            first_move: info.pv.first().cloned().or(previous.first_move),
        });
    }

    /// Combines the collected lines with the terminal `bestmove`.
    pub fn finish(self, bestmove: Option<String>) -> SearchOutcome {
        let best = self.best.unwrap_or_default();
        SearchOutcome {
            best: best.first_move.or(bestmove),
            second: self.second.and_then(|line| line.first_move),
            score: best.score,
            depth: best.depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uci::{Bound, InfoBuilder};

    fn line(depth: u32, rank: u32, cp: i32, pv: &[&str]) -> EngineInfo {
        InfoBuilder::new()
            .depth(depth)
            .multipv(rank)
            .score_cp(cp)
            .pv(pv.iter().copied())
            .build()
    }

    #[test]
    fn test_deepest_line_wins() {
        let mut tracker = PvTracker::new();
        tracker.observe(&line(10, 1, 30, &["e2e4", "e7e5"]));
        tracker.observe(&line(10, 2, 20, &["d2d4"]));
        tracker.observe(&line(12, 1, 25, &["g1f3"]));
        tracker.observe(&line(11, 2, 18, &["c2c4"]));
        let outcome = tracker.finish(Some("g1f3".into()));
        assert_eq!(outcome.best.as_deref(), Some("g1f3"));
        assert_eq!(outcome.second.as_deref(), Some("c2c4"));
        assert_eq!(outcome.score, Some(Score::Cp(25)));
        assert_eq!(outcome.depth, 12);
    }

    #[test]
    fn test_shallower_line_is_ignored() {
        let mut tracker = PvTracker::new();
        tracker.observe(&line(14, 1, 50, &["e2e4"]));
        tracker.observe(&line(9, 1, -10, &["a2a3"]));
        let outcome = tracker.finish(None);
        assert_eq!(outcome.best.as_deref(), Some("e2e4"));
        assert_eq!(outcome.score, Some(Score::Cp(50)));
    }

    #[test]
    fn test_equal_depth_overwrites() {
        let mut tracker = PvTracker::new();
        tracker.observe(&line(8, 1, 50, &["e2e4"]));
        tracker.observe(&line(8, 1, 45, &["d2d4"]));
        assert_eq!(tracker.finish(None).best.as_deref(), Some("d2d4"));
    }

    #[test]
    fn test_bound_lines_ignored() {
        let mut tracker = PvTracker::new();
        tracker.observe(&line(8, 1, 40, &["e2e4"]));
        let bounded = InfoBuilder::new()
            .depth(9)
            .score_cp(300)
            .bound(Bound::Lower)
            .pv(["h2h4"])
            .build();
        tracker.observe(&bounded);
        let outcome = tracker.finish(None);
        assert_eq!(outcome.best.as_deref(), Some("e2e4"));
        assert_eq!(outcome.score, Some(Score::Cp(40)));
    }

    #[test]
    fn test_bestmove_fills_missing_line() {
        let tracker = PvTracker::new();
        let outcome = tracker.finish(Some("e1g1".into()));
        assert_eq!(outcome.best.as_deref(), Some("e1g1"));
        assert_eq!(outcome.score, None);
        assert_eq!(outcome.second, None);
    }

    #[test]
    fn test_string_info_ignored() {
        let mut tracker = PvTracker::new();
        tracker.observe(&InfoBuilder::new().string("NNUE evaluation enabled").build());
        assert_eq!(tracker.finish(None), SearchOutcome::default());
    }

    #[test]
    fn test_mate_score_kept() {
        let mut tracker = PvTracker::new();
        tracker.observe(
            &InfoBuilder::new()
                .depth(1)
                .score_mate(1)
                .pv(["d8h4"])
                .build(),
        );
        let outcome = tracker.finish(Some("d8h4".into()));
        assert_eq!(outcome.score, Some(Score::Mate(1)));
        assert_eq!(outcome.best.as_deref(), Some("d8h4"));
    }
}

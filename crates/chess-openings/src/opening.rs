//! Core opening types.

use serde::{Deserialize, Serialize};

/// A named opening line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    /// The ECO code for this opening (e.g., "B20", "C44").
    pub eco: String,
    /// The name of the opening.
    pub name: String,
    /// The sequence of moves in UCI notation, from the standard start.
    pub moves: Vec<String>,
}

impl Opening {
    /// Creates a new opening with the given ECO code, name, and moves.
    #[must_use]
    pub fn new(eco: impl Into<String>, name: impl Into<String>, moves: Vec<String>) -> Self {
        Self {
            eco: eco.into(),
            name: name.into(),
            moves,
        }
    }

    /// Number of plies in the line.
    #[must_use]
    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }
}

impl std::fmt::Display for Opening {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.eco, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opening_new() {
        let opening = Opening::new(
            "C44",
            "King's Pawn Game",
            vec!["e2e4".to_string(), "e7e5".to_string()],
        );
        assert_eq!(opening.eco, "C44");
        assert_eq!(opening.name, "King's Pawn Game");
        assert_eq!(opening.ply_count(), 2);
        assert_eq!(opening.to_string(), "C44 King's Pawn Game");
    }

    #[test]
    fn test_opening_json() {
        let json = r#"{"eco":"B01","name":"Scandinavian Defense","moves":["e2e4","d7d5"]}"#;
        let opening: Opening = serde_json::from_str(json).unwrap();
        assert_eq!(opening.moves, vec!["e2e4", "d7d5"]);
    }
}

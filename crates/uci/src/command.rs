//! Commands sent from the GUI side to an engine.

use crate::UciError;
use std::fmt;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Initialize UCI mode.
    Uci,
    /// Set an engine option.
    SetOption { name: String, value: Option<String> },
    /// The next search belongs to a different game.
    UciNewGame,
    /// Check if engine is ready.
    IsReady,
    /// Set up position. `fen: None` is the standard start position.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search to this depth.
    pub depth: Option<u32>,
    /// Search this many nodes.
    pub nodes: Option<u64>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
}

impl GoOptions {
    pub fn movetime(ms: u64) -> Self {
        GoOptions {
            movetime: Some(ms),
            ..Default::default()
        }
    }

    pub fn depth(depth: u32) -> Self {
        GoOptions {
            depth: Some(depth),
            ..Default::default()
        }
    }

    pub fn nodes(nodes: u64) -> Self {
        GoOptions {
            nodes: Some(nodes),
            ..Default::default()
        }
    }
}

impl EngineCommand {
    /// Convenience constructor for `setoption name <name> value <value>`.
    pub fn set_option(name: &str, value: impl fmt::Display) -> Self {
        EngineCommand::SetOption {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// Format the command as a single protocol line (without newline).
    pub fn to_uci(&self) -> String {
        match self {
            EngineCommand::Uci => "uci".to_string(),
            EngineCommand::SetOption { name, value } => match value {
                Some(v) => format!("setoption name {} value {}", name, v),
                None => format!("setoption name {}", name),
            },
            EngineCommand::UciNewGame => "ucinewgame".to_string(),
            EngineCommand::IsReady => "isready".to_string(),
            EngineCommand::Position { fen, moves } => {
                let mut line = match fen {
                    Some(f) => format!("position fen {}", f),
                    None => "position startpos".to_string(),
                };
                if !moves.is_empty() {
                    line.push_str(" moves ");
                    line.push_str(&moves.join(" "));
                }
                line
            }
            EngineCommand::Go(opts) => {
                let mut parts = vec!["go".to_string()];
                if let Some(d) = opts.depth {
                    parts.push(format!("depth {}", d));
                }
                if let Some(n) = opts.nodes {
                    parts.push(format!("nodes {}", n));
                }
                if let Some(t) = opts.movetime {
                    parts.push(format!("movetime {}", t));
                }
                if opts.infinite {
                    parts.push("infinite".to_string());
                }
                parts.join(" ")
            }
            EngineCommand::Stop => "stop".to_string(),
            EngineCommand::Quit => "quit".to_string(),
            EngineCommand::Unknown(s) => s.clone(),
        }
    }

    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        let cmd = parts.next().unwrap_or("");

        match cmd {
            "uci" => Ok(EngineCommand::Uci),
            "ucinewgame" => Ok(EngineCommand::UciNewGame),
            "isready" => Ok(EngineCommand::IsReady),
            "stop" => Ok(EngineCommand::Stop),
            "quit" => Ok(EngineCommand::Quit),
            "setoption" => Self::parse_setoption(parts),
            "position" => Self::parse_position(parts),
            "go" => Ok(Self::parse_go(parts)),
            _ => Ok(EngineCommand::Unknown(input.to_string())),
        }
    }

    fn parse_setoption<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        if parts.next() != Some("name") {
            return Err(UciError::ParseError(
                "setoption: expected 'name'".to_string(),
            ));
        }
        let mut name = Vec::new();
        let mut value = Vec::new();
        let mut in_value = false;
        for part in parts {
            if part == "value" && !in_value {
                in_value = true;
            } else if in_value {
                value.push(part);
            } else {
                name.push(part);
            }
        }
        if name.is_empty() {
            return Err(UciError::ParseError(
                "setoption: missing option name".to_string(),
            ));
        }
        Ok(EngineCommand::SetOption {
            name: name.join(" "),
            value: in_value.then(|| value.join(" ")),
        })
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let fen = match parts.next() {
            Some("startpos") => {
                if let Some(next) = parts.next() {
                    if next != "moves" {
                        return Err(UciError::ParseError(format!(
                            "Expected 'moves', got '{}'",
                            next
                        )));
                    }
                }
                None
            }
            Some("fen") => {
                let mut fen_parts = Vec::new();
                for part in parts.by_ref() {
                    if part == "moves" {
                        break;
                    }
                    fen_parts.push(part);
                }
                if fen_parts.is_empty() {
                    return Err(UciError::ParseError("Empty FEN".to_string()));
                }
                Some(fen_parts.join(" "))
            }
            Some(other) => {
                return Err(UciError::ParseError(format!(
                    "Expected 'startpos' or 'fen', got '{}'",
                    other
                )));
            }
            None => {
                return Err(UciError::ParseError(
                    "Expected 'startpos' or 'fen'".to_string(),
                ));
            }
        };

        let moves = parts.map(|s| s.to_string()).collect();
        Ok(EngineCommand::Position { fen, moves })
    }

    fn parse_go<'a>(parts: impl Iterator<Item = &'a str>) -> Self {
        let mut opts = GoOptions::default();
        let parts: Vec<&str> = parts.collect();
        let mut i = 0;

        while i < parts.len() {
            match parts[i] {
                "movetime" => {
                    i += 1;
                    if i < parts.len() {
                        opts.movetime = parts[i].parse().ok();
                    }
                }
                "depth" => {
                    i += 1;
                    if i < parts.len() {
                        opts.depth = parts[i].parse().ok();
                    }
                }
                "nodes" => {
                    i += 1;
                    if i < parts.len() {
                        opts.nodes = parts[i].parse().ok();
                    }
                }
                "infinite" => {
                    opts.infinite = true;
                }
                _ => {}
            }
            i += 1;
        }

        EngineCommand::Go(opts)
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci())
    }
}

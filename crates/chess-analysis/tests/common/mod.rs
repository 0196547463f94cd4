//! A scripted UCI engine that runs in-process over a duplex pipe.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chess_analysis::{EngineError, EngineFactory, EngineOptions, EngineSession};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Every command any fake engine received, as `"<instance>: <line>"`.
#[derive(Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<String>>>);

impl CommandLog {
    fn push(&self, instance: usize, line: &str) {
        self.0.lock().unwrap().push(format!("{instance}: {line}"));
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position_of(&self, entry: &str) -> Option<usize> {
        self.lines().iter().position(|l| l == entry)
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.lines().iter().filter(|l| l.starts_with(prefix)).count()
    }

    /// Polls until `entry` has been logged.
    pub async fn wait_for(&self, entry: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.position_of(entry).is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never saw {entry:?} in {:?}", self.lines()));
    }
}

/// What the fake engine answers to `go` in a given position.
#[derive(Clone, Debug)]
pub struct Reply {
    pub info: Vec<String>,
    /// The move after `bestmove`, e.g. `"e2e4"` or `"(none)"`.
    pub bestmove: String,
}

impl Reply {
    pub fn new(info: &[&str], bestmove: &str) -> Self {
        Self {
            info: info.iter().map(|s| s.to_string()).collect(),
            bestmove: bestmove.to_string(),
        }
    }

    /// A two-line MultiPV answer.
    pub fn lines(score: &str, best: &str, second: &str) -> Self {
        let first = format!("info depth 12 multipv 1 score {score} pv {best}");
        let other = format!("info depth 12 multipv 2 score cp -999 pv {second}");
        Self::new(&[first.as_str(), other.as_str()], best)
    }
}

/// Replies keyed by the FEN sent with `position fen`.
#[derive(Clone, Debug)]
pub struct Script {
    replies: HashMap<String, Reply>,
    fallback: Reply,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            replies: HashMap::new(),
            fallback: Reply::new(&["info depth 10 multipv 1 score cp 0 pv a2a3"], "a2a3"),
        }
    }
}

impl Script {
    pub fn on(mut self, fen: &str, reply: Reply) -> Self {
        self.replies.insert(fen.to_string(), reply);
        self
    }

    fn reply_for(&self, fen: &str) -> &Reply {
        self.replies.get(fen).unwrap_or(&self.fallback)
    }
}

/// Starts a fake engine and returns a session connected to it.
///
/// With `hold_first_search` the engine streams its `info` lines for the
/// first `go` but withholds `bestmove` until it receives `stop`.
pub fn fake_session(
    instance: usize,
    script: Script,
    log: CommandLog,
    hold_first_search: bool,
) -> EngineSession {
    let (client, engine) = tokio::io::duplex(64 * 1024);
    let (engine_read, mut engine_write) = tokio::io::split(engine);

    tokio::spawn(async move {
        let mut lines = BufReader::new(engine_read).lines();
        let mut fen = String::new();
        let mut hold = hold_first_search;
        let mut held: Option<String> = None;

        while let Ok(Some(line)) = lines.next_line().await {
            log.push(instance, &line);
            let mut out: Vec<String> = Vec::new();
            let command = line.split_whitespace().next().unwrap_or("");
            match command {
                "uci" => {
                    out.push("id name FakeFish 1.0".into());
                    out.push("id author Tests".into());
                    out.push("option name Threads type spin default 1 min 1 max 512".into());
                    out.push("uciok".into());
                }
                "isready" => out.push("readyok".into()),
                "position" => {
                    fen = line
                        .strip_prefix("position fen ")
                        .unwrap_or_default()
                        .to_string();
                }
                "go" => {
                    let reply = script.reply_for(&fen).clone();
                    out.extend(reply.info);
                    let bestmove = format!("bestmove {}", reply.bestmove);
                    if hold {
                        hold = false;
                        held = Some(bestmove);
                    } else {
                        out.push(bestmove);
                    }
                }
                "stop" => out.extend(held.take()),
                "quit" => break,
                _ => {}
            }
            for reply in out {
                if engine_write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = engine_write.flush().await;
        }
    });

    let (reader, writer) = tokio::io::split(client);
    EngineSession::from_transport(reader, writer)
}

/// Creates numbered fake engines; instance 0 optionally holds its first search.
pub struct FakeFactory {
    pub script: Script,
    pub log: CommandLog,
    pub hold_first_instance: bool,
    pub created: Arc<AtomicUsize>,
}

impl FakeFactory {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: CommandLog::default(),
            hold_first_instance: false,
            created: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn holding_first(mut self) -> Self {
        self.hold_first_instance = true;
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl EngineFactory for FakeFactory {
    fn create(&self) -> Result<EngineSession, EngineError> {
        let instance = self.created.fetch_add(1, Ordering::SeqCst);
        Ok(fake_session(
            instance,
            self.script.clone(),
            self.log.clone(),
            self.hold_first_instance && instance == 0,
        ))
    }
}

pub fn fast_options() -> EngineOptions {
    EngineOptions {
        handshake_timeout: Duration::from_secs(2),
        shutdown_timeout: Duration::from_millis(200),
        ..EngineOptions::default()
    }
}

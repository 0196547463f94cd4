//! UCI engine session for position analysis.
//!
//! An [`EngineSession`] owns one engine process (or any line transport that
//! speaks UCI) and turns its streamed protocol into one request/response call
//! per search. A background task owns the transport; the handle talks to it
//! over a channel, so the session can be dropped or disposed from anywhere.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use uci::{EngineCommand, EngineMessage, GoOptions};

use crate::error::EngineError;
use crate::pv::{PvTracker, SearchOutcome};

/// How long one search may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    /// Search for this many milliseconds.
    MoveTime(u64),
    /// Search to this depth.
    Depth(u32),
    /// Search this many nodes.
    Nodes(u64),
}

impl SearchLimit {
    fn go_options(self) -> GoOptions {
        match self {
            SearchLimit::MoveTime(ms) => GoOptions::movetime(ms),
            SearchLimit::Depth(depth) => GoOptions::depth(depth),
            SearchLimit::Nodes(nodes) => GoOptions::nodes(nodes),
        }
    }
}

/// Options applied during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub threads: u32,
    pub hash_mb: u32,
    /// Number of principal variations reported per search.
    pub multi_pv: u32,
    pub handshake_timeout: Duration,
    /// Grace period between `quit` and a forced kill.
    pub shutdown_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 128,
            multi_pv: 2,
            handshake_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_millis(500),
        }
    }
}

type SearchReply = oneshot::Sender<Result<Option<SearchOutcome>, EngineError>>;

struct PendingSearch {
    fen: String,
    limit: SearchLimit,
    width: Option<u32>,
    reply: SearchReply,
}

struct ActiveSearch {
    /// `None` once the caller has been answered early (superseded).
    reply: Option<SearchReply>,
    tracker: PvTracker,
    stop_sent: bool,
}

enum Request {
    Configure {
        options: EngineOptions,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Search(PendingSearch),
    Stop,
    Dispose {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running engine.
///
/// Only one search is outstanding at a time. Starting a new search while one
/// is running stops the old one and answers its caller with `None`. Dropping
/// the handle shuts the engine down the same way [`EngineSession::dispose`]
/// does, without waiting for it.
pub struct EngineSession {
    requests: mpsc::Sender<Request>,
    ready: Arc<AtomicBool>,
    name: Arc<Mutex<Option<String>>>,
}

impl EngineSession {
    /// Spawns the engine executable at `path`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Spawn`] if the executable cannot be started
    /// - [`EngineError::Closed`] if its standard streams are unavailable
    pub fn spawn(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.display().to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(EngineError::Closed)?;
        let stdout = child.stdout.take().ok_or(EngineError::Closed)?;
        info!(path = %path.display(), "engine spawned");
        Ok(Self::start(stdout, stdin, Some(child)))
    }

    /// Runs a session over an arbitrary line transport.
    ///
    /// `reader` carries engine output, `writer` receives commands. The
    /// transport counts as exited once `reader` reaches end of file.
    pub fn from_transport<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::start(reader, writer, None)
    }

    fn start<R, W>(reader: R, writer: W, child: Option<Child>) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (line_tx, line_rx) = mpsc::channel::<String>(256);
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                trace!(line = %line, "engine >");
                if line_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        let ready = Arc::new(AtomicBool::new(false));
        let name = Arc::new(Mutex::new(None));
        let (request_tx, request_rx) = mpsc::channel(32);
        let driver = Driver {
            writer: Box::new(writer),
            lines: line_rx,
            child,
            ready: Arc::clone(&ready),
            name: Arc::clone(&name),
            options: EngineOptions::default(),
            width: 1,
            active: None,
            queued: None,
            closed: false,
        };
        tokio::spawn(driver.run(request_rx));

        Self {
            requests: request_tx,
            ready,
            name,
        }
    }

    /// Performs the handshake: `uci`, options, `ucinewgame`, `isready`.
    ///
    /// Any search in flight is cancelled first. Searches issued before this
    /// completes answer `None`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Timeout`] if `uciok` or `readyok` does not arrive
    ///   within the handshake timeout
    /// - [`EngineError::Io`] or [`EngineError::Closed`] if the transport fails
    pub async fn configure(&self, options: EngineOptions) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.request(Request::Configure { options, reply }).await?;
        rx.await.map_err(|_| EngineError::Closed)?
    }

    /// Searches `fen` and returns the best move, or `None` when there is no
    /// legal move, the engine is not ready, or the search was superseded.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] or [`EngineError::Closed`] if the
    /// transport fails mid-search.
    pub async fn evaluate(
        &self,
        fen: &str,
        limit: SearchLimit,
    ) -> Result<Option<String>, EngineError> {
        let outcome = self.search(fen, limit, None).await?;
        Ok(outcome.and_then(|outcome| outcome.best))
    }

    /// Searches `fen` reporting `width` principal variations.
    ///
    /// Returns `None` when the engine is not ready or the search was
    /// superseded by a newer one.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub async fn evaluate_principal_variations(
        &self,
        fen: &str,
        limit: SearchLimit,
        width: u32,
    ) -> Result<Option<SearchOutcome>, EngineError> {
        self.search(fen, limit, Some(width.max(1))).await
    }

    async fn search(
        &self,
        fen: &str,
        limit: SearchLimit,
        width: Option<u32>,
    ) -> Result<Option<SearchOutcome>, EngineError> {
        if !self.is_ready() {
            debug!("search requested before engine was ready");
            return Ok(None);
        }
        let (reply, rx) = oneshot::channel();
        self.request(Request::Search(PendingSearch {
            fen: fen.to_string(),
            limit,
            width,
            reply,
        }))
        .await?;
        rx.await.map_err(|_| EngineError::Closed)?
    }

    /// Asks the engine to finish the current search early. The caller of
    /// that search still receives the best move found so far.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.request(Request::Stop).await
    }

    /// Sends `quit`, waits for the engine to exit, and kills it if it does
    /// not exit within the configured grace period.
    pub async fn dispose(self) {
        let (reply, rx) = oneshot::channel();
        if self.request(Request::Dispose { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// The engine's `id name`, once the handshake has seen it.
    pub fn name(&self) -> Option<String> {
        self.name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn request(&self, request: Request) -> Result<(), EngineError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| EngineError::Closed)
    }
}

/// Background task that owns the transport.
struct Driver {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    lines: mpsc::Receiver<String>,
    child: Option<Child>,
    ready: Arc<AtomicBool>,
    name: Arc<Mutex<Option<String>>>,
    options: EngineOptions,
    /// MultiPV value the engine currently has.
    width: u32,
    active: Option<ActiveSearch>,
    queued: Option<PendingSearch>,
    closed: bool,
}

impl Driver {
    async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Dispose { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(request) => self.handle(request).await,
                    None => {
                        debug!("engine handle dropped");
                        self.shutdown().await;
                        return;
                    }
                },
                line = self.lines.recv(), if !self.closed => match line {
                    Some(line) => self.on_line(&line).await,
                    None => self.on_closed(),
                },
            }
        }
    }

    async fn handle(&mut self, request: Request) {
        match request {
            Request::Configure { options, reply } => {
                if self.closed {
                    let _ = reply.send(Err(EngineError::Closed));
                    return;
                }
                self.stop_active().await;
                self.cancel_pending();
                let _ = reply.send(self.handshake(options).await);
            }
            Request::Search(search) => {
                if self.active.is_none() {
                    self.start(search).await;
                    return;
                }
                if let Some(reply) = self.active.as_mut().and_then(|a| a.reply.take()) {
                    let _ = reply.send(Ok(None));
                }
                self.stop_active().await;
                if let Some(previous) = self.queued.replace(search) {
                    let _ = previous.reply.send(Ok(None));
                }
                debug!("search superseded");
            }
            Request::Stop => self.stop_active().await,
            Request::Dispose { .. } => {}
        }
    }

    async fn handshake(&mut self, options: EngineOptions) -> Result<(), EngineError> {
        self.ready.store(false, Ordering::Release);
        let limit = options.handshake_timeout;

        self.send(EngineCommand::Uci).await?;
        self.expect(limit, "uciok", |msg| matches!(msg, EngineMessage::UciOk))
            .await?;

        self.send(EngineCommand::set_option("Threads", options.threads))
            .await?;
        self.send(EngineCommand::set_option("Hash", options.hash_mb))
            .await?;
        self.send(EngineCommand::set_option("MultiPV", options.multi_pv))
            .await?;
        self.width = options.multi_pv;
        self.send(EngineCommand::UciNewGame).await?;

        self.send(EngineCommand::IsReady).await?;
        self.expect(limit, "readyok", |msg| matches!(msg, EngineMessage::ReadyOk))
            .await?;

        self.options = options;
        self.ready.store(true, Ordering::Release);
        info!(engine = ?self.name_snapshot(), "engine ready");
        Ok(())
    }

    /// Reads lines until one matches, bounded by `limit`.
    async fn expect(
        &mut self,
        limit: Duration,
        what: &'static str,
        wanted: fn(&EngineMessage) -> bool,
    ) -> Result<(), EngineError> {
        let wait = async {
            while let Some(line) = self.lines.recv().await {
                let message = EngineMessage::parse(&line);
                if let EngineMessage::Id {
                    name: Some(name), ..
                } = &message
                {
                    *self.name.lock().unwrap_or_else(PoisonError::into_inner) = Some(name.clone());
                }
                if wanted(&message) {
                    return Ok(());
                }
            }
            Err(EngineError::Closed)
        };
        let result = timeout(limit, wait)
            .await
            .map_err(|_| EngineError::Timeout(what))?;
        if matches!(result, Err(EngineError::Closed)) {
            self.on_closed();
        }
        result
    }

    async fn start(&mut self, search: PendingSearch) {
        if self.closed {
            let _ = search.reply.send(Err(EngineError::Closed));
            return;
        }
        if !self.ready.load(Ordering::Acquire) {
            let _ = search.reply.send(Ok(None));
            return;
        }
        if let Err(err) = self.begin(&search).await {
            let _ = search.reply.send(Err(err));
            return;
        }
        self.active = Some(ActiveSearch {
            reply: Some(search.reply),
            tracker: PvTracker::new(),
            stop_sent: false,
        });
    }

    async fn begin(&mut self, search: &PendingSearch) -> Result<(), EngineError> {
        if let Some(width) = search.width.filter(|w| *w != self.width) {
            self.send(EngineCommand::set_option("MultiPV", width)).await?;
            self.width = width;
        }
        self.send(EngineCommand::Position {
            fen: Some(search.fen.clone()),
            moves: Vec::new(),
        })
        .await?;
        self.send(EngineCommand::Go(search.limit.go_options())).await
    }

    async fn on_line(&mut self, line: &str) {
        match EngineMessage::parse(line) {
            EngineMessage::Info(info) => {
                if let Some(active) = self.active.as_mut() {
                    active.tracker.observe(&info);
                }
            }
            EngineMessage::BestMove { mv, .. } => {
                let Some(active) = self.active.take() else {
                    debug!(line, "bestmove with no search in flight");
                    return;
                };
                if let Some(reply) = active.reply {
                    let _ = reply.send(Ok(Some(active.tracker.finish(mv))));
                }
                if let Some(next) = self.queued.take() {
                    self.start(next).await;
                }
            }
            EngineMessage::Unknown(text) => debug!(text = %text, "unexpected engine output"),
            EngineMessage::Id { .. } | EngineMessage::UciOk | EngineMessage::ReadyOk => {}
        }
    }

    fn on_closed(&mut self) {
        if self.closed {
            return;
        }
        warn!("engine output closed");
        self.closed = true;
        self.ready.store(false, Ordering::Release);
        if let Some(reply) = self.active.take().and_then(|a| a.reply) {
            let _ = reply.send(Err(EngineError::Closed));
        }
        if let Some(queued) = self.queued.take() {
            let _ = queued.reply.send(Err(EngineError::Closed));
        }
    }

    async fn stop_active(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.stop_sent {
            return;
        }
        active.stop_sent = true;
        if let Err(err) = self.send(EngineCommand::Stop).await {
            warn!(%err, "failed to send stop");
        }
    }

    /// Answers every waiting caller with `None` and forgets the searches.
    fn cancel_pending(&mut self) {
        if let Some(reply) = self.active.take().and_then(|a| a.reply) {
            let _ = reply.send(Ok(None));
        }
        if let Some(queued) = self.queued.take() {
            let _ = queued.reply.send(Ok(None));
        }
    }

    async fn shutdown(&mut self) {
        self.ready.store(false, Ordering::Release);
        if !self.closed {
            self.stop_active().await;
        }
        self.cancel_pending();
        if !self.closed {
            let _ = self.send(EngineCommand::Quit).await;
        }
        let _ = self.writer.shutdown().await;

        let grace = self.options.shutdown_timeout;
        match self.child.take() {
            Some(mut child) => {
                if timeout(grace, child.wait()).await.is_err() {
                    warn!("engine ignored quit, killing");
                    if let Err(err) = child.kill().await {
                        warn!(%err, "failed to kill engine");
                    }
                }
            }
            None => {
                let drain = async { while self.lines.recv().await.is_some() {} };
                if timeout(grace, drain).await.is_err() {
                    warn!("engine transport still open after quit");
                }
            }
        }
        debug!("engine session closed");
    }

    async fn send(&mut self, command: EngineCommand) -> Result<(), EngineError> {
        let line = command.to_uci();
        debug!(cmd = %line, "engine <");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    fn name_snapshot(&self) -> Option<String> {
        self.name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Creates engine sessions on demand.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<EngineSession, EngineError>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Result<EngineSession, EngineError> + Send + Sync,
{
    fn create(&self) -> Result<EngineSession, EngineError> {
        self()
    }
}

/// Spawns a fresh engine process per session.
#[derive(Debug, Clone)]
pub struct ProcessEngineFactory {
    path: PathBuf,
}

impl ProcessEngineFactory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EngineFactory for ProcessEngineFactory {
    fn create(&self) -> Result<EngineSession, EngineError> {
        EngineSession::spawn(&self.path)
    }
}

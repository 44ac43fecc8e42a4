//! External UCI engine process.
//!
//! One [`EngineProcess`] is bound to one game session. The engine's
//! stdout is consumed by a background reader task that frames it into
//! lines and scans each one for `bestmove`. The answer is handed to
//! whoever is waiting in the single-slot pending register; a second
//! request while one is pending is refused with `Busy` instead of
//! interleaving commands on the same pipe.
//!
//! ```text
//!  request_best_move ──register──▶ [ pending slot ] ◀──resolve── reader task ◀── stdout
//!          │                                                      (LineFramer)
//!          └──────── position fen … / go movetime … ──────────────────────────▶ stdin
//! ```
//!
//! The process is never restarted. If it exits, closes stdout or stays
//! silent past the response timeout, the pending request fails and every
//! later request fails the same way. A timed-out process is killed.

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chess_core::{MoveSearch, SearchError};
use chess_protocol::framing::LineFramer;
use chess_protocol::uci::{encode_commands, parse_best_move, BestMove, UciCommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;

/// Engine output lines are short; anything longer is noise.
const MAX_ENGINE_LINE: usize = 16 * 1024;

type Reply = Result<String, SearchError>;

pub struct EngineProcess {
    program: String,
    stdin: tokio::sync::Mutex<Option<ChildStdin>>,
    child: tokio::sync::Mutex<Child>,
    pending: Arc<PendingSlot>,
    reader: Mutex<Option<JoinHandle<()>>>,
    movetime: Duration,
    response_timeout: Duration,
    new_game_sent: AtomicBool,
    shut_down: AtomicBool,
}

impl EngineProcess {
    /// Launch the engine and send the UCI handshake.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: &EngineConfig) -> Result<Self, SearchError> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SearchError::Failure(format!("failed to start engine `{}`: {e}", config.program))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SearchError::Failure("engine stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SearchError::Failure("engine stdout unavailable".into()))?;

        let pid = child.id();
        let pending = Arc::new(PendingSlot::default());
        let reader = tokio::spawn(read_output(stdout, pending.clone(), pid));

        let engine = EngineProcess {
            program: config.program.clone(),
            stdin: tokio::sync::Mutex::new(Some(stdin)),
            child: tokio::sync::Mutex::new(child),
            pending,
            reader: Mutex::new(Some(reader)),
            movetime: config.movetime(),
            response_timeout: config.response_timeout(),
            new_game_sent: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        };

        if let Err(e) = engine.write(&[UciCommand::Uci, UciCommand::IsReady]).await {
            engine.shutdown().await;
            return Err(SearchError::Failure(format!("failed to write to engine: {e}")));
        }

        debug!(program = %engine.program, pid = ?pid, "engine started");
        Ok(engine)
    }

    /// Search the given FEN position for `movetime` and return the
    /// engine's best move in UCI notation.
    pub async fn request_best_move(&self, fen: &str) -> Result<String, SearchError> {
        let rx = self.pending.register()?;

        let mut commands = Vec::with_capacity(3);
        if !self.new_game_sent.swap(true, Ordering::SeqCst) {
            commands.push(UciCommand::UciNewGame);
        }
        commands.push(UciCommand::Position { fen });
        commands.push(UciCommand::GoMovetime {
            millis: self.movetime.as_millis() as u64,
        });

        if let Err(e) = self.write(&commands).await {
            let err = SearchError::Failure(format!("failed to write to engine: {e}"));
            self.pending.close(err.clone());
            return Err(err);
        }

        match timeout(self.response_timeout, rx).await {
            Ok(Ok(reply)) => reply,
            // The slot was dropped without an answer.
            Ok(Err(_)) => Err(SearchError::Cancelled),
            Err(_) => {
                let err = SearchError::Failure(format!(
                    "engine gave no best move within {} ms",
                    self.response_timeout.as_millis()
                ));
                warn!(program = %self.program, "{err}");
                self.pending.close(err.clone());
                // A hung engine is useless from here on.
                if let Err(e) = self.child.lock().await.start_kill() {
                    debug!(program = %self.program, "engine kill failed (already exited?): {e}");
                }
                Err(err)
            }
        }
    }

    /// Kill the process and cancel any pending request. Idempotent.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.pending.close(SearchError::Cancelled);

        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }

        // Dropping stdin closes the pipe before the kill.
        self.stdin.lock().await.take();

        let mut child = self.child.lock().await;
        if let Err(e) = child.kill().await {
            debug!(program = %self.program, "engine kill failed (already exited?): {e}");
        }
    }

    /// Exit status, once the process has exited.
    pub async fn exit_status(&self) -> Option<ExitStatus> {
        self.child.lock().await.try_wait().ok().flatten()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_waiting()
    }

    async fn write(&self, commands: &[UciCommand<'_>]) -> io::Result<()> {
        let mut buf = Vec::with_capacity(256);
        encode_commands(commands, &mut buf);

        let mut guard = self.stdin.lock().await;
        let stdin = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "engine stdin closed"))?;
        stdin.write_all(&buf).await?;
        stdin.flush().await?;

        for cmd in commands {
            trace!(program = %self.program, "-> {cmd}");
        }
        Ok(())
    }
}

impl MoveSearch for EngineProcess {
    fn best_move(&self, fen: &str) -> impl std::future::Future<Output = Reply> + Send {
        self.request_best_move(fen)
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        // The child itself is killed by `kill_on_drop`.
        if let Some(reader) = lock(&self.reader).take() {
            reader.abort();
        }
    }
}

// -----------------------------------------------------------------------------
// Pending request register
// -----------------------------------------------------------------------------

#[derive(Default)]
enum SlotState {
    #[default]
    Idle,
    Waiting(oneshot::Sender<Reply>),
    /// Terminal: every later request fails with this error.
    Closed(SearchError),
}

#[derive(Default)]
struct PendingSlot {
    state: Mutex<SlotState>,
}

impl PendingSlot {
    /// Claim the slot for a new request.
    fn register(&self) -> Result<oneshot::Receiver<Reply>, SearchError> {
        let mut state = lock(&self.state);
        match &*state {
            SlotState::Idle => {
                let (tx, rx) = oneshot::channel();
                *state = SlotState::Waiting(tx);
                Ok(rx)
            }
            SlotState::Waiting(_) => Err(SearchError::Busy),
            SlotState::Closed(err) => Err(err.clone()),
        }
    }

    /// Hand a reply to the waiting request. Returns false if nobody was waiting.
    fn resolve(&self, reply: Reply) -> bool {
        let mut state = lock(&self.state);
        match std::mem::take(&mut *state) {
            SlotState::Waiting(tx) => tx.send(reply).is_ok(),
            other => {
                *state = other;
                false
            }
        }
    }

    /// Fail the waiting request (if any) and refuse all later ones.
    /// The first close wins.
    fn close(&self, err: SearchError) {
        let mut state = lock(&self.state);
        match std::mem::take(&mut *state) {
            SlotState::Waiting(tx) => {
                let _ = tx.send(Err(err.clone()));
                *state = SlotState::Closed(err);
            }
            SlotState::Idle => *state = SlotState::Closed(err),
            closed @ SlotState::Closed(_) => *state = closed,
        }
    }

    fn is_waiting(&self) -> bool {
        matches!(*lock(&self.state), SlotState::Waiting(_))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// -----------------------------------------------------------------------------
// Output reader
// -----------------------------------------------------------------------------

async fn read_output(mut stdout: ChildStdout, pending: Arc<PendingSlot>, pid: Option<u32>) {
    let mut framer = LineFramer::with_max_line_len(MAX_ENGINE_LINE);

    let cause = loop {
        match stdout.read_buf(framer.buffer_mut()).await {
            Ok(0) => break "engine closed its output".to_string(),
            Ok(_) => loop {
                match framer.next_line() {
                    Ok(Some(line)) => handle_line(&line, &pending, pid),
                    Ok(None) => break,
                    Err(e) => warn!(pid = ?pid, "skipping engine output: {e}"),
                }
            },
            Err(e) => break format!("failed to read engine output: {e}"),
        }
    };

    // An answer may arrive without its trailing newline right before exit.
    if let Some(line) = framer.finish() {
        handle_line(&line, &pending, pid);
    }

    debug!(pid = ?pid, "{cause}");
    pending.close(SearchError::Failure(cause));
}

fn handle_line(line: &str, pending: &PendingSlot, pid: Option<u32>) {
    trace!(pid = ?pid, "<- {line}");

    let reply = match parse_best_move(line) {
        Some(BestMove::Move(token)) => Ok(token),
        Some(BestMove::NoMove) => Err(SearchError::Failure("engine returned no move".into())),
        None => return,
    };

    if !pending.resolve(reply) {
        debug!(pid = ?pid, "discarding unsolicited engine answer: {line}");
    }
}

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use gammon_core::config::EngineConfig;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::debug;

/// How long a terminated engine gets to exit on its own before being killed.
const TERMINATE_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn engine `{path}`: {source}")]
    Spawn { path: String, source: std::io::Error },
    #[error("engine i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("engine did not respond within {0:?}")]
    Timeout(Duration),
    #[error("engine process exited unexpectedly")]
    Exited,
}

/// Spawns engine subprocesses. One implementation wraps gnubg; tests swap in
/// scripted engines without touching the relay logic.
#[async_trait]
pub trait GameEngine: Send + Sync + 'static {
    async fn spawn(&self) -> Result<Box<dyn EngineHandle>, EngineError>;
}

/// One live engine subprocess, exclusively owned by a session.
#[async_trait]
pub trait EngineHandle: Send {
    /// Write one command line and drain every response line the engine
    /// produces, returning the joined text.
    async fn exchange(&mut self, command: &str) -> Result<String, EngineError>;

    /// Politely ask the engine to quit, then kill it if it lingers.
    async fn terminate(&mut self);
}

/// Launches `gnubg --tty --quiet` with piped stdin/stdout.
#[derive(Clone, Debug)]
pub struct GnubgEngine {
    executable: String,
    args: Vec<String>,
    idle_read: Duration,
    command_timeout: Duration,
}

impl GnubgEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            args: vec!["--tty".to_owned(), "--quiet".to_owned()],
            idle_read: Duration::from_millis(config.idle_read_ms),
            command_timeout: Duration::from_secs(config.command_timeout_secs),
        }
    }
}

#[async_trait]
impl GameEngine for GnubgEngine {
    async fn spawn(&self) -> Result<Box<dyn EngineHandle>, EngineError> {
        let mut child = Command::new(&self.executable)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn { path: self.executable.clone(), source })?;

        let stdin = child.stdin.take().ok_or(EngineError::Exited)?;
        let stdout = child.stdout.take().ok_or(EngineError::Exited)?;

        let mut handle = GnubgHandle {
            child,
            stdin,
            lines: BufReader::new(stdout).lines(),
            idle_read: self.idle_read,
            command_timeout: self.command_timeout,
        };

        // gnubg prints a copyright banner on startup; swallow it before the
        // handle sees its first real command.
        let (banner, eof) = handle.drain_lines().await?;
        if eof {
            handle.terminate().await;
            return Err(EngineError::Exited);
        }
        debug!(lines = banner.len(), "engine banner consumed");

        Ok(Box::new(handle))
    }
}

struct GnubgHandle {
    child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    idle_read: Duration,
    command_timeout: Duration,
}

impl GnubgHandle {
    /// Read until the engine has been quiet for one idle-read interval or
    /// closed its stdout. The whole drain is bounded by the command timeout.
    async fn drain_lines(&mut self) -> Result<(Vec<String>, bool), EngineError> {
        let mut collected = Vec::new();
        let mut eof = false;

        let lines = &mut self.lines;
        let idle_read = self.idle_read;
        let drained = timeout(self.command_timeout, async {
            loop {
                match timeout(idle_read, lines.next_line()).await {
                    Ok(Ok(Some(line))) => collected.push(line),
                    Ok(Ok(None)) => {
                        eof = true;
                        break;
                    }
                    Ok(Err(source)) => return Err(EngineError::Io(source)),
                    // quiet for a full idle interval: the response is complete
                    Err(_) => break,
                }
            }
            Ok(())
        })
        .await;

        match drained {
            Ok(Ok(())) => Ok((collected, eof)),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(EngineError::Timeout(self.command_timeout)),
        }
    }
}

#[async_trait]
impl EngineHandle for GnubgHandle {
    async fn exchange(&mut self, command: &str) -> Result<String, EngineError> {
        self.stdin.write_all(format!("{command}\n").as_bytes()).await?;
        self.stdin.flush().await?;

        let (lines, eof) = self.drain_lines().await?;
        if eof && lines.is_empty() {
            return Err(EngineError::Exited);
        }

        Ok(lines.join("\n"))
    }

    async fn terminate(&mut self) {
        // gnubg asks for confirmation before quitting mid-game
        let _ = self.stdin.write_all(b"quit\ny\n").await;
        let _ = self.stdin.flush().await;

        if timeout(TERMINATE_GRACE, self.child.wait()).await.is_err() {
            let _ = self.child.kill().await;
        }
    }
}

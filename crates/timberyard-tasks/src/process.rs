//! Subprocess execution with captured, line-tagged output

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Stream a captured line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Standard output
    Info,
    /// Standard error
    Error,
    /// Success marker recognized by a task
    Ok,
}

impl LineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Error => "error",
            Self::Ok => "ok",
        }
    }
}

/// Options for a process run
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Kill the process after this long. No limit by default.
    pub timeout: Option<Duration>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
}

/// Everything a finished process produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Resolved path of the executable
    pub binary: String,
    pub arguments: Vec<String>,
    pub working_dir: PathBuf,
    /// Output lines in arrival order
    pub lines: Vec<(LineKind, String)>,
    /// Exit code, `-1` when terminated by a signal
    pub exit_code: i32,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last output line, trimmed
    pub fn last_line(&self) -> Option<&str> {
        self.lines.last().map(|(_, line)| line.trim())
    }

    /// Text of all lines regardless of stream
    pub fn text(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|(_, line)| line.as_str())
    }
}

/// Errors starting or supervising a process
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Executable not found: {0}")]
    NotFound(String),

    #[error("Working directory does not exist: {0}")]
    WorkingDirMissing(PathBuf),

    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} timed out after {}s", timeout.as_secs())]
    TimedOut { binary: String, timeout: Duration },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve a bare program name through `PATH`; paths are used as given
pub fn resolve_binary(binary: &str) -> Result<PathBuf, ProcessError> {
    if binary.contains('/') || binary.contains('\\') {
        return Ok(PathBuf::from(binary));
    }
    which::which(binary).map_err(|_| ProcessError::NotFound(binary.to_string()))
}

/// Run `binary` with `arguments` in `working_dir` and capture its output.
///
/// Standard output and standard error are drained concurrently; escape
/// characters are stripped from every line.
#[instrument(skip(arguments, options), fields(working_dir = %working_dir.display()))]
pub async fn run(
    binary: &str,
    arguments: &[String],
    working_dir: &Path,
    options: &ProcessOptions,
) -> Result<ProcessOutput, ProcessError> {
    if !working_dir.is_dir() {
        return Err(ProcessError::WorkingDirMissing(working_dir.to_path_buf()));
    }
    let program = resolve_binary(binary)?;

    info!(
        binary = %program.display(),
        arguments = %arguments.join(" "),
        "running process"
    );

    let mut child = Command::new(&program)
        .args(arguments)
        .current_dir(working_dir)
        .envs(options.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            binary: binary.to_string(),
            source,
        })?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut readers = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        readers.push(tokio::spawn(forward_lines(stdout, LineKind::Info, tx.clone())));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(tokio::spawn(forward_lines(stderr, LineKind::Error, tx.clone())));
    }
    drop(tx);

    let collect = async {
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((lines, status))
    };

    let (lines, status) = match options.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, collect).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(binary, timeout_secs = timeout.as_secs(), "process timed out, killing");
                for reader in &readers {
                    reader.abort();
                }
                return Err(ProcessError::TimedOut {
                    binary: binary.to_string(),
                    timeout,
                });
            }
        },
        None => collect.await?,
    };

    for reader in readers {
        let _ = reader.await;
    }

    let exit_code = status.code().unwrap_or(-1);
    debug!(binary, exit_code, lines = lines.len(), "process finished");

    Ok(ProcessOutput {
        binary: program.display().to_string(),
        arguments: arguments.to_vec(),
        working_dir: working_dir.to_path_buf(),
        lines,
        exit_code,
    })
}

async fn forward_lines<R>(stream: R, kind: LineKind, tx: mpsc::UnboundedSender<(LineKind, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to read process output");
                break;
            }
        }
        // tools may print bytes that are not UTF-8; keep reading past them
        let line = String::from_utf8_lossy(&buf)
            .trim_end_matches(['\r', '\n'])
            .replace('\x1b', "");
        if kind == LineKind::Error {
            debug!(target: "timberyard::process", stderr = true, "{line}");
        } else {
            debug!(target: "timberyard::process", "{line}");
        }
        if tx.send((kind, line)).is_err() {
            break;
        }
    }
}

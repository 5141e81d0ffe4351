use std::process::Command;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("could not run reader program: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("reader program exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("reader returned no tag identifier")]
    NoTag,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan is already in progress")]
    Busy,
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error("scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hardware access to the RFID reader. `read_tag` blocks until a tag is
/// presented or the driver gives up.
pub trait TagReader: Send + Sync + 'static {
    fn read_tag(&self) -> Result<String, ReaderError>;
}

/// Reads a tag by running an external program that prints the UID on stdout.
pub struct CommandReader {
    program: String,
    args: Vec<String>,
}

impl CommandReader {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl TagReader for CommandReader {
    fn read_tag(&self) -> Result<String, ReaderError> {
        let output = Command::new(&self.program).args(&self.args).output()?;
        if !output.status.success() {
            return Err(ReaderError::Failed(output.status));
        }
        let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if uid.is_empty() {
            return Err(ReaderError::NoTag);
        }
        Ok(uid)
    }
}

/// Single-flight access to the reader: at most one read runs at a time.
pub struct Scanner {
    reader: Arc<dyn TagReader>,
    in_flight: Arc<Mutex<()>>,
}

impl Scanner {
    pub fn new(reader: Arc<dyn TagReader>) -> Self {
        Self {
            reader,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub async fn begin_scan(&self) -> Result<String, ScanError> {
        let guard = self
            .in_flight
            .clone()
            .try_lock_owned()
            .map_err(|_| ScanError::Busy)?;

        let reader = Arc::clone(&self.reader);
        // The guard moves into the blocking task so the reader stays claimed
        // until the hardware read returns, even if the caller is dropped.
        let uid = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            reader.read_tag()
        })
        .await??;

        Ok(uid)
    }
}

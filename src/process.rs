use std::io;
use std::process::ExitStatus;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Bytes of stderr kept for error reports.
const DIAGNOSTICS_LIMIT: usize = 64 * 1024;

/// Owns a running external process.
///
/// The child is killed if the handle is dropped before [`wait`](Self::wait)
/// completes, so an error or a dropped future never leaves it running.
///
/// Only the direct child is signalled. The child shares our process group,
/// so a terminal Ctrl-C still reaches anything it spawned itself.
pub struct ProcessHandle {
    child: Child,
    program: String,
    reaped: bool,
}

impl ProcessHandle {
    pub fn spawn(mut command: Command) -> io::Result<Self> {
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        debug!("spawning {:?}", command.as_std());
        let child = command.kill_on_drop(true).spawn()?;

        Ok(Self {
            child,
            program,
            reaped: false,
        })
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    pub async fn wait(mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.reaped = true;
        debug!("{} exited with {status}", self.program);
        Ok(status)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }

        warn!("terminating {} before it finished", self.program);
        if let Err(e) = self.child.start_kill() {
            debug!("kill {}: {e}", self.program);
        }
    }
}

/// Reads `reader` to the end on a separate task, keeping only the tail.
pub fn collect_diagnostics<R>(reader: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else {
            return String::new();
        };

        let mut kept = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    kept.extend_from_slice(&buf[..n]);
                    if kept.len() > DIAGNOSTICS_LIMIT {
                        let excess = kept.len() - DIAGNOSTICS_LIMIT;
                        kept.drain(..excess);
                    }
                }
                Err(e) => {
                    debug!("stopped reading diagnostics: {e}");
                    break;
                }
            }
        }

        String::from_utf8_lossy(&kept).trim().to_string()
    })
}

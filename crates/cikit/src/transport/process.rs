//! Transport that pipes batches into an external command-line client.

use crate::error::{Error, Result};
use crate::transport::Transport;
use log::debug;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

/// Runs a configured program once per batch, writing the batch to its
/// stdin and returning its stdout.
#[derive(Debug, Clone)]
pub struct ProcessTransport {
    program: String,
    args: Vec<String>,
}

impl ProcessTransport {
    /// Create a transport for `program` with fixed arguments.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The program being run.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Transport for ProcessTransport {
    fn execute(&self, commands: &str) -> Result<String> {
        debug!("running {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Connection {
                message: format!("failed to start {}: {e}", self.program),
            })?;

        // stdin is written while stdout and stderr are drained; the client
        // may start answering before it has read the whole batch.
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(commands.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked")));
            (output, written)
        });
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if !stderr.trim().is_empty() {
                stderr.to_string()
            } else if !output.stdout.is_empty() {
                String::from_utf8_lossy(&output.stdout).to_string()
            } else {
                format!("{} exited with {}", self.program, output.status)
            };
            return Err(Error::from_transport_output(&message, commands));
        }

        if let Err(e) = written {
            return Err(Error::from_transport_output(
                &format!("failed to send batch to {}: {e}", self.program),
                commands,
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn name(&self) -> &str {
        &self.program
    }
}

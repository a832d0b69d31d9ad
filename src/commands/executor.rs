//! Command Executor
//!
//! Runs a host command through the shell and captures everything it prints.
//! This is the only place in the crate that builds a process, so the
//! security-sensitive boundary stays in one spot and can be swapped for a fake
//! in tests.
//!
//! ## Behaviour
//!
//! - stderr is merged into stdout (`2>&1` semantics, interleaving preserved
//!   by the shell)
//! - output is returned whole, with no size cap
//! - the call blocks until the process exits; there is no timeout
//! - a process that cannot be started yields [`SPAWN_FAILURE`] instead of an
//!   error

use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Returned to the peer when the shell itself cannot be started
pub const SPAWN_FAILURE: &str = "Failed to execute command\n";

/// Default shell used to interpret commands
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Runs a command and returns its combined output.
///
/// Implementations are called from worker threads and may block for as long
/// as the command runs.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, command: &str) -> String;
}

/// Executes commands with `<shell> -c`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl ShellExecutor {
    /// Creates an executor that uses `/bin/sh`.
    pub fn new() -> Self {
        Self::with_shell(DEFAULT_SHELL)
    }

    /// Creates an executor that uses a specific shell binary.
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Returns the shell binary path.
    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for ShellExecutor {
    fn execute(&self, command: &str) -> String {
        // Redirect first so the command text can contain newlines or its own
        // redirections without escaping the merge.
        let script = format!("exec 2>&1\n{}", command);
        let started = Instant::now();

        let output = match Command::new(&self.shell)
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                warn!(shell = %self.shell, error = %e, "Failed to start command");
                return SPAWN_FAILURE.to_string();
            }
        };

        let mut captured = output.stdout;
        captured.extend_from_slice(&output.stderr);

        debug!(
            status = ?output.status.code(),
            bytes = captured.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        trace!(command = %command.trim_end(), "Executed command");

        String::from_utf8_lossy(&captured).into_owned()
    }
}

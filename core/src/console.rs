//! Remote command channel seam.
//!
//! The concrete transport (RCON connection handling, reconnects, timeouts)
//! lives outside this crate. The engine codes against `GameConsole` and
//! treats every call as synchronous-with-timeout: a command that exceeds the
//! implementation's deadline fails with `Timeout` and is never retried here.
//!
//! Variable queries are expected to return the bare value (trimmed); the
//! transport normalizes whatever echo format the game uses.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("not connected to the game")]
    NotConnected,

    #[error("command timed out: {command}")]
    Timeout { command: String },

    #[error("transport failure: {message}")]
    Transport { message: String },
}

pub trait GameConsole: Send + Sync {
    /// Run a console command and return its textual response.
    fn run_command(&self, command: &str) -> Result<String, ConsoleError>;

    /// Whether the transport currently has a live connection.
    fn is_connected(&self) -> bool;

    /// Set a console variable.
    fn set_value(&self, variable: &str, value: &str) -> Result<(), ConsoleError> {
        self.run_command(&format!("{variable} {value}")).map(|_| ())
    }

    /// Print an informational line into the game console (and its log).
    fn set_info(&self, message: &str) -> Result<(), ConsoleError> {
        self.run_command(&format!("echo \"{message}\"")).map(|_| ())
    }
}

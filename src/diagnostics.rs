//! Non-fatal diagnostics emitted by the core when it falls back to a
//! conservative approximation for an unsupported IR shape.
//!
//! These never abort analysis; they are surfaced through `tracing` so a
//! CLI-level subscriber can filter them by `--verbose-level`, in place of
//! the original tool's hand-rolled ANSI color codes.

use std::fmt;

/// Severity of a diagnostic. `Warning` corresponds to the original's
/// yellow ("unsupported construct, conservative fallback used")
/// diagnostics; nothing in this analysis is ever `Error`-level, since
/// unsupported shapes degrade gracefully rather than abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticLevel::Info => write!(f, "info"),
            DiagnosticLevel::Warning => write!(f, "warning"),
        }
    }
}

/// One diagnostic message, logged via `tracing` at the matching level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic { level: DiagnosticLevel::Warning, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Diagnostic { level: DiagnosticLevel::Info, message: message.into() }
    }

    /// Route this diagnostic through `tracing` at its matching level.
    pub fn emit(&self) {
        match self.level {
            DiagnosticLevel::Warning => tracing::warn!(target: "mpi_race_detect", "{}", self.message),
            DiagnosticLevel::Info => tracing::info!(target: "mpi_race_detect", "{}", self.message),
        }
    }
}

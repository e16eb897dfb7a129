use std::time::Duration;

use thiserror::Error;

/// Failures inside one analysis strategy. None of these escape `analyze`;
/// the orchestrator turns them into `null` fields.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {}: {stderr}", .code.map_or("a signal".to_string(), |c| format!("code {c}")))]
    ProcessExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unparseable output: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{program}` did not finish within {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("decoder produced no samples")]
    NoSamples,
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

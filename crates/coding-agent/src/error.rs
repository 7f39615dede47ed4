use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("agent executable not found: {0}")]
    NotFound(String),

    #[error("Failed to parse agent result: {source}\n  output: {output}")]
    Parse {
        output: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("agent timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForemanError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("agent error: {0}")]
    Agent(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("graphql error: {0}")]
    GraphQl(String),

    #[error("another foreman run is already in progress{}", pid_suffix(.0))]
    AlreadyRunning(Option<u32>),

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ForemanError {
    fn from(e: reqwest::Error) -> Self {
        ForemanError::Http(e.to_string())
    }
}

fn pid_suffix(pid: &Option<u32>) -> String {
    pid.map(|p| format!(" (PID {p})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, ForemanError>;

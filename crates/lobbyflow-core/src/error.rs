use thiserror::Error;

#[derive(Debug, Error)]
pub enum LobbyflowError {
    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Workflow definition errors
    #[error("Workflow '{0}' has no start node")]
    MissingStartNode(String),

    #[error("Start node '{0}' not found in workflow")]
    StartNodeNotFound(String),

    #[error("Node '{from}' references unknown node '{to}'")]
    DanglingReference { from: String, to: String },

    // Handler errors
    #[error("Required field '{label}' is missing")]
    MissingRequiredField { label: String },

    #[error("Backend request failed: {0}")]
    Backend(String),

    // Traversal errors
    #[error("Node '{node}' visited more than {limit} times in one run")]
    VisitLimitExceeded { node: String, limit: usize },

    #[error("Invalid execution status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Workflow execution cancelled")]
    Cancelled,

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LobbyflowError {
    /// Whether this error is a definition problem caught before any handler runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::ConfigNotFound(_)
                | Self::MissingStartNode(_)
                | Self::StartNodeNotFound(_)
                | Self::DanglingReference { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LobbyflowError>;

pub mod config;
pub mod error;
pub mod execution;
pub mod traits;
pub mod workflow;

pub use config::AppConfig;
pub use error::{LobbyflowError, Result};
pub use execution::*;
pub use traits::{NotificationRequest, WorkflowBackend};
pub use workflow::*;

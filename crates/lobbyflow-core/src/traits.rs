use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::execution::{ExecutionContext, WorkflowExecution};
use crate::workflow::FormField;

/// Body of a notification delivery request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    #[serde(rename = "type")]
    pub notification_type: String,
    pub recipients: Vec<String>,
    pub template: String,
    pub context: ExecutionContext,
}

/// Remote collaborator consulted by the engine.
///
/// Notification delivery and form lookups happen mid-run; execution
/// persistence happens once a run is over.
pub trait WorkflowBackend: Send + Sync + 'static {
    /// Deliver a notification. Any error is treated as a delivery failure.
    fn send_notification(&self, request: NotificationRequest) -> BoxFuture<'_, Result<()>>;

    /// Fetch the field definitions of a stored form.
    fn fetch_form_fields(&self, form_id: String) -> BoxFuture<'_, Result<Vec<FormField>>>;

    /// Persist a finished execution record.
    fn save_execution(&self, execution: WorkflowExecution) -> BoxFuture<'_, Result<()>>;
}

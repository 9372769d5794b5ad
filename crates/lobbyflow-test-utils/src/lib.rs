//! Test fixtures: an in-memory [`WorkflowBackend`] and node builders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

use lobbyflow_core::error::{LobbyflowError, Result};
use lobbyflow_core::execution::WorkflowExecution;
use lobbyflow_core::traits::{NotificationRequest, WorkflowBackend};
use lobbyflow_core::workflow::*;

#[derive(Default)]
struct Recorded {
    notifications: Vec<NotificationRequest>,
    form_requests: Vec<String>,
    saved: Vec<WorkflowExecution>,
}

/// In-memory backend that records every call.
#[derive(Clone, Default)]
pub struct MockBackend {
    forms: HashMap<String, Vec<FormField>>,
    fail_notifications: bool,
    fail_saves: bool,
    notification_delay: Option<Duration>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `fields` for `GET /forms/{form_id}`.
    pub fn with_form(mut self, form_id: &str, fields: Vec<FormField>) -> Self {
        self.forms.insert(form_id.to_string(), fields);
        self
    }

    pub fn failing_notifications(mut self) -> Self {
        self.fail_notifications = true;
        self
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// Make every notification take `delay` before it is recorded.
    pub fn with_notification_delay(mut self, delay: Duration) -> Self {
        self.notification_delay = Some(delay);
        self
    }

    pub fn notifications(&self) -> Vec<NotificationRequest> {
        self.lock().notifications.clone()
    }

    pub fn form_requests(&self) -> Vec<String> {
        self.lock().form_requests.clone()
    }

    pub fn saved_executions(&self) -> Vec<WorkflowExecution> {
        self.lock().saved.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WorkflowBackend for MockBackend {
    fn send_notification(&self, request: NotificationRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if let Some(delay) = self.notification_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_notifications {
                return Err(LobbyflowError::Backend("connection refused".into()));
            }
            self.lock().notifications.push(request);
            Ok(())
        })
    }

    fn fetch_form_fields(&self, form_id: String) -> BoxFuture<'_, Result<Vec<FormField>>> {
        Box::pin(async move {
            self.lock().form_requests.push(form_id.clone());
            self.forms
                .get(&form_id)
                .cloned()
                .ok_or_else(|| LobbyflowError::Backend(format!("form {} not found", form_id)))
        })
    }

    fn save_execution(&self, execution: WorkflowExecution) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_saves {
                return Err(LobbyflowError::Backend("503 Service Unavailable".into()));
            }
            self.lock().saved.push(execution);
            Ok(())
        })
    }
}

/// A form node requiring each `(key, label)` pair.
pub fn form_node(id: &str, required: &[(&str, &str)]) -> WorkflowNode {
    let fields = required
        .iter()
        .map(|(key, label)| FormField::required(*key, *label))
        .collect();
    WorkflowNode::new(
        id,
        "Visitor form",
        NodeKind::Form(FormConfig {
            form_id: None,
            form_fields: fields,
        }),
    )
}

pub fn notification_node(id: &str) -> WorkflowNode {
    WorkflowNode::new(
        id,
        "Notify host",
        NodeKind::Notification(NotificationConfig {
            notification_type: "email".into(),
            recipients: vec!["host@example.com".into()],
            template: "visitor_arrived".into(),
        }),
    )
}

pub fn approval_node(id: &str) -> WorkflowNode {
    WorkflowNode::new(id, "Approve visit", NodeKind::Approval(ApprovalConfig::default()))
}

pub fn assignment_node(id: &str, assignee: &str) -> WorkflowNode {
    WorkflowNode::new(
        id,
        "Assign escort",
        NodeKind::Assignment(AssignmentConfig {
            assign_to: Some(assignee.to_string()),
            ..Default::default()
        }),
    )
}

pub fn delay_node(id: &str, millis: u64) -> WorkflowNode {
    WorkflowNode::new(
        id,
        "Wait",
        NodeKind::Delay(DelayConfig {
            delay_amount: millis as f64,
            delay_unit: DelayUnit::Milliseconds,
        }),
    )
}

pub fn condition_node(id: &str, logic: ConditionLogic, conditions: Vec<Condition>) -> WorkflowNode {
    WorkflowNode::new(
        id,
        "Branch",
        NodeKind::Condition(ConditionConfig {
            conditions,
            condition_logic: logic,
        }),
    )
}

/// `field == value` condition.
pub fn eq(field: &str, value: Value) -> Condition {
    Condition::new(field, ConditionOperator::Equals, value)
}

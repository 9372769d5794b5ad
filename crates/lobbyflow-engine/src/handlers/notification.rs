use serde_json::{json, Value};
use tracing::{info, warn};

use lobbyflow_core::execution::ExecutionContext;
use lobbyflow_core::traits::{NotificationRequest, WorkflowBackend};
use lobbyflow_core::workflow::NotificationConfig;

/// Deliver a notification through the backend.
///
/// Delivery failure never fails the run; it is reported in the output instead.
pub async fn run(
    config: &NotificationConfig,
    context: &ExecutionContext,
    backend: &dyn WorkflowBackend,
) -> Value {
    let request = NotificationRequest {
        notification_type: config.notification_type.clone(),
        recipients: config.recipients.clone(),
        template: config.template.clone(),
        context: context.clone(),
    };

    match backend.send_notification(request).await {
        Ok(()) => {
            info!(
                channel = %config.notification_type,
                recipients = config.recipients.len(),
                "Notification sent"
            );
            json!({
                "sent": true,
                "type": config.notification_type,
                "recipients": config.recipients,
            })
        }
        Err(e) => {
            warn!(error = %e, channel = %config.notification_type, "Notification failed");
            json!({ "error": "Notification failed" })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobbyflow_test_utils::MockBackend;

    fn config() -> NotificationConfig {
        NotificationConfig {
            notification_type: "email".into(),
            recipients: vec!["host@example.com".into()],
            template: "visitor_arrived".into(),
        }
    }

    #[tokio::test]
    async fn test_sends_request() {
        let backend = MockBackend::new();
        let ctx = ExecutionContext::new("kiosk").with_field("name", json!("Alice"));

        let out = run(&config(), &ctx, &backend).await;
        assert_eq!(out["sent"], true);

        let sent = backend.notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].notification_type, "email");
        assert_eq!(sent[0].template, "visitor_arrived");
        assert_eq!(sent[0].context.form_data["name"], json!("Alice"));
    }

    #[tokio::test]
    async fn test_failure_is_swallowed() {
        let backend = MockBackend::new().failing_notifications();
        let out = run(&config(), &ExecutionContext::default(), &backend).await;
        assert_eq!(out, json!({"error": "Notification failed"}));
    }
}

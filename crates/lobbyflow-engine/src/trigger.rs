use std::sync::Arc;

use futures::future::join_all;
use tracing::info;

use lobbyflow_core::error::Result;
use lobbyflow_core::execution::{ExecutionContext, WorkflowExecution};
use lobbyflow_core::traits::WorkflowBackend;
use lobbyflow_core::workflow::{TriggerType, Workflow};

use crate::executor::Executor;

/// Active workflows listening for `trigger`, in input order.
pub fn select_workflows(workflows: &[Workflow], trigger: TriggerType) -> Vec<&Workflow> {
    workflows.iter().filter(|wf| wf.accepts(trigger)).collect()
}

/// Outcome of one workflow run started by [`dispatch`].
pub struct DispatchOutcome {
    pub workflow_id: String,
    pub result: Result<WorkflowExecution>,
}

/// Start every workflow matching `trigger` as an independent run.
///
/// Each run gets its own copy of `context` and its own execution record.
/// When `save` is set, each record is persisted after its run ends.
pub async fn dispatch(
    workflows: &[Workflow],
    trigger: TriggerType,
    context: &ExecutionContext,
    backend: Arc<dyn WorkflowBackend>,
    max_node_visits: usize,
    save: bool,
) -> Vec<DispatchOutcome> {
    let matching = select_workflows(workflows, trigger);
    info!(trigger = %trigger, workflows = matching.len(), "Dispatching trigger");

    let runs = matching.into_iter().map(|wf| {
        let backend = backend.clone();
        async move {
            let workflow_id = wf.id.clone();
            let executor = match Executor::with_backend(wf.clone(), context.clone(), backend) {
                Ok(executor) => executor.with_max_node_visits(max_node_visits),
                Err(e) => {
                    return DispatchOutcome {
                        workflow_id,
                        result: Err(e),
                    }
                }
            };
            let result = executor.start().await;
            if save {
                executor.save_execution().await;
            }
            DispatchOutcome {
                workflow_id,
                result,
            }
        }
    });

    join_all(runs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobbyflow_core::execution::ExecutionStatus;
    use lobbyflow_core::workflow::WorkflowStatus;
    use lobbyflow_test_utils::{form_node, notification_node, MockBackend};
    use serde_json::json;

    fn workflows() -> Vec<Workflow> {
        vec![
            Workflow::new("greet", "Greet host")
                .with_status(WorkflowStatus::Active)
                .with_trigger(TriggerType::VisitorCheckin)
                .with_node(notification_node("n1")),
            Workflow::new("badge", "Badge check")
                .with_status(WorkflowStatus::Active)
                .with_trigger(TriggerType::VisitorCheckin)
                .with_node(form_node("f1", &[("badge", "Badge number")])),
            Workflow::new("draft", "Draft")
                .with_trigger(TriggerType::VisitorCheckin)
                .with_node(notification_node("n1")),
            Workflow::new("bye", "Checkout")
                .with_status(WorkflowStatus::Active)
                .with_trigger(TriggerType::VisitorCheckout)
                .with_node(notification_node("n1")),
        ]
    }

    #[test]
    fn test_select_workflows() {
        let all = workflows();
        let ids: Vec<&str> = select_workflows(&all, TriggerType::VisitorCheckin)
            .iter()
            .map(|wf| wf.id.as_str())
            .collect();
        assert_eq!(ids, vec!["greet", "badge"]);
        assert!(select_workflows(&all, TriggerType::Api).is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_runs_independently() {
        let backend = MockBackend::new();
        let ctx = ExecutionContext::new("kiosk").with_field("name", json!("Alice"));

        let outcomes = dispatch(
            &workflows(),
            TriggerType::VisitorCheckin,
            &ctx,
            Arc::new(backend.clone()),
            5,
            true,
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        let greet = outcomes.iter().find(|o| o.workflow_id == "greet").unwrap();
        assert_eq!(
            greet.result.as_ref().unwrap().status,
            ExecutionStatus::Completed
        );
        let badge = outcomes.iter().find(|o| o.workflow_id == "badge").unwrap();
        assert!(badge.result.is_err());

        let saved = backend.saved_executions();
        assert_eq!(saved.len(), 2);
        assert_ne!(saved[0].id, saved[1].id);
        assert_eq!(backend.notifications().len(), 1);
    }
}

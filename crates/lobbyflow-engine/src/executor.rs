use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use lobbyflow_core::config::BackendConfig;
use lobbyflow_core::error::{LobbyflowError, Result};
use lobbyflow_core::execution::{
    ExecutionContext, ExecutionHistory, ExecutionStatus, WorkflowExecution,
};
use lobbyflow_core::traits::WorkflowBackend;
use lobbyflow_core::workflow::{NodeKind, Workflow, WorkflowNode};

use crate::backend::HttpBackend;
use crate::condition;
use crate::handlers::{self, NodeOutput};

/// Called after each node that completes successfully.
pub type NodeCompletedHandler = Box<dyn Fn(&WorkflowNode, &ExecutionHistory) + Send + Sync>;

/// Called once when a run completes successfully.
pub type WorkflowCompletedHandler = Box<dyn Fn(&WorkflowExecution) + Send + Sync>;

const DEFAULT_MAX_NODE_VISITS: usize = 5;

/// Mutable per-run state, guarded by one lock.
struct RunState {
    execution: WorkflowExecution,
    visits: HashMap<String, usize>,
}

/// Executes one run of one workflow.
///
/// Starting from the start node, each node's handler runs against a snapshot
/// of the context, one history entry is recorded, and the successors run
/// concurrently. The first handler failure cancels the branches still in
/// flight; their nodes are recorded as `skipped` and the rest of the graph is
/// never visited. Side effects that already happened stay.
pub struct Executor {
    workflow: Workflow,
    backend: Arc<dyn WorkflowBackend>,
    state: Mutex<RunState>,
    execution_id: String,
    max_node_visits: usize,
    /// Host-facing cancellation.
    cancel: CancellationToken,
    /// Cancelled on the first branch failure or when `cancel` fires.
    abort: CancellationToken,
    on_node_completed: Option<NodeCompletedHandler>,
    on_workflow_completed: Option<WorkflowCompletedHandler>,
}

impl Executor {
    /// Bind a workflow and context to a fresh run talking to `server_url`.
    ///
    /// Fails if the workflow has no start node. No I/O happens here.
    pub fn new(
        workflow: Workflow,
        context: ExecutionContext,
        server_url: impl Into<String>,
        auth_token: Option<String>,
    ) -> Result<Self> {
        let config = BackendConfig {
            auth_token,
            ..BackendConfig::new(server_url)
        };
        let backend = Arc::new(HttpBackend::new(&config)?);
        Self::with_backend(workflow, context, backend)
    }

    /// Like [`Executor::new`] but with an explicit backend.
    pub fn with_backend(
        workflow: Workflow,
        context: ExecutionContext,
        backend: Arc<dyn WorkflowBackend>,
    ) -> Result<Self> {
        if workflow.start_node_id.is_empty() {
            return Err(LobbyflowError::MissingStartNode(workflow.id.clone()));
        }

        let execution = WorkflowExecution::new(workflow.id.clone(), context);
        let execution_id = execution.id.clone();
        let cancel = CancellationToken::new();
        let abort = cancel.child_token();

        Ok(Self {
            workflow,
            backend,
            state: Mutex::new(RunState {
                execution,
                visits: HashMap::new(),
            }),
            execution_id,
            max_node_visits: DEFAULT_MAX_NODE_VISITS,
            cancel,
            abort,
            on_node_completed: None,
            on_workflow_completed: None,
        })
    }

    /// Limit how often a single node may be reached in one run.
    pub fn with_max_node_visits(mut self, limit: usize) -> Self {
        self.max_node_visits = limit.max(1);
        self
    }

    pub fn on_node_completed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WorkflowNode, &ExecutionHistory) + Send + Sync + 'static,
    {
        self.on_node_completed = Some(Box::new(handler));
        self
    }

    pub fn on_workflow_completed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&WorkflowExecution) + Send + Sync + 'static,
    {
        self.on_workflow_completed = Some(Box::new(handler));
        self
    }

    /// Token the host can cancel to stop the run. The run then ends as `cancelled`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Snapshot of the execution record.
    pub async fn execution(&self) -> WorkflowExecution {
        self.state.lock().await.execution.clone()
    }

    /// Run the workflow to completion and return the final record.
    ///
    /// On failure the error is returned and the record (see
    /// [`Executor::execution`]) is left in status `failed` or `cancelled`.
    pub async fn start(&self) -> Result<WorkflowExecution> {
        self.state
            .lock()
            .await
            .execution
            .transition(ExecutionStatus::InProgress)?;

        info!(
            workflow_id = %self.workflow.id,
            execution_id = %self.execution_id,
            "Starting workflow run"
        );

        let outcome = match self.resolve_start() {
            Ok(start) => self.execute_node(start).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                let execution = self.finish(ExecutionStatus::Completed).await?;
                info!(
                    execution_id = %self.execution_id,
                    nodes = execution.history.len(),
                    "Workflow run completed"
                );
                if let Some(handler) = &self.on_workflow_completed {
                    handler(&execution);
                }
                Ok(execution)
            }
            Err(LobbyflowError::Cancelled) => {
                self.finish(ExecutionStatus::Cancelled).await?;
                warn!(execution_id = %self.execution_id, "Workflow run cancelled");
                Err(LobbyflowError::Cancelled)
            }
            Err(e) => {
                self.finish(ExecutionStatus::Failed).await?;
                error!(execution_id = %self.execution_id, error = %e, "Workflow run failed");
                Err(e)
            }
        }
    }

    /// Persist the execution record. Failures are logged and never retried.
    pub async fn save_execution(&self) {
        let execution = self.execution().await;
        match self.backend.save_execution(execution).await {
            Ok(()) => debug!(execution_id = %self.execution_id, "Execution saved"),
            Err(e) => warn!(
                execution_id = %self.execution_id,
                error = %e,
                "Failed to save execution"
            ),
        }
    }

    fn resolve_start(&self) -> Result<&WorkflowNode> {
        self.workflow.validate()?;
        self.workflow
            .node(&self.workflow.start_node_id)
            .ok_or_else(|| LobbyflowError::StartNodeNotFound(self.workflow.start_node_id.clone()))
    }

    async fn finish(&self, status: ExecutionStatus) -> Result<WorkflowExecution> {
        let mut state = self.state.lock().await;
        state.execution.transition(status)?;
        Ok(state.execution.clone())
    }

    fn execute_node<'a>(&'a self, node: &'a WorkflowNode) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            // Unvisited remainder of an aborted run.
            if self.abort.is_cancelled() {
                return Err(LobbyflowError::Cancelled);
            }

            let started_at = Utc::now();
            let snapshot = {
                let mut state = self.state.lock().await;
                let visits = state.visits.entry(node.id.clone()).or_insert(0);
                *visits += 1;
                if *visits > self.max_node_visits {
                    let err = LobbyflowError::VisitLimitExceeded {
                        node: node.id.clone(),
                        limit: self.max_node_visits,
                    };
                    state
                        .execution
                        .record(ExecutionHistory::failed(&node.id, started_at, err.to_string()));
                    self.abort.cancel();
                    return Err(err);
                }
                state.execution.current_node_id = Some(node.id.clone());
                state.execution.context.clone()
            };

            info!(
                node_id = %node.id,
                node_type = node.type_name(),
                node_name = %node.name,
                "Executing workflow node"
            );

            let result = tokio::select! {
                biased;
                _ = self.abort.cancelled() => None,
                r = handlers::dispatch(node, &snapshot, self.backend.as_ref()) => Some(r),
            };

            let output = match result {
                Some(Ok(output)) => output,
                Some(Err(e)) => {
                    error!(node_id = %node.id, error = %e, "Workflow node failed");
                    self.state
                        .lock()
                        .await
                        .execution
                        .record(ExecutionHistory::failed(&node.id, started_at, e.to_string()));
                    self.abort.cancel();
                    return Err(e);
                }
                None => {
                    debug!(node_id = %node.id, "Workflow node interrupted");
                    self.state.lock().await.execution.record(ExecutionHistory::skipped(
                        &node.id,
                        started_at,
                        "cancelled before completion".into(),
                    ));
                    return Err(LobbyflowError::Cancelled);
                }
            };

            let entry = ExecutionHistory::success(&node.id, started_at, output.payload.clone());
            {
                let mut state = self.state.lock().await;
                state
                    .execution
                    .context
                    .set_variable(node.id.clone(), output.payload.clone());
                state.execution.record(entry.clone());
            }

            if let Some(handler) = &self.on_node_completed {
                handler(node, &entry);
            }

            let successors = self.successors(node, &output)?;
            if successors.is_empty() {
                debug!(node_id = %node.id, "No successors, branch complete");
                return Ok(());
            }

            let branches = successors.into_iter().map(|next| self.execute_node(next));
            merge_branch_results(join_all(branches).await)
        })
    }

    fn successors<'a>(
        &'a self,
        node: &'a WorkflowNode,
        output: &NodeOutput,
    ) -> Result<Vec<&'a WorkflowNode>> {
        select_successors(&self.workflow, node, output.branch_scope.as_ref())
            .into_iter()
            .map(|id| {
                self.workflow
                    .node(id)
                    .ok_or_else(|| LobbyflowError::DanglingReference {
                        from: node.id.clone(),
                        to: id.to_string(),
                    })
            })
            .collect()
    }
}

/// Successor ids of `node`.
///
/// Non-condition nodes use their `nextNodes` as-is. A condition node takes the
/// first outgoing connection, in list order, whose guard holds against
/// `scope`; unguarded connections are not candidates. Failing that it falls
/// back to its first `nextNodes` entry, or ends the branch.
pub fn select_successors<'a>(
    workflow: &'a Workflow,
    node: &'a WorkflowNode,
    scope: Option<&Map<String, Value>>,
) -> Vec<&'a str> {
    if !matches!(node.kind, NodeKind::Condition(_)) {
        return node.next_nodes.iter().map(String::as_str).collect();
    }

    let empty = Map::new();
    let scope = scope.unwrap_or(&empty);

    workflow
        .outgoing(&node.id)
        .find(|conn| {
            conn.condition
                .as_ref()
                .is_some_and(|guard| condition::evaluate(guard, scope))
        })
        .map(|conn| conn.to_node.as_str())
        .or_else(|| node.next_nodes.first().map(String::as_str))
        .into_iter()
        .collect()
}

/// First real failure wins; otherwise a cancelled branch cancels the parent.
fn merge_branch_results(results: Vec<Result<()>>) -> Result<()> {
    let mut cancelled = false;
    for result in results {
        match result {
            Ok(()) => {}
            Err(LobbyflowError::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }
    if cancelled {
        Err(LobbyflowError::Cancelled)
    } else {
        Ok(())
    }
}

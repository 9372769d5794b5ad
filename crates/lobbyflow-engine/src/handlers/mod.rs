//! Per-type node execution.
//!
//! [`dispatch`] matches on the node kind, so a new node type does not compile
//! until it has a handler here.

pub mod approval;
pub mod assignment;
pub mod condition;
pub mod delay;
pub mod form;
pub mod notification;

use serde_json::{Map, Value};

use lobbyflow_core::error::Result;
use lobbyflow_core::execution::ExecutionContext;
use lobbyflow_core::traits::WorkflowBackend;
use lobbyflow_core::workflow::{NodeKind, WorkflowNode};

/// What a handler hands back to the executor.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    /// Recorded in the node's history entry.
    pub payload: Value,
    /// Field map that connection guards are evaluated against.
    /// Only condition nodes produce one.
    pub branch_scope: Option<Map<String, Value>>,
}

impl NodeOutput {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            branch_scope: None,
        }
    }
}

/// Run the handler for `node` against a snapshot of the run context.
pub async fn dispatch(
    node: &WorkflowNode,
    context: &ExecutionContext,
    backend: &dyn WorkflowBackend,
) -> Result<NodeOutput> {
    match &node.kind {
        NodeKind::Form(cfg) => form::run(cfg, context, backend).await.map(NodeOutput::new),
        NodeKind::Approval(cfg) => Ok(NodeOutput::new(approval::run(cfg))),
        NodeKind::Condition(cfg) => Ok(condition::run(cfg, context)),
        NodeKind::Notification(cfg) => Ok(NodeOutput::new(
            notification::run(cfg, context, backend).await,
        )),
        NodeKind::Delay(cfg) => Ok(NodeOutput::new(delay::run(cfg).await)),
        NodeKind::Assignment(cfg) => Ok(NodeOutput::new(assignment::run(cfg))),
    }
}

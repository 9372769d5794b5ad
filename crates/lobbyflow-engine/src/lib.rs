//! Workflow execution engine.
//!
//! A [`Workflow`](lobbyflow_core::Workflow) is a graph of typed nodes. The
//! [`Executor`] walks it from the start node, runs each node's handler,
//! picks successors (guarded connections for condition nodes, `nextNodes`
//! for everything else), fans out concurrently and records one history
//! entry per visit.

pub mod backend;
pub mod condition;
pub mod executor;
pub mod handlers;
pub mod trigger;

pub use backend::HttpBackend;
pub use condition::{evaluate, evaluate_all, ConditionOutcome};
pub use executor::{select_successors, Executor, NodeCompletedHandler, WorkflowCompletedHandler};
pub use trigger::{dispatch, select_workflows, DispatchOutcome};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use lobbyflow_core::workflow::ApprovalConfig;

/// Approval gate. With no approval channel wired in, every request is approved
/// by the system.
pub fn run(config: &ApprovalConfig) -> Value {
    debug!(approvers = config.approvers.len(), "Auto-approving");
    json!({
        "approved": true,
        "approvedBy": "system",
        "approvedAt": Utc::now(),
    })
}

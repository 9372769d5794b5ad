use chrono::Utc;
use serde_json::{json, Value};

use lobbyflow_core::workflow::{AssignmentConfig, AssignmentType};

/// Record who the visitor is assigned to. Nothing outside the run is contacted.
pub fn run(config: &AssignmentConfig) -> Value {
    let target = match config.assignment_type {
        AssignmentType::User => config.assign_to.as_deref(),
        AssignmentType::Role => config.role.as_deref().or(config.assign_to.as_deref()),
        AssignmentType::LoadBalance => config.strategy.as_deref().or(Some("round_robin")),
    };

    json!({
        "assignedTo": target.unwrap_or("unassigned"),
        "assignmentType": config.assignment_type,
        "assignedAt": Utc::now(),
    })
}

use serde_json::Value;

use lobbyflow_core::execution::ExecutionContext;
use lobbyflow_core::workflow::ConditionConfig;

use super::NodeOutput;
use crate::condition::evaluate_all;

/// Key under which the combined result is visible to connection guards.
pub const PASSED_KEY: &str = "passed";

/// Evaluate the node's conditions against the form data.
///
/// Guards on outgoing connections later see the form fields plus `passed`.
pub fn run(config: &ConditionConfig, context: &ExecutionContext) -> NodeOutput {
    let outcome = evaluate_all(&config.conditions, config.condition_logic, &context.form_data);

    let mut scope = context.form_data.clone();
    scope.insert(PASSED_KEY.to_string(), Value::Bool(outcome.passed));

    NodeOutput {
        payload: serde_json::to_value(&outcome).unwrap_or(Value::Null),
        branch_scope: Some(scope),
    }
}

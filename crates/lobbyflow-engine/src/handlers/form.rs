use serde_json::Value;
use tracing::debug;

use lobbyflow_core::error::{LobbyflowError, Result};
use lobbyflow_core::execution::ExecutionContext;
use lobbyflow_core::traits::WorkflowBackend;
use lobbyflow_core::workflow::{FormConfig, FormField};

use crate::condition::is_empty;

/// Check the collected form data against the form's required fields.
///
/// Inline `formFields` win; otherwise the definition named by `formId` is
/// fetched from the backend. Returns the form data unchanged.
pub async fn run(
    config: &FormConfig,
    context: &ExecutionContext,
    backend: &dyn WorkflowBackend,
) -> Result<Value> {
    let fields: Vec<FormField> = match (&config.form_fields, &config.form_id) {
        (inline, _) if !inline.is_empty() => inline.clone(),
        (_, Some(form_id)) => {
            debug!(form_id = %form_id, "Fetching form definition");
            backend.fetch_form_fields(form_id.clone()).await?
        }
        _ => vec![],
    };

    for field in fields.iter().filter(|f| f.required) {
        if is_empty(context.field(&field.name)) {
            return Err(LobbyflowError::MissingRequiredField {
                label: field.display_label().to_string(),
            });
        }
    }

    Ok(Value::Object(context.form_data.clone()))
}

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use lobbyflow_core::workflow::DelayConfig;

/// Sleep for the configured duration.
pub async fn run(config: &DelayConfig) -> Value {
    let ms = config.as_millis();
    debug!(delay_ms = ms, "Delaying");
    tokio::time::sleep(Duration::from_millis(ms)).await;
    json!({ "delayed": ms })
}

use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use lobbyflow_core::config::BackendConfig;
use lobbyflow_core::error::{LobbyflowError, Result};
use lobbyflow_core::execution::WorkflowExecution;
use lobbyflow_core::traits::{NotificationRequest, WorkflowBackend};
use lobbyflow_core::workflow::FormField;

/// Header carrying the device token on every backend request.
pub const DEVICE_TOKEN_HEADER: &str = "X-Device-Token";

/// REST backend client.
///
/// - `POST {server}/notifications`
/// - `GET {server}/forms/{id}`
/// - `POST {server}/workflow-executions`
pub struct HttpBackend {
    client: reqwest::Client,
    server_url: String,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct FormDefinition {
    #[serde(default)]
    fields: Vec<FormField>,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("Lobbyflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LobbyflowError::Backend(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server_url: config.server_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.server_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.header(DEVICE_TOKEN_HEADER, token),
            None => req,
        }
    }

    async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let url = self.url(path);
        debug!(url = %url, "POST");

        self.authorize(self.client.post(&url))
            .json(body)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| LobbyflowError::Backend(format!("POST {}: {}", url, e)))?;
        Ok(())
    }
}

impl WorkflowBackend for HttpBackend {
    fn send_notification(&self, request: NotificationRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.post_json("notifications", &request).await })
    }

    fn fetch_form_fields(&self, form_id: String) -> BoxFuture<'_, Result<Vec<FormField>>> {
        Box::pin(async move {
            let url = self.url(&format!("forms/{}", form_id));
            debug!(url = %url, "GET");

            let form: FormDefinition = self
                .authorize(self.client.get(&url))
                .send()
                .await
                .and_then(|resp| resp.error_for_status())
                .map_err(|e| LobbyflowError::Backend(format!("GET {}: {}", url, e)))?
                .json()
                .await
                .map_err(|e| LobbyflowError::Backend(format!("Invalid form definition: {}", e)))?;

            Ok(form.fields)
        })
    }

    fn save_execution(&self, execution: WorkflowExecution) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move { self.post_json("workflow-executions", &execution).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_trims_trailing_slash() {
        let backend = HttpBackend::new(&BackendConfig::new("https://api.example.com/")).unwrap();
        assert_eq!(backend.url("notifications"), "https://api.example.com/notifications");
    }
}

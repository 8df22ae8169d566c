//! Action collaborator dispatch (spec §6)
//!
//! Action collaborators are injected, out-of-scope implementations: each
//! exposes `execute(action, event) -> {success, data?, rollback_data?}` or
//! throws. A recognized error with `code = "TOKEN_EXPIRED"` triggers the
//! refresh-and-retry path in the executor.

use async_trait::async_trait;
use serde_json::Value;
use shared::models::Action;

use crate::error::{WorkerError, WorkerResult};

/// Outcome of one collaborator invocation.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub data: Option<Value>,
    /// Opaque state the forward action hands back so a later compensation
    /// (rollback) dispatch can undo it.
    pub rollback_data: Option<Value>,
}

/// Abstract action-dispatch interface for testability, mirroring the
/// trait-for-testability shape used by the bus's job queue.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn execute(&self, action: &Action, config: &Value) -> WorkerResult<DispatchOutcome>;
}

/// HTTP-backed collaborator. Handles the action types whose contract is a
/// simple signed/unsigned JSON HTTP call (`send_webhook`, `update_crm`,
/// `create_task`, `trigger_workflow`, `custom`, and the synthetic
/// `rollback`). `send_email`/`send_sms` have no HTTP contract in scope and
/// are logged as a no-op success, matching the non-goal on outer-surface
/// notification providers.
pub struct HttpActionDispatcher {
    client: reqwest::Client,
}

impl HttpActionDispatcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionDispatcher for HttpActionDispatcher {
    async fn execute(&self, action: &Action, config: &Value) -> WorkerResult<DispatchOutcome> {
        let action_type = action.action_type();

        use shared::models::ActionType;
        match action_type {
            ActionType::SendEmail | ActionType::SendSms => {
                tracing::info!(action_id = %action.id, action_type = %action_type, "no-op dispatch for out-of-scope notification provider");
                Ok(DispatchOutcome { data: None, rollback_data: None })
            }
            ActionType::SendWebhook
            | ActionType::UpdateCrm
            | ActionType::CreateTask
            | ActionType::TriggerWorkflow
            | ActionType::Custom
            | ActionType::Rollback => self.dispatch_http(config).await,
        }
    }
}

impl HttpActionDispatcher {
    async fn dispatch_http(&self, config: &Value) -> WorkerResult<DispatchOutcome> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| WorkerError::invalid_config("action config missing 'url'"))?;
        let method = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("POST")
            .to_uppercase();
        let body = config.get("body").cloned().unwrap_or(Value::Null);

        let request = self
            .client
            .request(
                method
                    .parse()
                    .map_err(|_| WorkerError::invalid_config(format!("invalid method '{}'", method)))?,
                url,
            )
            .json(&body);

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();

        if status.is_success() {
            let data = response.json::<Value>().await.ok();
            return Ok(DispatchOutcome { data, rollback_data: extract_rollback_data(&data) });
        }

        if let Some(code) = response
            .headers()
            .get("X-Error-Code")
            .and_then(|v| v.to_str().ok())
        {
            if code == "TOKEN_EXPIRED" {
                return Err(WorkerError::token_expired("collaborator reported TOKEN_EXPIRED"));
            }
        }

        let body_text = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(WorkerError::integration(format!("{}: {}", status, body_text)))
        } else {
            Err(WorkerError::transport(format!("{}: {}", status, body_text)))
        }
    }
}

fn extract_rollback_data(data: &Option<Value>) -> Option<Value> {
    data.as_ref()
        .and_then(|v| v.get("rollback_data"))
        .cloned()
}

fn classify_reqwest_error(e: reqwest::Error) -> WorkerError {
    if e.is_timeout() {
        WorkerError::timeout(e.to_string())
    } else {
        WorkerError::transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;
    use serde_json::json;
    use shared::models::{Action, ActionType};

    mock! {
        pub ActionDispatcher {}

        #[async_trait]
        impl ActionDispatcher for ActionDispatcher {
            async fn execute(&self, action: &Action, config: &Value) -> WorkerResult<DispatchOutcome>;
        }
    }

    fn test_action(action_type: ActionType) -> Action {
        Action {
            id: "action-1".to_string(),
            trigger_id: "trigger-1".to_string(),
            action_type: action_type.to_string(),
            order: 0,
            config: json!({"url": "http://example.test/w"}),
            retry_config: json!({"max_attempts": 3, "backoff_multiplier": 2.0, "initial_delay_ms": 10}),
            timeout_ms: 5000,
            is_critical: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mock_dispatcher_success() {
        let mut mock = MockActionDispatcher::new();
        mock.expect_execute()
            .times(1)
            .returning(|_, _| Ok(DispatchOutcome { data: Some(json!({"ok": true})), rollback_data: None }));

        let action = test_action(ActionType::SendWebhook);
        let outcome = mock.execute(&action, &action.config.clone()).await.unwrap();
        assert_eq!(outcome.data, Some(json!({"ok": true})));
    }

    #[test]
    fn test_extract_rollback_data_present() {
        let data = Some(json!({"rollback_data": {"id": "A"}}));
        assert_eq!(extract_rollback_data(&data), Some(json!({"id": "A"})));
    }

    #[test]
    fn test_extract_rollback_data_absent() {
        let data = Some(json!({"other": 1}));
        assert_eq!(extract_rollback_data(&data), None);
    }
}

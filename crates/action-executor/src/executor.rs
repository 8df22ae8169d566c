//! Action Chain Executor (spec §4.F)
//!
//! Loads a trigger's actions, runs them strictly sequentially in
//! `(order, id)`, and — on failure under `rollback_on_error` — unwinds
//! the critical actions that already succeeded.

use chrono::Utc;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use shared::models::{Action, ActionExecution, ActionType, ErrorHandling, Trigger};
use shared::observability::{instrument_result, should_sample};

use crate::dispatcher::{ActionDispatcher, DispatchOutcome};
use crate::dlq::Dlq;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry;
use crate::template::interpolate;

/// One action that ran forward, kept around for possible compensation.
struct Executed {
    action: Action,
    outcome: DispatchOutcome,
}

pub struct ChainExecutor {
    pool: PgPool,
    dispatcher: Arc<dyn ActionDispatcher>,
    dlq: Arc<Dlq>,
    sample_rate: f64,
}

impl ChainExecutor {
    pub fn new(pool: PgPool, dispatcher: Arc<dyn ActionDispatcher>, dlq: Arc<Dlq>, sample_rate: f64) -> Self {
        Self { pool, dispatcher, dlq, sample_rate }
    }

    pub async fn execute_chain(&self, event_id: &str, event_data: &Value, trigger: &Trigger) -> WorkerResult<()> {
        let actions = self.load_actions(&trigger.id).await?;

        let sampled = should_sample("action_chain_execution", false, self.sample_rate, event_id);
        let span = if sampled {
            tracing::info_span!(
                "action_chain_execution",
                trigger_id = %trigger.id,
                event_id,
                action_count = actions.len(),
                "otel.status_code" = tracing::field::Empty,
                error = tracing::field::Empty,
                "error.message" = tracing::field::Empty,
            )
        } else {
            tracing::Span::none()
        };

        instrument_result(span, async {
            let mut executed: Vec<Executed> = Vec::new();

            for action in actions {
                match self.execute_action(event_id, event_data, trigger, &action).await {
                    Ok(outcome) => executed.push(Executed { action, outcome }),
                    Err(e) => {
                        return match trigger.error_handling() {
                            ErrorHandling::StopOnFirstError => Err(e),
                            ErrorHandling::ContinueOnError => {
                                tracing::warn!(action_id = %action.id, error = %e.safe_message(), "action failed, continuing chain");
                                continue;
                            }
                            ErrorHandling::RollbackOnError => {
                                self.compensate(event_id, event_data, &executed).await;
                                Err(e)
                            }
                        };
                    }
                }
            }

            Ok(())
        })
        .await
    }

    /// Runs the attempt loop for a single action, including the
    /// TOKEN_EXPIRED refresh-without-counting special case. Returns the
    /// forward dispatch outcome on success (for potential compensation).
    async fn execute_action(
        &self,
        event_id: &str,
        event_data: &Value,
        trigger: &Trigger,
        action: &Action,
    ) -> WorkerResult<DispatchOutcome> {
        let action_type = action.action_type();
        let retry_config = action.retry_config();
        let config = interpolate(&action.config, event_data);

        // "action.execute" is in the always-sampled set; should_sample still
        // gates it so the decision stays data-driven if that set changes.
        let sampled = should_sample("action.execute", false, self.sample_rate, &action.id);
        let span = if sampled {
            tracing::info_span!(
                "action.execute",
                action_type = %action_type,
                "otel.status_code" = tracing::field::Empty,
                error = tracing::field::Empty,
                "error.message" = tracing::field::Empty,
            )
        } else {
            tracing::Span::none()
        };

        instrument_result(span, async {
            let mut attempt = 1u32;
            let mut token_refreshed = false;

            loop {
                let execution_id = self.start_execution(event_id, &trigger.id, &action.id, attempt as i32).await?;

                let started = Instant::now();
                let dispatch = tokio::time::timeout(
                    Duration::from_millis(action.timeout_ms as u64),
                    self.dispatcher.execute(action, &config),
                )
                .await;

                let result = match dispatch {
                    Ok(inner) => inner,
                    Err(_) => Err(WorkerError::timeout(format!("action {} exceeded timeout_ms={}", action.id, action.timeout_ms))),
                };

                metrics::observe_action_duration(&action_type.to_string(), started.elapsed().as_secs_f64());

                match result {
                    Ok(outcome) => {
                        metrics::record_action_execution(&action_type.to_string(), "success");
                        self.complete_execution(&execution_id, "success", outcome.data.clone(), None).await?;
                        return Ok(outcome);
                    }
                    Err(WorkerError::TokenExpired(_)) if !token_refreshed => {
                        tracing::info!(action_id = %action.id, "collaborator token expired, refreshing and retrying without counting attempt");
                        token_refreshed = true;
                        continue;
                    }
                    Err(e) => {
                        metrics::record_action_execution(&action_type.to_string(), "failed");
                        self.complete_execution(&execution_id, "failed", None, Some(e.safe_message())).await?;

                        if !e.is_retryable() {
                            self.send_to_dlq(event_id, trigger, action, event_data, "not retryable", &e.safe_message(), None).await;
                            return Err(e);
                        }

                        if retry::should_retry(&retry_config, attempt) {
                            metrics::record_retry(&action_type.to_string());
                            tokio::time::sleep(retry::delay_for_attempt(&retry_config, attempt)).await;
                            attempt += 1;
                            continue;
                        }

                        self.send_to_dlq(event_id, trigger, action, event_data, "Max retry attempts exceeded", &e.safe_message(), None).await;
                        return Err(e);
                    }
                }
            }
        })
        .await
    }

    /// Unwinds critical actions that already succeeded, newest first.
    /// Compensation errors are recorded to the DLQ for manual triage but
    /// never abort the remaining walk.
    async fn compensate(&self, event_id: &str, event_data: &Value, executed: &[Executed]) {
        for item in executed.iter().rev().filter(|e| e.action.is_critical) {
            let operation = item.action.rollback_operation();
            let mut config = item.action.config.clone();
            if let Value::Object(ref mut map) = config {
                if let Some(op) = &operation {
                    map.insert("operation".to_string(), Value::String(op.clone()));
                }
                if let Some(rollback_data) = &item.outcome.rollback_data {
                    map.insert("rollback_data".to_string(), rollback_data.clone());
                }
            }
            let config = interpolate(&config, event_data);

            let rollback_action = Action { action_type: ActionType::Rollback.to_string(), config: config.clone(), ..item.action.clone() };

            metrics::record_compensation(&item.action.action_type().to_string());
            if let Err(e) = self.dispatcher.execute(&rollback_action, &config).await {
                tracing::error!(action_id = %item.action.id, error = %e.safe_message(), "compensation failed, recording to DLQ");
                self.send_to_dlq(event_id, item.action.trigger_id.as_str(), &item.action, event_data, "compensation failed", &e.safe_message(), None)
                    .await;
            }
        }
    }

    pub async fn load_trigger(&self, trigger_id: &str) -> WorkerResult<Trigger> {
        sqlx::query_as::<_, Trigger>("SELECT * FROM event_triggers WHERE id = $1")
            .bind(trigger_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(WorkerError::Database)?
            .ok_or_else(|| WorkerError::invalid_config(format!("trigger {} not found", trigger_id)))
    }

    async fn load_actions(&self, trigger_id: &str) -> WorkerResult<Vec<Action>> {
        sqlx::query_as::<_, Action>(
            "SELECT * FROM trigger_actions WHERE trigger_id = $1 ORDER BY \"order\" ASC, id ASC",
        )
        .bind(trigger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(WorkerError::Database)
    }

    /// Inserts the one `action_executions` row for this attempt with
    /// `status='running'` and returns its id so the attempt's terminal
    /// outcome can be written back onto the same row.
    async fn start_execution(
        &self,
        event_id: &str,
        trigger_id: &str,
        action_id: &str,
        attempt: i32,
    ) -> WorkerResult<String> {
        let execution = sqlx::query_as::<_, ActionExecution>(
            r#"
            INSERT INTO action_executions (id, event_id, trigger_id, action_id, status, attempt, started_at, completed_at, response, error, created_at)
            VALUES (gen_random_uuid()::text, $1, $2, $3, 'running', $4, now(), NULL, NULL, NULL, now())
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(trigger_id)
        .bind(action_id)
        .bind(attempt)
        .fetch_one(&self.pool)
        .await
        .map_err(WorkerError::Database)?;
        Ok(execution.id)
    }

    /// Updates the attempt's existing row in place with its terminal status.
    async fn complete_execution(
        &self,
        execution_id: &str,
        status: &str,
        response: Option<Value>,
        error: Option<String>,
    ) -> WorkerResult<()> {
        sqlx::query(
            r#"
            UPDATE action_executions
            SET status = $2, completed_at = now(), response = $3, error = $4
            WHERE id = $1
            "#,
        )
        .bind(execution_id)
        .bind(status)
        .bind(response)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(WorkerError::Database)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn send_to_dlq(
        &self,
        event_id: &str,
        trigger: &dyn TriggerIdLike,
        action: &Action,
        event_data: &Value,
        reason: &str,
        last_error: &str,
        retry_after: Option<chrono::DateTime<Utc>>,
    ) {
        let action_snapshot = serde_json::to_value(action).unwrap_or(Value::Null);
        if let Err(e) = self
            .dlq
            .add(event_id, trigger.trigger_id(), &action.id, reason, last_error, event_data.clone(), action_snapshot, retry_after)
            .await
        {
            tracing::error!(error = %e.safe_message(), "failed to write DLQ entry");
        }
    }
}

/// Lets `send_to_dlq` accept either a `&Trigger` or a bare `&str` trigger id
/// (the compensation path only has the originating action's `trigger_id`).
trait TriggerIdLike {
    fn trigger_id(&self) -> &str;
}

impl TriggerIdLike for Trigger {
    fn trigger_id(&self) -> &str {
        &self.id
    }
}

impl TriggerIdLike for str {
    fn trigger_id(&self) -> &str {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executed_struct_is_private_to_module() {
        // compile-time check that Executed is constructible within the module
        let _ = std::mem::size_of::<Executed>();
    }
}

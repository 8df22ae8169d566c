//! Domain models for the event-trigger orchestration core
//!
//! These mirror the PostgreSQL schema backing the event bus, trigger
//! matcher, action executor and dead-letter queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

/// Processing state of an `Event` as it moves through the bus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingMode {
    Broadcast,
    Poll,
    Completed,
    Failed,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessingMode::Broadcast => "broadcast",
            ProcessingMode::Poll => "poll",
            ProcessingMode::Completed => "completed",
            ProcessingMode::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ProcessingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "broadcast" => Ok(ProcessingMode::Broadcast),
            "poll" => Ok(ProcessingMode::Poll),
            "completed" => Ok(ProcessingMode::Completed),
            "failed" => Ok(ProcessingMode::Failed),
            _ => anyhow::bail!("Invalid processing mode: {}", s),
        }
    }
}

/// Immutable record of something that happened, tenant-scoped.
///
/// Mutated only by the Event Bus / poller; once `Completed` or `Failed`
/// the row is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub tenant_id: String,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub actor_id: Option<String>,
    #[sqlx(json)]
    pub data: serde_json::Value,
    pub processing_mode: String,
    pub retry_count: i32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn processing_mode(&self) -> ProcessingMode {
        self.processing_mode
            .parse()
            .unwrap_or(ProcessingMode::Poll)
    }
}

/// Request body accepted by the bus `publish` entry point, before an id
/// or timestamps are assigned.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewEvent {
    #[validate(length(min = 1, max = 255))]
    pub tenant_id: String,
    #[validate(length(min = 1, max = 128))]
    pub event_type: String,
    #[validate(length(min = 1, max = 128))]
    pub entity_type: String,
    #[validate(length(min = 1, max = 255))]
    pub entity_id: String,
    pub actor_id: Option<String>,
    pub data: serde_json::Value,
}

/// Trigger level; `null` tenant_id only ever paired with `Platform`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerLevel {
    Platform,
    Organization,
    UserDefined,
}

impl fmt::Display for TriggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerLevel::Platform => "platform",
            TriggerLevel::Organization => "organization",
            TriggerLevel::UserDefined => "user_defined",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TriggerLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "platform" => Ok(TriggerLevel::Platform),
            "organization" => Ok(TriggerLevel::Organization),
            "user_defined" => Ok(TriggerLevel::UserDefined),
            _ => anyhow::bail!("Invalid trigger level: {}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStatus {
    Active,
    Inactive,
    Draft,
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerStatus::Active => "active",
            TriggerStatus::Inactive => "inactive",
            TriggerStatus::Draft => "draft",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TriggerStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TriggerStatus::Active),
            "inactive" => Ok(TriggerStatus::Inactive),
            "draft" => Ok(TriggerStatus::Draft),
            _ => anyhow::bail!("Invalid trigger status: {}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerScope {
    AllForms,
    SpecificForms,
}

impl fmt::Display for TriggerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerScope::AllForms => "all_forms",
            TriggerScope::SpecificForms => "specific_forms",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TriggerScope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_forms" => Ok(TriggerScope::AllForms),
            "specific_forms" => Ok(TriggerScope::SpecificForms),
            _ => anyhow::bail!("Invalid trigger scope: {}", s),
        }
    }
}

/// How a chain reacts to a failed action. See `action-executor::executor`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    StopOnFirstError,
    ContinueOnError,
    RollbackOnError,
}

impl fmt::Display for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorHandling::StopOnFirstError => "stop_on_first_error",
            ErrorHandling::ContinueOnError => "continue_on_error",
            ErrorHandling::RollbackOnError => "rollback_on_error",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ErrorHandling {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop_on_first_error" => Ok(ErrorHandling::StopOnFirstError),
            "continue_on_error" => Ok(ErrorHandling::ContinueOnError),
            "rollback_on_error" => Ok(ErrorHandling::RollbackOnError),
            _ => anyhow::bail!("Invalid error handling mode: {}", s),
        }
    }
}

/// Declarative rule mapping a tenant's event to an ordered action chain.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trigger {
    pub id: String,
    pub tenant_id: Option<String>,
    pub name: String,
    pub level: String,
    pub event_type: String,
    pub status: String,
    pub scope: String,
    #[sqlx(json)]
    pub form_ids: Vec<String>,
    pub priority: i32,
    pub error_handling: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl Trigger {
    pub fn status(&self) -> TriggerStatus {
        self.status.parse().unwrap_or(TriggerStatus::Draft)
    }

    pub fn scope(&self) -> TriggerScope {
        self.scope.parse().unwrap_or(TriggerScope::AllForms)
    }

    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
            .parse()
            .unwrap_or(ErrorHandling::StopOnFirstError)
    }
}

/// One declared predicate of a trigger's conjunction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TriggerCondition {
    pub id: String,
    pub trigger_id: String,
    pub field: String,
    pub operator: String,
    #[sqlx(json)]
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FromStr for ConditionOperator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "equals" => Ok(ConditionOperator::Equals),
            "not_equals" => Ok(ConditionOperator::NotEquals),
            "contains" => Ok(ConditionOperator::Contains),
            "not_contains" => Ok(ConditionOperator::NotContains),
            "greater_than" => Ok(ConditionOperator::GreaterThan),
            "less_than" => Ok(ConditionOperator::LessThan),
            "greater_or_equal" => Ok(ConditionOperator::GreaterOrEqual),
            "less_or_equal" => Ok(ConditionOperator::LessOrEqual),
            "in" => Ok(ConditionOperator::In),
            "not_in" => Ok(ConditionOperator::NotIn),
            "is_null" => Ok(ConditionOperator::IsNull),
            "is_not_null" => Ok(ConditionOperator::IsNotNull),
            _ => anyhow::bail!("Invalid condition operator: {}", s),
        }
    }
}

/// Action types a chain may dispatch. `Custom` reaches an
/// externally-registered collaborator keyed by `config.custom_type`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendWebhook,
    SendEmail,
    SendSms,
    UpdateCrm,
    CreateTask,
    TriggerWorkflow,
    Custom,
    /// Synthetic type dispatched only for compensation (§4.F); never
    /// persisted on an `Action` row.
    Rollback,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionType::SendWebhook => "send_webhook",
            ActionType::SendEmail => "send_email",
            ActionType::SendSms => "send_sms",
            ActionType::UpdateCrm => "update_crm",
            ActionType::CreateTask => "create_task",
            ActionType::TriggerWorkflow => "trigger_workflow",
            ActionType::Custom => "custom",
            ActionType::Rollback => "rollback",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ActionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "send_webhook" => Ok(ActionType::SendWebhook),
            "send_email" => Ok(ActionType::SendEmail),
            "send_sms" => Ok(ActionType::SendSms),
            "update_crm" => Ok(ActionType::UpdateCrm),
            "create_task" => Ok(ActionType::CreateTask),
            "trigger_workflow" => Ok(ActionType::TriggerWorkflow),
            "custom" => Ok(ActionType::Custom),
            "rollback" => Ok(ActionType::Rollback),
            _ => anyhow::bail!("Invalid action type: {}", s),
        }
    }
}

/// Retry policy for one action: `initial_delay_ms * backoff_multiplier^(attempt-1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_multiplier: f64,
    pub initial_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1000,
        }
    }
}

/// One step in a trigger's action chain. Cascades on trigger deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Action {
    pub id: String,
    pub trigger_id: String,
    pub action_type: String,
    pub order: i32,
    #[sqlx(json)]
    pub config: serde_json::Value,
    #[sqlx(json)]
    pub retry_config: serde_json::Value,
    pub timeout_ms: i32,
    pub is_critical: bool,
    pub created_at: DateTime<Utc>,
}

impl Action {
    pub fn action_type(&self) -> ActionType {
        self.action_type.parse().unwrap_or(ActionType::Custom)
    }

    pub fn retry_config(&self) -> RetryConfig {
        serde_json::from_value(self.retry_config.clone()).unwrap_or_default()
    }

    pub fn rollback_operation(&self) -> Option<String> {
        self.config
            .get("rollback_operation")
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Retrying,
    Cancelled,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Retrying => "retrying",
            ExecutionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// One attempt of one action for one event. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActionExecution {
    pub id: String,
    pub event_id: String,
    pub trigger_id: String,
    pub action_id: String,
    pub status: String,
    pub attempt: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[sqlx(json(nullable))]
    pub response: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    Active,
    Paused,
    Disabled,
}

impl fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WebhookStatus::Active => "active",
            WebhookStatus::Paused => "paused",
            WebhookStatus::Disabled => "disabled",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for WebhookStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(WebhookStatus::Active),
            "paused" => Ok(WebhookStatus::Paused),
            "disabled" => Ok(WebhookStatus::Disabled),
            _ => anyhow::bail!("Invalid webhook status: {}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for HealthStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(HealthStatus::Healthy),
            "degraded" => Ok(HealthStatus::Degraded),
            "unhealthy" => Ok(HealthStatus::Unhealthy),
            "unknown" => Ok(HealthStatus::Unknown),
            _ => anyhow::bail!("Invalid health status: {}", s),
        }
    }
}

impl HealthStatus {
    /// Delivery-queue priority: lower runs earlier.
    pub fn priority(&self) -> i32 {
        match self {
            HealthStatus::Healthy => 1,
            HealthStatus::Unknown => 2,
            HealthStatus::Degraded => 3,
            HealthStatus::Unhealthy => 5,
        }
    }
}

/// A tenant-registered inbound HTTP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InboundWebhook {
    pub id: String,
    pub tenant_id: String,
    pub url: String,
    /// Never serialized back out; `create` returns the plaintext secret
    /// once, out of band from this struct.
    #[serde(skip_serializing)]
    pub secret_ciphertext: Vec<u8>,
    #[sqlx(json)]
    pub events: Vec<String>,
    pub form_id: Option<String>,
    pub status: String,
    pub health_status: String,
    pub consecutive_failures: i32,
    pub success_count: i64,
    pub failure_count: i64,
    pub average_latency_ms: Option<f64>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InboundWebhook {
    pub fn status(&self) -> WebhookStatus {
        self.status.parse().unwrap_or(WebhookStatus::Disabled)
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health_status.parse().unwrap_or(HealthStatus::Unknown)
    }
}

/// Request to register a new inbound webhook.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateWebhookRequest {
    #[validate(length(min = 1, max = 255))]
    pub tenant_id: String,
    #[validate(url)]
    pub url: String,
    pub events: Vec<String>,
    pub form_id: Option<String>,
}

/// One delivery attempt of an outbound job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookDelivery {
    pub id: String,
    pub webhook_id: String,
    pub event_name: String,
    pub payload_hash: String,
    pub signature: String,
    pub status: String,
    pub status_code: Option<i32>,
    pub error_message: Option<String>,
    pub response_time_ms: Option<i64>,
    pub attempt: i32,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DlqStatus {
    Pending,
    Processing,
    Resolved,
    Failed,
    Ignored,
}

impl fmt::Display for DlqStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DlqStatus::Pending => "pending",
            DlqStatus::Processing => "processing",
            DlqStatus::Resolved => "resolved",
            DlqStatus::Failed => "failed",
            DlqStatus::Ignored => "ignored",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DlqStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DlqStatus::Pending),
            "processing" => Ok(DlqStatus::Processing),
            "resolved" => Ok(DlqStatus::Resolved),
            "failed" => Ok(DlqStatus::Failed),
            "ignored" => Ok(DlqStatus::Ignored),
            _ => anyhow::bail!("Invalid DLQ status: {}", s),
        }
    }
}

/// Persisted record of a terminally-failed action. Unique per
/// `(event_id, action_id)`; snapshots break the lifetime dependency on
/// the originating trigger/action.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DlqEntry {
    pub id: String,
    pub event_id: String,
    pub trigger_id: String,
    pub action_id: String,
    pub failure_reason: String,
    pub failure_count: i32,
    pub last_error: String,
    #[sqlx(json)]
    pub event_snapshot: serde_json::Value,
    #[sqlx(json)]
    pub action_snapshot: serde_json::Value,
    pub status: String,
    pub retry_after: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DlqEntry {
    pub fn status(&self) -> DlqStatus {
        self.status.parse().unwrap_or(DlqStatus::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_display_round_trips_through_from_str() {
        for t in [
            ActionType::SendWebhook,
            ActionType::SendEmail,
            ActionType::SendSms,
            ActionType::UpdateCrm,
            ActionType::CreateTask,
            ActionType::TriggerWorkflow,
            ActionType::Custom,
            ActionType::Rollback,
        ] {
            let s = t.to_string();
            assert_eq!(s.parse::<ActionType>().unwrap(), t);
        }
    }

    #[test]
    fn test_action_type_case_insensitive() {
        assert_eq!(
            "SEND_WEBHOOK".parse::<ActionType>().unwrap(),
            ActionType::SendWebhook
        );
    }

    #[test]
    fn test_condition_operator_from_str_rejects_unknown() {
        assert!("bogus".parse::<ConditionOperator>().is_err());
    }

    #[test]
    fn test_health_status_priority_ordering() {
        assert!(HealthStatus::Healthy.priority() < HealthStatus::Unknown.priority());
        assert!(HealthStatus::Unknown.priority() < HealthStatus::Degraded.priority());
        assert!(HealthStatus::Degraded.priority() < HealthStatus::Unhealthy.priority());
    }

    #[test]
    fn test_retry_config_default() {
        let rc = RetryConfig::default();
        assert_eq!(rc.max_attempts, 3);
        assert_eq!(rc.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_action_job_config_json_round_trip() {
        let action = Action {
            id: "a1".into(),
            trigger_id: "t1".into(),
            action_type: "send_webhook".into(),
            order: 0,
            config: serde_json::json!({"url": "http://example.test", "rollback_operation": "undo"}),
            retry_config: serde_json::to_value(RetryConfig::default()).unwrap(),
            timeout_ms: 5000,
            is_critical: true,
            created_at: Utc::now(),
        };
        assert_eq!(action.action_type(), ActionType::SendWebhook);
        assert_eq!(action.rollback_operation(), Some("undo".to_string()));
        assert_eq!(action.retry_config().max_attempts, 3);
    }
}

//! Action-chain job definitions shared between the event bus and the action executor
//!
//! A job is enqueued once the trigger matcher (§4.E) finds a matching,
//! active trigger for an event. It carries just enough for the action
//! executor to load the trigger's actions and run the chain (§4.F)
//! without a second round-trip for the event payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Queue name for action-chain jobs
pub const ACTION_JOBS_QUEUE: &str = "action_jobs";

/// Dead letter queue for jobs that could not be enqueued at all
/// (distinct from the persistent DLQ in `action-executor::dlq`, which
/// records failures after a chain was attempted).
pub const ACTION_JOBS_DLQ: &str = "action_jobs_dlq";

/// One matched-trigger chain to execute.
///
/// Enqueued by the event bus's trigger matcher; the action executor
/// loads `trigger_id`'s actions sorted by `(order, id)` and runs
/// `execute_chain` against `event_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionJob {
    pub id: String,
    pub trigger_id: String,
    pub event_id: String,
    /// Copied from `Trigger::priority` at match time, for queue ordering.
    pub priority: i32,
    /// Full sanitized event data, used for template interpolation (§4.F).
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActionJob {
    pub fn new(trigger_id: &str, event_id: &str, priority: i32, event_data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trigger_id: trigger_id.to_string(),
            event_id: event_id.to_string(),
            priority,
            event_data,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_job_new() {
        let event_data = json!({"tenant_id": "t1", "event_type": "form.submitted"});

        let job = ActionJob::new("trigger-123", "event-456", 1, event_data.clone());

        assert!(!job.id.is_empty());
        assert_eq!(job.trigger_id, "trigger-123");
        assert_eq!(job.event_id, "event-456");
        assert_eq!(job.priority, 1);
        assert_eq!(job.event_data, event_data);
    }

    #[test]
    fn test_action_job_serialization_round_trips() {
        let event_data = json!({"tenant_id": "t1"});
        let job = ActionJob::new("t1", "e1", 2, event_data);

        let serialized = serde_json::to_string(&job).unwrap();
        let deserialized: ActionJob = serde_json::from_str(&serialized).unwrap();

        assert_eq!(job.id, deserialized.id);
        assert_eq!(job.trigger_id, deserialized.trigger_id);
        assert_eq!(job.event_data, deserialized.event_data);
        assert_eq!(job.created_at, deserialized.created_at);
    }

    #[test]
    fn test_action_job_ids_are_unique() {
        let event_data = json!({});
        let job1 = ActionJob::new("t1", "e1", 1, event_data.clone());
        let job2 = ActionJob::new("t1", "e1", 1, event_data);

        assert_ne!(job1.id, job2.id);
    }
}

//! Trigger Matcher (spec §4.E)
//!
//! Loads active triggers for a tenant/event_type pair, filters by scope,
//! and evaluates each trigger's conditions (AND) against the event's
//! `data`. Field paths are dot-notation over the event, typically
//! `data.<...>`, resolved via the shared value-tree walker.

use shared::models::{ConditionOperator, Event, Trigger, TriggerCondition, TriggerScope, TriggerStatus};
use shared::value_tree::{get_path, strip_bidi_controls_str};
use shared::{DbPool, Result};
use std::str::FromStr;

#[derive(Clone)]
pub struct TriggerMatcher {
    db_pool: DbPool,
}

impl TriggerMatcher {
    pub fn new(db_pool: DbPool) -> Self {
        Self { db_pool }
    }

    /// Load active triggers for `(tenant_id, event_type)` that match
    /// `event`'s scope and conditions, sorted by `priority` ascending.
    pub async fn matching_triggers(&self, event: &Event) -> Result<Vec<Trigger>> {
        let candidates = sqlx::query_as::<_, Trigger>(
            r#"
            SELECT
                id, tenant_id, name, level, event_type, status, scope,
                form_ids, priority, error_handling, created_at, updated_at, created_by
            FROM triggers
            WHERE (tenant_id = $1 OR tenant_id IS NULL)
              AND event_type = $2
              AND status = 'active'
            ORDER BY priority ASC
            "#,
        )
        .bind(&event.tenant_id)
        .bind(&event.event_type)
        .fetch_all(&self.db_pool)
        .await?;

        let mut matched = Vec::new();
        for trigger in candidates {
            if !scope_matches(&trigger, event) {
                continue;
            }

            let conditions = self.load_conditions(&trigger.id).await?;
            if conditions_hold(&conditions, event) {
                matched.push(trigger);
            }
        }

        Ok(matched)
    }

    async fn load_conditions(&self, trigger_id: &str) -> Result<Vec<TriggerCondition>> {
        let conditions = sqlx::query_as::<_, TriggerCondition>(
            "SELECT id, trigger_id, field, operator, value, created_at FROM trigger_conditions WHERE trigger_id = $1",
        )
        .bind(trigger_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(conditions)
    }
}

fn scope_matches(trigger: &Trigger, event: &Event) -> bool {
    match trigger.scope() {
        TriggerScope::AllForms => true,
        TriggerScope::SpecificForms => trigger.form_ids.iter().any(|id| id == &event.entity_id),
    }
}

fn conditions_hold(conditions: &[TriggerCondition], event: &Event) -> bool {
    conditions.iter().all(|c| condition_holds(c, event))
}

fn condition_holds(condition: &TriggerCondition, event: &Event) -> bool {
    let Ok(operator) = ConditionOperator::from_str(&condition.operator) else {
        return false;
    };

    let event_value = serde_json::to_value(event).ok();
    let resolved = event_value
        .as_ref()
        .and_then(|v| get_path(v, &condition.field));

    match operator {
        ConditionOperator::IsNull => resolved.is_none_or(|v| v.is_null()),
        ConditionOperator::IsNotNull => resolved.is_some_and(|v| !v.is_null()),
        _ => {
            let Some(value) = resolved.filter(|v| !v.is_null()) else {
                return false;
            };
            evaluate_non_null(operator, value, &condition.value)
        }
    }
}

fn evaluate_non_null(
    operator: ConditionOperator,
    actual: &serde_json::Value,
    expected: &serde_json::Value,
) -> bool {
    match operator {
        ConditionOperator::Equals => string_eq(actual, expected),
        ConditionOperator::NotEquals => !string_eq(actual, expected),
        ConditionOperator::Contains => string_contains(actual, expected),
        ConditionOperator::NotContains => !string_contains(actual, expected),
        ConditionOperator::GreaterThan => numeric_cmp(actual, expected, |a, b| a > b),
        ConditionOperator::LessThan => numeric_cmp(actual, expected, |a, b| a < b),
        ConditionOperator::GreaterOrEqual => numeric_cmp(actual, expected, |a, b| a >= b),
        ConditionOperator::LessOrEqual => numeric_cmp(actual, expected, |a, b| a <= b),
        ConditionOperator::In => in_set(actual, expected),
        ConditionOperator::NotIn => !in_set(actual, expected),
        ConditionOperator::IsNull | ConditionOperator::IsNotNull => unreachable!(),
    }
}

fn as_comparable_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(strip_bidi_controls_str(s)),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_eq(actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    match (as_comparable_string(actual), as_comparable_string(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

fn string_contains(actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    match (as_comparable_string(actual), as_comparable_string(expected)) {
        (Some(a), Some(b)) => a.contains(&b),
        _ => false,
    }
}

fn numeric_cmp(
    actual: &serde_json::Value,
    expected: &serde_json::Value,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn in_set(actual: &serde_json::Value, expected: &serde_json::Value) -> bool {
    let Some(list) = expected.as_array() else {
        return false;
    };
    list.iter().any(|candidate| string_eq(actual, candidate))
}

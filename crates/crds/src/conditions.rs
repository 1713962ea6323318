//! Status conditions for managed resources
//!
//! A resource's status carries at most one [`Condition`] per [`ConditionType`].
//! Setting a condition replaces the existing one of the same type; the transition
//! time only moves when the status value actually changes.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of observation a condition records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionType {
    /// Whether the external resource is available for use
    Ready,
    /// Whether the last reconcile pass succeeded
    Synced,
    /// Whether all attribute references have been resolved into the spec
    ReferencesResolved,
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionType::Ready => write!(f, "Ready"),
            ConditionType::Synced => write!(f, "Synced"),
            ConditionType::ReferencesResolved => write!(f, "ReferencesResolved"),
        }
    }
}

/// Tri-state status value, serialized the Kubernetes way ("True", "False", "Unknown")
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

/// Machine-readable reason for a condition's current status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionReason {
    Available,
    Unavailable,
    Creating,
    Deleting,
    ReconcileSuccess,
    ReconcileError,
    ReferenceResolveSuccess,
    ReferenceResolveBlocked,
}

/// A single observation about a managed resource
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: ConditionType,
    
    /// Condition status
    pub status: ConditionStatus,
    
    /// Last time the status value changed
    pub last_transition_time: DateTime<Utc>,
    
    /// Reason for the current status
    pub reason: ConditionReason,
    
    /// Human readable detail, typically the error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    fn new(type_: ConditionType, status: ConditionStatus, reason: ConditionReason, at: DateTime<Utc>) -> Self {
        Self {
            type_,
            status,
            last_transition_time: at,
            reason,
            message: None,
        }
    }

    /// Attach a message to the condition
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Ready=True, the external resource is usable
    pub fn available(at: DateTime<Utc>) -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::True, ConditionReason::Available, at)
    }

    /// Ready=False, the external resource is not usable
    pub fn unavailable(at: DateTime<Utc>) -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Unavailable, at)
    }

    /// Ready=False, the external resource is being created or converged
    pub fn creating(at: DateTime<Utc>) -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Creating, at)
    }

    /// Ready=False, the external resource is being deleted
    pub fn deleting(at: DateTime<Utc>) -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, ConditionReason::Deleting, at)
    }

    /// Synced=True
    pub fn reconcile_success(at: DateTime<Utc>) -> Self {
        Self::new(ConditionType::Synced, ConditionStatus::True, ConditionReason::ReconcileSuccess, at)
    }

    /// Synced=False carrying the error text
    pub fn reconcile_error(at: DateTime<Utc>, err: &dyn std::fmt::Display) -> Self {
        Self::new(ConditionType::Synced, ConditionStatus::False, ConditionReason::ReconcileError, at)
            .with_message(err.to_string())
    }

    /// ReferencesResolved=True
    pub fn reference_resolution_success(at: DateTime<Utc>) -> Self {
        Self::new(
            ConditionType::ReferencesResolved,
            ConditionStatus::True,
            ConditionReason::ReferenceResolveSuccess,
            at,
        )
    }

    /// ReferencesResolved=False naming the references that are not ready yet
    pub fn reference_resolution_blocked(at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self::new(
            ConditionType::ReferencesResolved,
            ConditionStatus::False,
            ConditionReason::ReferenceResolveBlocked,
            at,
        )
        .with_message(message)
    }

    /// Whether two conditions say the same thing, ignoring the transition time
    pub fn equivalent(&self, other: &Condition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Ordered set of conditions with at most one entry per type
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    /// Replace the condition of the same type, or append it.
    ///
    /// If the status value did not change, the previous transition time is kept.
    pub fn set(&mut self, mut condition: Condition) {
        match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
            }
            None => self.0.push(condition),
        }
    }

    /// Set several conditions in order
    pub fn set_all(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        for c in conditions {
            self.set(c);
        }
    }

    /// Condition of the given type, if set
    pub fn get(&self, type_: ConditionType) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    /// True only if a condition of this type exists with status True
    pub fn is_true(&self, type_: ConditionType) -> bool {
        self.get(type_).map(|c| c.status == ConditionStatus::True).unwrap_or(false)
    }

    /// Conditions in the order they were first set
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    /// Number of condition types set
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No condition has been set yet
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_set_appends_new_type() {
        let mut c = Conditions::default();
        c.set(Condition::creating(t(0)));
        c.set(Condition::reconcile_success(t(0)));
        assert_eq!(c.len(), 2);
        assert!(c.is_true(ConditionType::Synced));
        assert!(!c.is_true(ConditionType::Ready));
    }

    #[test]
    fn test_set_replaces_same_type() {
        let mut c = Conditions::default();
        c.set(Condition::creating(t(0)));
        c.set(Condition::available(t(10)));
        assert_eq!(c.len(), 1);
        let ready = c.get(ConditionType::Ready).unwrap();
        assert_eq!(ready.reason, ConditionReason::Available);
        assert_eq!(ready.last_transition_time, t(10));
    }

    #[test]
    fn test_transition_time_kept_when_status_unchanged() {
        let mut c = Conditions::default();
        c.set(Condition::creating(t(0)));
        c.set(Condition::creating(t(30)));
        assert_eq!(c.get(ConditionType::Ready).unwrap().last_transition_time, t(0));

        // Reason changes but status stays False
        c.set(Condition::deleting(t(60)));
        let ready = c.get(ConditionType::Ready).unwrap();
        assert_eq!(ready.reason, ConditionReason::Deleting);
        assert_eq!(ready.last_transition_time, t(0));
    }

    #[test]
    fn test_is_true_missing_condition() {
        let c = Conditions::default();
        assert!(!c.is_true(ConditionType::ReferencesResolved));
        assert!(c.get(ConditionType::Ready).is_none());
    }

    #[test]
    fn test_reconcile_error_carries_message() {
        let err = "boom";
        let cond = Condition::reconcile_error(t(0), &err);
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_serialized_shape() {
        let mut c = Conditions::default();
        c.set(Condition::reference_resolution_blocked(t(0), "Vpc/default/main: NotFound"));
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v[0]["type"], "ReferencesResolved");
        assert_eq!(v[0]["status"], "False");
        assert_eq!(v[0]["reason"], "ReferenceResolveBlocked");
        assert!(v[0]["lastTransitionTime"].is_string());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ExternalId, ResourceName, StableName};

/// What happens to the remote object when its declared resource is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionPolicy {
    #[default]
    Delete,
    /// Forget the remote object without touching it.
    Orphan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub name: ResourceName,
    pub deletion_requested: bool,
    pub deletion_policy: DeletionPolicy,
}

impl Metadata {
    #[must_use]
    pub fn new(name: ResourceName) -> Self {
        Self {
            name,
            deletion_requested: false,
            deletion_policy: DeletionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Health {
    Available,
    Unavailable,
    InvariantViolated,
    Unresolved,
}

impl Health {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Unavailable => "Unavailable",
            Self::InvariantViolated => "InvariantViolated",
            Self::Unresolved => "Unresolved",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub health: Health,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_transition: DateTime<Utc>,
}

/// Last observed state of a declared resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "O: Deserialize<'de> + Default"))]
pub struct Status<O> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_id: Option<ExternalId>,
    /// Lookup key recorded on first match or creation, then reused verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable_name: Option<StableName>,
    #[serde(default)]
    pub observed: O,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl<O: Default> Default for Status<O> {
    fn default() -> Self {
        Self {
            observed_id: None,
            stable_name: None,
            observed: O::default(),
            condition: None,
        }
    }
}

impl<O> Status<O> {
    /// Records the identity of an observed or created object. The stable
    /// name is only filled when empty.
    pub fn record_identity(&mut self, id: ExternalId, stable_name: StableName) {
        self.observed_id = Some(id);
        if self.stable_name.is_none() {
            self.stable_name = Some(stable_name);
        }
    }

    /// Sets the health condition. `last_transition` only moves when the
    /// health value changes.
    pub fn set_condition(&mut self, health: Health, message: Option<String>) {
        self.set_condition_at(health, message, Utc::now());
    }

    pub fn set_condition_at(
        &mut self,
        health: Health,
        message: Option<String>,
        now: DateTime<Utc>,
    ) {
        let last_transition = match &self.condition {
            Some(existing) if existing.health == health => existing.last_transition,
            _ => now,
        };
        self.condition = Some(Condition {
            health,
            message,
            last_transition,
        });
    }

    #[must_use]
    pub fn health(&self) -> Option<Health> {
        self.condition.as_ref().map(|condition| condition.health)
    }
}

/// A user's statement of desired state for one remote object, together with
/// what the last reconciliation cycle observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Declared<S, O> {
    pub meta: Metadata,
    pub spec: S,
    pub status: Status<O>,
}

impl<S, O: Default> Declared<S, O> {
    #[must_use]
    pub fn new(name: ResourceName, spec: S) -> Self {
        Self {
            meta: Metadata::new(name),
            spec,
            status: Status::default(),
        }
    }
}

impl<S, O> Declared<S, O> {
    #[must_use]
    pub fn name(&self) -> &ResourceName {
        &self.meta.name
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{EngineError, ScheduleError, ValidationError};
use crate::schedule::{parse_schedule, ScheduleSpec};

/// Status written by a real firing (manual or scheduled)
pub const STATUS_EXECUTED: &str = "executed";

/// Status written by a dry-run test firing
pub const STATUS_TEST_EXECUTED: &str = "test_executed";

// ============================================================================
// Trigger Models
// ============================================================================

/// TriggerType defines how a trigger fires. Fixed at creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Scheduled,
    Api,
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerType::Scheduled => write!(f, "scheduled"),
            TriggerType::Api => write!(f, "api"),
        }
    }
}

impl FromStr for TriggerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(TriggerType::Scheduled),
            "api" => Ok(TriggerType::Api),
            _ => Err(format!("Invalid trigger type: {}", s)),
        }
    }
}

impl TryFrom<String> for TriggerType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

/// Trigger is a named unit of work, fired on a schedule or on demand
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Trigger {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type", try_from = "String")]
    pub trigger_type: TriggerType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trigger {
    pub fn is_scheduled(&self) -> bool {
        self.trigger_type == TriggerType::Scheduled
    }
}

fn default_active() -> bool {
    true
}

/// An unsaved trigger definition, as submitted for creation or a test firing.
///
/// `id` is only meaningful for test firings of a trigger that already exists;
/// creation always assigns a fresh identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl TriggerDraft {
    pub fn scheduled(name: impl Into<String>, schedule: impl Into<String>) -> Self {
        Self {
            id: None,
            trigger_type: TriggerType::Scheduled,
            name: name.into(),
            schedule: Some(schedule.into()),
            endpoint: None,
            is_active: true,
        }
    }

    pub fn api(name: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            id: None,
            trigger_type: TriggerType::Api,
            name: name.into(),
            schedule: None,
            endpoint,
            is_active: true,
        }
    }

    /// Check required fields and parse the schedule of scheduled drafts.
    ///
    /// Returns the parsed schedule for scheduled drafts, `None` for api drafts.
    pub fn validate(&self) -> Result<Option<ScheduleSpec>, EngineError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }

        match self.trigger_type {
            TriggerType::Scheduled => {
                let expression = self
                    .schedule
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| ValidationError::MissingField("schedule".to_string()))?;
                let spec = parse_schedule(expression)?;
                if spec.next_after(Utc::now()).is_none() {
                    return Err(ScheduleError::NoNextExecution(expression.to_string()).into());
                }
                Ok(Some(spec))
            }
            TriggerType::Api => Ok(None),
        }
    }

    /// Materialize the draft into a trigger with a fresh identity.
    pub fn into_trigger(self, now: DateTime<Utc>) -> Trigger {
        // The schedule is ignored for api triggers
        let schedule = match self.trigger_type {
            TriggerType::Scheduled => self.schedule.map(|s| s.trim().to_string()),
            TriggerType::Api => None,
        };

        Trigger {
            id: Uuid::new_v4(),
            trigger_type: self.trigger_type,
            name: self.name.trim().to_string(),
            schedule,
            endpoint: self.endpoint,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

// ============================================================================
// Event Log Models
// ============================================================================

/// EventLog is the immutable record of one firing
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct EventLog {
    pub id: Uuid,
    pub trigger_id: Uuid,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    pub is_archived: bool,
    pub executed_at: DateTime<Utc>,
}

impl EventLog {
    pub fn new(trigger_id: Uuid, status: impl Into<String>, executed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger_id,
            status: status.into(),
            payload: None,
            is_archived: false,
            executed_at,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// Outcome of one retention pass
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepReport {
    pub archived: u64,
    pub purged: u64,
}

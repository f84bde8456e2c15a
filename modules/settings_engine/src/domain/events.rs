//! Domain events for the settings engine
//!
//! One event is published per successfully applied setting. Nested applies
//! (prerequisite corrections, cascades, preset sync) publish their own events.

use crate::contract::SettingValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain event types for settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum SettingEvent {
    /// Setting operations were applied successfully
    SettingApplied(SettingAppliedEvent),
}

/// Event data for an applied setting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingAppliedEvent {
    /// Event ID
    pub event_id: Uuid,
    /// Setting ID
    pub setting_id: String,
    /// Feature group of the setting
    pub group_id: String,
    /// Requested enabled state
    pub enable: bool,
    /// Requested value, rendered for display
    pub value: Option<String>,
    /// Whether the apply was a nested cascade or correction
    pub nested: bool,
    /// Timestamp of the event
    pub timestamp: DateTime<Utc>,
}

/// Event publisher trait for publishing domain events
///
/// Publication is fire-and-forget: the engine never waits for or fails on it.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one event
    async fn publish(&self, event: SettingEvent) -> anyhow::Result<()>;
}

/// No-op event publisher for testing or when events are disabled
pub struct NoOpEventPublisher;

#[async_trait::async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: SettingEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

impl SettingEvent {
    /// Create a new SettingApplied event
    pub fn applied(
        setting_id: &str,
        group_id: &str,
        enable: bool,
        value: Option<&SettingValue>,
        nested: bool,
    ) -> Self {
        SettingEvent::SettingApplied(SettingAppliedEvent {
            event_id: Uuid::new_v4(),
            setting_id: setting_id.to_string(),
            group_id: group_id.to_string(),
            enable,
            value: value.map(ToString::to_string),
            nested,
            timestamp: Utc::now(),
        })
    }

    /// ID of the setting the event is about
    pub fn setting_id(&self) -> &str {
        match self {
            SettingEvent::SettingApplied(e) => &e.setting_id,
        }
    }
}

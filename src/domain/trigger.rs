//! Polymorphic run triggers.
//!
//! A trigger records why a run was created. Triggers are a tagged union on
//! the wire: every variant reports a tag string and a variant-shaped
//! payload that embeds the tag, and the codec dispatches decoding through a
//! registry keyed by tag so new variants can be added without touching the
//! core decoder.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// The reason a run was created.
///
/// Implementations must keep `to_payload` self-describing: the returned
/// object carries the `triggerType` tag alongside the variant fields, which
/// is what the registry uses to pick the decoder on the way back in.
pub trait Trigger: fmt::Debug + Send + Sync {
    /// Tag string identifying the concrete variant on the wire.
    fn trigger_type(&self) -> &'static str;

    /// Human-readable trigger name.
    fn trigger_name(&self) -> &str;

    /// Variant-shaped wire payload, including the `triggerType` tag.
    fn to_payload(&self) -> Value;

    /// Clones the trigger behind a fresh box.
    fn clone_trigger(&self) -> Box<dyn Trigger>;
}

impl Clone for Box<dyn Trigger> {
    fn clone(&self) -> Self {
        self.clone_trigger()
    }
}

// Two triggers are equal when they carry the same tag and encode to the
// same payload, regardless of the concrete type behind the box.
impl PartialEq for dyn Trigger {
    fn eq(&self, other: &Self) -> bool {
        self.trigger_type() == other.trigger_type() && self.to_payload() == other.to_payload()
    }
}

/// Trigger for a run requested exactly once, outside any schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneOffTrigger {
    /// Label supplied by the caller that requested the run.
    pub trigger_name: String,
}

impl OneOffTrigger {
    /// Wire tag for this variant.
    pub const TYPE_TAG: &'static str = "OneOffTrigger";

    /// Creates a one-off trigger.
    #[must_use]
    pub fn new(trigger_name: impl Into<String>) -> Self {
        Self {
            trigger_name: trigger_name.into(),
        }
    }
}

impl Trigger for OneOffTrigger {
    fn trigger_type(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn trigger_name(&self) -> &str {
        &self.trigger_name
    }

    fn to_payload(&self) -> Value {
        json!({
            "triggerName": self.trigger_name,
            "triggerType": Self::TYPE_TAG,
        })
    }

    fn clone_trigger(&self) -> Box<dyn Trigger> {
        Box::new(self.clone())
    }
}

/// Trigger variant used by test fixtures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DummyTrigger {
    /// Label supplied by the caller that requested the run.
    pub trigger_name: String,
    /// Arbitrary fixture payload.
    pub dummy_field: bool,
}

impl DummyTrigger {
    /// Wire tag for this variant.
    pub const TYPE_TAG: &'static str = "DummyTrigger";

    /// Creates a dummy trigger.
    #[must_use]
    pub fn new(trigger_name: impl Into<String>, dummy_field: bool) -> Self {
        Self {
            trigger_name: trigger_name.into(),
            dummy_field,
        }
    }
}

impl Trigger for DummyTrigger {
    fn trigger_type(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn trigger_name(&self) -> &str {
        &self.trigger_name
    }

    fn to_payload(&self) -> Value {
        json!({
            "dummyField": self.dummy_field,
            "triggerName": self.trigger_name,
            "triggerType": Self::TYPE_TAG,
        })
    }

    fn clone_trigger(&self) -> Box<dyn Trigger> {
        Box::new(self.clone())
    }
}

//! Polymorphic task targets.
//!
//! A target records what a task operates on. Like triggers, targets are a
//! tagged union on the wire: each variant reports its tag and a payload
//! embedding that tag, and decoding dispatches through a registry.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// What a task operates on.
pub trait TaskTarget: fmt::Debug + Send + Sync {
    /// Tag string identifying the concrete variant on the wire.
    fn target_type(&self) -> &'static str;

    /// Variant-shaped wire payload, including the `targetType` tag.
    fn to_payload(&self) -> Value;

    /// Clones the target behind a fresh box.
    fn clone_target(&self) -> Box<dyn TaskTarget>;
}

impl Clone for Box<dyn TaskTarget> {
    fn clone(&self) -> Self {
        self.clone_target()
    }
}

impl PartialEq for dyn TaskTarget {
    fn eq(&self, other: &Self) -> bool {
        self.target_type() == other.target_type() && self.to_payload() == other.to_payload()
    }
}

/// Target addressing a named, versioned resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameVariantTarget {
    /// Resource name.
    pub name: String,
    /// Resource variant label.
    pub variant: String,
}

impl NameVariantTarget {
    /// Wire tag for this variant.
    pub const TYPE_TAG: &'static str = "NameVariant";

    /// Creates a name/variant target.
    #[must_use]
    pub fn new(name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variant: variant.into(),
        }
    }
}

impl TaskTarget for NameVariantTarget {
    fn target_type(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn to_payload(&self) -> Value {
        json!({
            "name": self.name,
            "targetType": Self::TYPE_TAG,
            "variant": self.variant,
        })
    }

    fn clone_target(&self) -> Box<dyn TaskTarget> {
        Box::new(self.clone())
    }
}

/// Target addressing an entire provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTarget {
    /// Provider name.
    pub name: String,
}

impl ProviderTarget {
    /// Wire tag for this variant.
    pub const TYPE_TAG: &'static str = "Provider";

    /// Creates a provider target.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl TaskTarget for ProviderTarget {
    fn target_type(&self) -> &'static str {
        Self::TYPE_TAG
    }

    fn to_payload(&self) -> Value {
        json!({
            "name": self.name,
            "targetType": Self::TYPE_TAG,
        })
    }

    fn clone_target(&self) -> Box<dyn TaskTarget> {
        Box::new(self.clone())
    }
}

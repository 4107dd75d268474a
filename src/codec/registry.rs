//! Variant registries for polymorphic trigger and target decoding.
//!
//! Each registry maps a wire tag to a decoder function. Registering a new
//! variant is the extension point; the record decoders in the parent module
//! never need to learn about concrete variants.

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::CodecError;
use crate::domain::{DummyTrigger, NameVariantTarget, OneOffTrigger, ProviderTarget, TaskTarget, Trigger};

/// Decoder for one trigger variant, from its wire object.
pub type TriggerDecoderFn = fn(&Map<String, Value>) -> Result<Box<dyn Trigger>, CodecError>;

/// Decoder for one target variant, from its wire object.
pub type TargetDecoderFn = fn(&Map<String, Value>) -> Result<Box<dyn TaskTarget>, CodecError>;

/// Registry of trigger decoders keyed by `triggerType` tag.
pub struct TriggerRegistry {
    decoders: HashMap<&'static str, TriggerDecoderFn>,
}

impl TriggerRegistry {
    /// Creates a registry with the built-in variants registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(OneOffTrigger::TYPE_TAG, decode_one_off_trigger);
        registry.register(DummyTrigger::TYPE_TAG, decode_dummy_trigger);
        registry
    }

    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers a decoder for a tag, replacing any existing one.
    pub fn register(&mut self, tag: &'static str, decoder: TriggerDecoderFn) {
        self.decoders.insert(tag, decoder);
    }

    /// Returns `true` when a decoder is registered for the tag.
    #[must_use]
    pub fn has_variant(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Decodes a trigger from its wire value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::WrongTriggerFormat`] when the value is not an
    /// object, [`CodecError::MissingField`] when the tag is absent, and
    /// [`CodecError::UnknownVariantTag`] when no decoder matches the tag.
    pub fn decode(&self, value: &Value) -> Result<Box<dyn Trigger>, CodecError> {
        let object = value.as_object().ok_or(CodecError::WrongTriggerFormat)?;
        let tag = object
            .get("triggerType")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingField("triggerType"))?;
        match self.decoders.get(tag) {
            Some(decoder) => decoder(object),
            None => Err(CodecError::UnknownVariantTag(tag.to_owned())),
        }
    }
}

impl Default for TriggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of target decoders keyed by `targetType` tag.
pub struct TargetRegistry {
    decoders: HashMap<&'static str, TargetDecoderFn>,
}

impl TargetRegistry {
    /// Creates a registry with the built-in variants registered.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(NameVariantTarget::TYPE_TAG, decode_name_variant_target);
        registry.register(ProviderTarget::TYPE_TAG, decode_provider_target);
        registry
    }

    /// Creates an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registers a decoder for a tag, replacing any existing one.
    pub fn register(&mut self, tag: &'static str, decoder: TargetDecoderFn) {
        self.decoders.insert(tag, decoder);
    }

    /// Returns `true` when a decoder is registered for the tag.
    #[must_use]
    pub fn has_variant(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    /// Decodes a target from its wire value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::WrongTargetFormat`] when the value is not an
    /// object, [`CodecError::MissingField`] when the tag is absent, and
    /// [`CodecError::UnknownVariantTag`] when no decoder matches the tag.
    pub fn decode(&self, value: &Value) -> Result<Box<dyn TaskTarget>, CodecError> {
        let object = value.as_object().ok_or(CodecError::WrongTargetFormat)?;
        let tag = object
            .get("targetType")
            .and_then(Value::as_str)
            .ok_or(CodecError::MissingField("targetType"))?;
        match self.decoders.get(tag) {
            Some(decoder) => decoder(object),
            None => Err(CodecError::UnknownVariantTag(tag.to_owned())),
        }
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Combined registries handed to the record decoders.
#[derive(Default)]
pub struct CodecRegistry {
    triggers: TriggerRegistry,
    targets: TargetRegistry,
}

impl CodecRegistry {
    /// Creates registries with all built-in variants registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the trigger registry.
    #[must_use]
    pub const fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    /// Returns the target registry.
    #[must_use]
    pub const fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    /// Registers a trigger decoder, replacing any existing one for the tag.
    pub fn register_trigger(&mut self, tag: &'static str, decoder: TriggerDecoderFn) {
        self.triggers.register(tag, decoder);
    }

    /// Registers a target decoder, replacing any existing one for the tag.
    pub fn register_target(&mut self, tag: &'static str, decoder: TargetDecoderFn) {
        self.targets.register(tag, decoder);
    }
}

fn decode_one_off_trigger(object: &Map<String, Value>) -> Result<Box<dyn Trigger>, CodecError> {
    let trigger: OneOffTrigger = from_object(object)?;
    Ok(Box::new(trigger))
}

fn decode_dummy_trigger(object: &Map<String, Value>) -> Result<Box<dyn Trigger>, CodecError> {
    let trigger: DummyTrigger = from_object(object)?;
    Ok(Box::new(trigger))
}

fn decode_name_variant_target(
    object: &Map<String, Value>,
) -> Result<Box<dyn TaskTarget>, CodecError> {
    let target: NameVariantTarget = from_object(object)?;
    Ok(Box::new(target))
}

fn decode_provider_target(object: &Map<String, Value>) -> Result<Box<dyn TaskTarget>, CodecError> {
    let target: ProviderTarget = from_object(object)?;
    Ok(Box::new(target))
}

fn from_object<T: serde::de::DeserializeOwned>(
    object: &Map<String, Value>,
) -> Result<T, CodecError> {
    serde_json::from_value(Value::Object(object.clone()))
        .map_err(|err| CodecError::Malformed(err.to_string()))
}

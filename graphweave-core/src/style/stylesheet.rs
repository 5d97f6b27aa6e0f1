//! Stylesheets
//!
//! A stylesheet styles one [`StyleType`]. Its JSON form is a flat object:
//!
//! ```json
//! {
//!   "type": "circle",
//!   "radius": { "attribute": "weight", "fallback": 1,
//!               "scale": { "type": "linear", "domain": [0, 10], "range": [2, 20] } },
//!   "fill": { "default": "#ffffff", "hover": "#000000" },
//!   ":selected": { "stroke": "red", "strokeWidth": 2 }
//! }
//! ```
//!
//! Plain keys are default rules. Keys prefixed with `:` are selectors holding
//! the rules of one interaction state. Inline state maps and selectors are
//! merged per property; a selector wins over an inline entry for the same
//! state.
//!
//! Construction resolves every property once. Afterwards the stylesheet is
//! read-only and can be shared between threads.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::property::{Accessor, StyleProperty, UpdateTrigger};
use super::types::{StyleKey, StyleType, VisualAccessor};
use super::value::StyleValue;
use crate::error::StyleError;
use crate::graph::EntityState;

const SELECTOR_PREFIX: char = ':';

/// Unresolved stylesheet rules.
#[derive(Debug, Clone)]
pub struct StyleDeclaration {
    style_type: StyleType,
    rules: IndexMap<StyleKey, StyleValue>,
    selectors: BTreeMap<EntityState, IndexMap<StyleKey, StyleValue>>,
}

impl StyleDeclaration {
    pub fn new(style_type: StyleType) -> Self {
        Self {
            style_type,
            rules: IndexMap::new(),
            selectors: BTreeMap::new(),
        }
    }

    /// Add a default rule.
    pub fn with(mut self, key: StyleKey, value: impl Into<StyleValue>) -> Self {
        self.rules.insert(key, value.into());
        self
    }

    /// Add a rule for one interaction state.
    pub fn with_state(mut self, state: EntityState, key: StyleKey, value: impl Into<StyleValue>) -> Self {
        self.selectors.entry(state).or_default().insert(key, value.into());
        self
    }

    pub fn style_type(&self) -> StyleType {
        self.style_type
    }

    pub fn from_json(value: &Value) -> Result<Self, StyleError> {
        let object = value.as_object().ok_or(StyleError::MissingType)?;
        let style_type = match object.get("type") {
            None | Some(Value::Null) => return Err(StyleError::MissingType),
            Some(Value::String(name)) => name.parse()?,
            Some(other) => return Err(StyleError::UnknownType(other.to_string())),
        };

        let mut declaration = Self::new(style_type);
        for (name, value) in object {
            if name == "type" {
                continue;
            }
            match name.strip_prefix(SELECTOR_PREFIX) {
                Some(state) => {
                    let state: EntityState = state.parse().map_err(StyleError::UnknownState)?;
                    let rules = value
                        .as_object()
                        .ok_or_else(|| StyleError::InvalidSelector(name.clone()))?;
                    for (key, value) in rules {
                        let key: StyleKey = key.parse()?;
                        match StyleValue::from_json(key.as_str(), value)? {
                            Some(value) if value.is_stateful() => {
                                return Err(StyleError::NestedStateMap(key.to_string()));
                            }
                            Some(value) => declaration = declaration.with_state(state, key, value),
                            None => {}
                        }
                    }
                }
                None => {
                    let key: StyleKey = name.parse()?;
                    if let Some(value) = StyleValue::from_json(key.as_str(), value)? {
                        declaration = declaration.with(key, value);
                    }
                }
            }
        }
        Ok(declaration)
    }

    /// Merge default rules and selectors into one value per key.
    fn merged(&self) -> Result<IndexMap<StyleKey, StyleValue>, StyleError> {
        let mut merged: IndexMap<StyleKey, BTreeMap<EntityState, StyleValue>> = IndexMap::new();

        for (key, value) in &self.rules {
            let states = merged.entry(*key).or_default();
            match value {
                StyleValue::Stateful(inline) => states.extend(inline.clone()),
                value => {
                    states.insert(EntityState::Default, value.clone());
                }
            }
        }
        for (state, rules) in &self.selectors {
            for (key, value) in rules {
                if value.is_stateful() {
                    return Err(StyleError::NestedStateMap(key.to_string()));
                }
                merged.entry(*key).or_default().insert(*state, value.clone());
            }
        }

        Ok(merged
            .into_iter()
            .map(|(key, states)| (key, StyleValue::Stateful(states)))
            .collect())
    }
}

/// A resolved stylesheet.
#[derive(Debug, Clone)]
pub struct Stylesheet {
    style_type: StyleType,
    state_update_trigger: Value,
    properties: IndexMap<StyleKey, StyleProperty>,
}

impl Stylesheet {
    /// Resolve `declaration`.
    ///
    /// `state_update_trigger` is the token a host changes whenever entity
    /// interaction states change; it becomes part of the update trigger of
    /// every state-dependent property.
    pub fn new(declaration: StyleDeclaration, state_update_trigger: impl Into<Value>) -> Result<Self, StyleError> {
        let state_update_trigger = state_update_trigger.into();
        let style_type = declaration.style_type;

        let mut properties = IndexMap::new();
        for (key, value) in declaration.merged()? {
            if !style_type.uses_key(key) {
                warn!(%style_type, property = %key, "style property is not used by this style type, ignoring");
                continue;
            }
            properties.insert(key, StyleProperty::new(key, Some(&value), &state_update_trigger)?);
        }
        debug!(%style_type, properties = properties.len(), "stylesheet resolved");

        Ok(Self {
            style_type,
            state_update_trigger,
            properties,
        })
    }

    pub fn from_json(value: &Value, state_update_trigger: impl Into<Value>) -> Result<Self, StyleError> {
        Self::new(StyleDeclaration::from_json(value)?, state_update_trigger)
    }

    pub fn style_type(&self) -> StyleType {
        self.style_type
    }

    pub fn state_update_trigger(&self) -> &Value {
        &self.state_update_trigger
    }

    /// The resolved property for `key`, if the stylesheet declares it.
    pub fn property(&self, key: StyleKey) -> Option<&StyleProperty> {
        self.properties.get(&key)
    }

    fn key_for(&self, accessor: &str) -> Result<StyleKey, StyleError> {
        VisualAccessor::from_name(accessor)
            .and_then(|a| self.style_type.key_for(a))
            .ok_or_else(|| StyleError::UnknownAccessor {
                accessor: accessor.to_owned(),
                style_type: self.style_type.to_string(),
            })
    }

    fn accessor_for(&self, key: StyleKey) -> Accessor {
        match self.properties.get(&key) {
            Some(property) => property.accessor().clone(),
            None => Accessor::Constant(key.default_value()),
        }
    }

    fn trigger_for(&self, key: StyleKey) -> UpdateTrigger {
        match self.properties.get(&key) {
            Some(property) => property.update_trigger().clone(),
            None => UpdateTrigger::Never,
        }
    }

    /// Accessor for a renderer accessor name such as `getFillColor`.
    pub fn get_deck_gl_accessor(&self, accessor: &str) -> Result<Accessor, StyleError> {
        self.key_for(accessor).map(|key| self.accessor_for(key))
    }

    pub fn accessor(&self, accessor: VisualAccessor) -> Result<Accessor, StyleError> {
        self.get_deck_gl_accessor(accessor.as_str())
    }

    /// Every accessor of this style type.
    pub fn get_deck_gl_accessors(&self) -> IndexMap<&'static str, Accessor> {
        self.style_type
            .accessors()
            .iter()
            .map(|(accessor, key)| (accessor.as_str(), self.accessor_for(*key)))
            .collect()
    }

    pub fn get_deck_gl_update_trigger(&self, accessor: &str) -> Result<UpdateTrigger, StyleError> {
        self.key_for(accessor).map(|key| self.trigger_for(key))
    }

    /// Every update trigger of this style type.
    pub fn get_deck_gl_update_triggers(&self) -> IndexMap<&'static str, UpdateTrigger> {
        self.style_type
            .accessors()
            .iter()
            .map(|(accessor, key)| (accessor.as_str(), self.trigger_for(*key)))
            .collect()
    }
}

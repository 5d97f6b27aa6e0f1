//! Resolved style properties.
//!
//! A [`StyleProperty`] is built once per key when a stylesheet is
//! constructed. Resolution turns each declarative value into an
//! [`Accessor`]:
//!
//! - undefined → the key's default, as a constant;
//! - literal → formatted eagerly, as a constant (format errors fail here);
//! - attribute reference → a function reading the attribute through the
//!   optional scale, then the fallback (scaled and formatted eagerly);
//! - resolver function → a function formatting the resolver's result.
//!
//! A property with more than one state resolves every state up front and
//! dispatches on the datum's state at call time. Values produced at call
//! time that fail formatting are logged and replaced by the fallback, or
//! the key's default.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::scale::Scale;
use super::types::{StyleKey, VisualValue};
use super::value::{AttributeRef, Datum, StyleValue};
use crate::error::StyleError;
use crate::graph::EntityState;

/// Computes a visual value from a datum.
pub type AccessorFn = Arc<dyn Fn(&dyn Datum) -> VisualValue + Send + Sync>;

/// A renderer-ready accessor.
#[derive(Clone)]
pub enum Accessor {
    Constant(VisualValue),
    Function(AccessorFn),
}

impl Accessor {
    pub fn call(&self, datum: &dyn Datum) -> VisualValue {
        match self {
            Accessor::Constant(value) => value.clone(),
            Accessor::Function(f) => f(datum),
        }
    }

    pub fn as_constant(&self) -> Option<&VisualValue> {
        match self {
            Accessor::Constant(value) => Some(value),
            Accessor::Function(_) => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Accessor::Constant(_))
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accessor::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Accessor::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// When a renderer must re-evaluate an accessor.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateTrigger {
    /// The accessor never changes.
    Never,
    Token(Value),
    Tokens(Vec<Value>),
}

impl UpdateTrigger {
    /// JSON form: `false`, the token, or the token array.
    pub fn to_json(&self) -> Value {
        match self {
            UpdateTrigger::Never => Value::Bool(false),
            UpdateTrigger::Token(token) => token.clone(),
            UpdateTrigger::Tokens(tokens) => Value::Array(tokens.clone()),
        }
    }
}

/// One resolved property of a stylesheet.
#[derive(Debug, Clone)]
pub struct StyleProperty {
    key: StyleKey,
    accessor: Accessor,
    update_trigger: UpdateTrigger,
}

impl StyleProperty {
    /// Resolve `value` for `key`.
    ///
    /// State maps holding only `default` collapse to their default value
    /// and skip state dispatch.
    pub fn new(
        key: StyleKey,
        value: Option<&StyleValue>,
        state_update_trigger: &Value,
    ) -> Result<Self, StyleError> {
        let value = match value {
            Some(StyleValue::Stateful(states)) if is_default_only(states) => {
                states.get(&EntityState::Default)
            }
            other => other,
        };

        match value {
            Some(StyleValue::Stateful(states)) => Self::stateful(key, states, state_update_trigger),
            Some(StyleValue::Attribute(attribute)) => Ok(Self {
                key,
                accessor: resolve(key, value)?,
                update_trigger: UpdateTrigger::Token(attribute.descriptor()),
            }),
            _ => Ok(Self {
                key,
                accessor: resolve(key, value)?,
                update_trigger: UpdateTrigger::Never,
            }),
        }
    }

    fn stateful(
        key: StyleKey,
        states: &BTreeMap<EntityState, StyleValue>,
        state_update_trigger: &Value,
    ) -> Result<Self, StyleError> {
        let mut resolved = BTreeMap::new();
        let mut tokens = vec![state_update_trigger.clone()];
        for (state, value) in states {
            if let StyleValue::Attribute(attribute) = value {
                tokens.push(attribute.descriptor());
            }
            resolved.insert(*state, resolve(key, Some(value))?);
        }
        let fallback = resolved
            .remove(&EntityState::Default)
            .unwrap_or_else(|| Accessor::Constant(key.default_value()));

        let accessor = Accessor::Function(Arc::new(move |datum: &dyn Datum| {
            resolved
                .get(&datum.state())
                .unwrap_or(&fallback)
                .call(datum)
        }));

        let update_trigger = match tokens.len() {
            1 => UpdateTrigger::Token(tokens.remove(0)),
            _ => UpdateTrigger::Tokens(tokens),
        };

        Ok(Self {
            key,
            accessor,
            update_trigger,
        })
    }

    pub fn key(&self) -> StyleKey {
        self.key
    }

    pub fn accessor(&self) -> &Accessor {
        &self.accessor
    }

    pub fn update_trigger(&self) -> &UpdateTrigger {
        &self.update_trigger
    }

    /// Evaluate against `datum`.
    pub fn value(&self, datum: &dyn Datum) -> VisualValue {
        self.accessor.call(datum)
    }
}

fn is_default_only(states: &BTreeMap<EntityState, StyleValue>) -> bool {
    states.keys().all(|state| *state == EntityState::Default)
}

fn resolve(key: StyleKey, value: Option<&StyleValue>) -> Result<Accessor, StyleError> {
    match value {
        None => Ok(Accessor::Constant(key.default_value())),
        Some(StyleValue::Literal(literal)) => key.format(literal).map(Accessor::Constant),
        Some(StyleValue::Attribute(attribute)) => attribute_accessor(key, attribute),
        Some(StyleValue::Function(resolver)) => {
            let resolver = resolver.clone();
            Ok(Accessor::Function(Arc::new(move |datum: &dyn Datum| {
                format_or_default(key, &resolver(datum))
            })))
        }
        Some(StyleValue::Stateful(_)) => Err(StyleError::NestedStateMap(key.to_string())),
    }
}

fn attribute_accessor(key: StyleKey, attribute: &AttributeRef) -> Result<Accessor, StyleError> {
    let scale = attribute.scale.clone().map(Scale::new).transpose()?;
    let name = attribute.attribute.clone();

    // The fallback is declared in the stylesheet, so it must format now.
    let fallback = match &attribute.fallback {
        Some(fallback) => {
            let scaled = match &scale {
                Some(scale) => scale.apply(fallback).ok_or_else(|| {
                    StyleError::invalid(key.as_str(), format!("scale cannot map fallback {fallback}"))
                })?,
                None => fallback.clone(),
            };
            key.format(&scaled)?
        }
        None => key.default_value(),
    };

    Ok(Accessor::Function(Arc::new(move |datum: &dyn Datum| {
        let Some(raw) = datum.property(&name) else {
            return fallback.clone();
        };
        let scaled = match &scale {
            Some(scale) => scale.apply(&raw),
            None => Some(raw),
        };
        match scaled.map(|value| key.format(&value)) {
            Some(Ok(value)) => value,
            Some(Err(error)) => {
                warn!(property = %key, %error, "attribute value failed to format, using fallback");
                fallback.clone()
            }
            None => fallback.clone(),
        }
    })))
}

fn format_or_default(key: StyleKey, value: &Value) -> VisualValue {
    key.format(value).unwrap_or_else(|error| {
        warn!(property = %key, %error, "style value failed to format, using default");
        key.default_value()
    })
}

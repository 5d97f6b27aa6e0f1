//! Declarative style values.
//!
//! A [`StyleValue`] is what a stylesheet author writes for one property:
//! a literal, a reference to an entity attribute, a resolver function, or a
//! map from interaction state to one of the former. Values are parsed from
//! JSON or built in code; functions can only be supplied from code.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::scale::ScaleConfig;
use crate::error::StyleError;
use crate::graph::{Edge, EntityState, Node};

/// An entity a style accessor can be evaluated against.
pub trait Datum {
    /// Look up a property; missing and `null` are both `None`.
    fn property(&self, key: &str) -> Option<Value>;

    /// Current interaction state.
    fn state(&self) -> EntityState;
}

impl Datum for Node {
    fn property(&self, key: &str) -> Option<Value> {
        Node::property(self, key)
    }

    fn state(&self) -> EntityState {
        Node::state(self)
    }
}

impl Datum for Edge {
    fn property(&self, key: &str) -> Option<Value> {
        Edge::property(self, key)
    }

    fn state(&self) -> EntityState {
        Edge::state(self)
    }
}

/// Plain JSON objects, with the interaction state under `state`.
impl Datum for Value {
    fn property(&self, key: &str) -> Option<Value> {
        self.get(key).filter(|value| !value.is_null()).cloned()
    }

    fn state(&self) -> EntityState {
        self.get("state")
            .and_then(Value::as_str)
            .and_then(|state| state.parse().ok())
            .unwrap_or_default()
    }
}

/// Keys that make an object an attribute reference.
pub(crate) const RESERVED_KEYS: [&str; 3] = ["attribute", "fallback", "scale"];

/// Reads a named property off the datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRef {
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleConfig>,
}

impl AttributeRef {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            fallback: None,
            scale: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<Value>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn with_scale(mut self, scale: ScaleConfig) -> Self {
        self.scale = Some(scale);
        self
    }

    /// The `{attribute, scale}` descriptor used as an update trigger token.
    pub fn descriptor(&self) -> Value {
        let mut descriptor = Map::new();
        descriptor.insert("attribute".to_owned(), Value::from(self.attribute.as_str()));
        descriptor.insert(
            "scale".to_owned(),
            self.scale.as_ref().map_or(Value::Null, ScaleConfig::to_json),
        );
        Value::Object(descriptor)
    }

    fn from_object(property: &str, object: &Map<String, Value>) -> Result<Self, StyleError> {
        if let Some(unknown) = object.keys().find(|key| !RESERVED_KEYS.contains(&key.as_str())) {
            return Err(StyleError::invalid(
                property,
                format!("unexpected key `{unknown}` in attribute reference"),
            ));
        }
        let attribute = object
            .get("attribute")
            .and_then(Value::as_str)
            .ok_or_else(|| StyleError::invalid(property, "`attribute` must be a string"))?;
        let scale = match object.get("scale") {
            None | Some(Value::Null) => None,
            Some(scale) => Some(ScaleConfig::from_json(scale)?),
        };
        Ok(Self {
            attribute: attribute.to_owned(),
            fallback: object.get("fallback").filter(|v| !v.is_null()).cloned(),
            scale,
        })
    }
}

/// Computes a raw value from a datum.
pub type ResolverFn = Arc<dyn Fn(&dyn Datum) -> Value + Send + Sync>;

/// One declarative style value.
#[derive(Clone)]
pub enum StyleValue {
    Literal(Value),
    Attribute(AttributeRef),
    Function(ResolverFn),
    Stateful(BTreeMap<EntityState, StyleValue>),
}

impl StyleValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        StyleValue::Literal(value.into())
    }

    pub fn attribute(attribute: AttributeRef) -> Self {
        StyleValue::Attribute(attribute)
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&dyn Datum) -> Value + Send + Sync + 'static,
    {
        StyleValue::Function(Arc::new(f))
    }

    pub fn stateful<I>(states: I) -> Self
    where
        I: IntoIterator<Item = (EntityState, StyleValue)>,
    {
        StyleValue::Stateful(states.into_iter().collect())
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self, StyleValue::Stateful(_))
    }

    /// Parse the JSON written for `property`. `null` means undefined.
    pub fn from_json(property: &str, value: &Value) -> Result<Option<Self>, StyleError> {
        let Value::Object(object) = value else {
            return Ok(leaf(value));
        };

        if object.contains_key("attribute") {
            return AttributeRef::from_object(property, object).map(|a| Some(StyleValue::Attribute(a)));
        }
        if let Some(reserved) = RESERVED_KEYS.iter().find(|key| object.contains_key(**key)) {
            return Err(StyleError::ReservedState((*reserved).to_owned()));
        }

        let mut states = BTreeMap::new();
        for (name, value) in object {
            let state: EntityState = name
                .parse()
                .map_err(StyleError::UnknownState)?;
            match value {
                Value::Object(inner) if inner.contains_key("attribute") => {
                    states.insert(
                        state,
                        StyleValue::Attribute(AttributeRef::from_object(property, inner)?),
                    );
                }
                Value::Object(_) => return Err(StyleError::NestedStateMap(property.to_owned())),
                value => {
                    if let Some(value) = leaf(value) {
                        states.insert(state, value);
                    }
                }
            }
        }
        Ok(Some(StyleValue::Stateful(states)))
    }
}

fn leaf(value: &Value) -> Option<StyleValue> {
    (!value.is_null()).then(|| StyleValue::Literal(value.clone()))
}

impl fmt::Debug for StyleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StyleValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            StyleValue::Attribute(attribute) => f.debug_tuple("Attribute").field(attribute).finish(),
            StyleValue::Function(_) => f.write_str("Function(..)"),
            StyleValue::Stateful(states) => f.debug_tuple("Stateful").field(states).finish(),
        }
    }
}

impl From<Value> for StyleValue {
    fn from(value: Value) -> Self {
        StyleValue::Literal(value)
    }
}

impl From<AttributeRef> for StyleValue {
    fn from(attribute: AttributeRef) -> Self {
        StyleValue::Attribute(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literals_and_undefined() {
        assert!(matches!(
            StyleValue::from_json("radius", &json!(5)),
            Ok(Some(StyleValue::Literal(v))) if v == json!(5)
        ));
        assert!(StyleValue::from_json("radius", &Value::Null).unwrap().is_none());
    }

    #[test]
    fn attribute_reference() {
        let value = StyleValue::from_json(
            "radius",
            &json!({"attribute": "weight", "fallback": 1, "scale": {"type": "linear"}}),
        )
        .unwrap();
        let Some(StyleValue::Attribute(attribute)) = value else {
            panic!("expected an attribute reference");
        };
        assert_eq!(attribute.attribute, "weight");
        assert_eq!(attribute.fallback, Some(json!(1)));
        assert_eq!(
            attribute.descriptor(),
            json!({"attribute": "weight", "scale": {"type": "linear"}})
        );
    }

    #[test]
    fn state_maps() {
        let value = StyleValue::from_json(
            "fill",
            &json!({"default": "#fff", "hover": {"attribute": "color"}, "selected": null}),
        )
        .unwrap();
        let Some(StyleValue::Stateful(states)) = value else {
            panic!("expected a state map");
        };
        assert_eq!(states.len(), 2);
        assert!(matches!(states[&EntityState::Hover], StyleValue::Attribute(_)));
    }

    #[test]
    fn malformed_state_maps() {
        assert!(matches!(
            StyleValue::from_json("fill", &json!({"fallback": 1, "hover": 2})),
            Err(StyleError::ReservedState(key)) if key == "fallback"
        ));
        assert!(matches!(
            StyleValue::from_json("fill", &json!({"pressed": 1})),
            Err(StyleError::UnknownState(_))
        ));
        assert!(matches!(
            StyleValue::from_json("fill", &json!({"hover": {"default": 1}})),
            Err(StyleError::NestedStateMap(_))
        ));
    }

    #[test]
    fn attribute_reference_rejects_stray_keys() {
        assert!(matches!(
            StyleValue::from_json(
                "fill",
                &json!({"attribute": "c", "hover": "#ff0000", "fallbak": "#00ff00"})
            ),
            Err(StyleError::InvalidValue { property, .. }) if property == "fill"
        ));
        assert!(matches!(
            StyleValue::from_json("fill", &json!({"hover": {"attribute": "c", "colour": 1}})),
            Err(StyleError::InvalidValue { .. })
        ));
    }

    #[test]
    fn json_datum() {
        let datum = json!({"weight": 3, "state": "hover", "gone": null});
        assert_eq!(Datum::property(&datum, "weight"), Some(json!(3)));
        assert_eq!(Datum::property(&datum, "gone"), None);
        assert_eq!(Datum::state(&datum), EntityState::Hover);
        assert_eq!(Datum::state(&json!({})), EntityState::Default);
    }
}

//! Style types, property keys and visual accessors.
//!
//! Three closed vocabularies meet here:
//!
//! - [`StyleType`]: what a stylesheet draws (`circle`, `edge`, `label`, ...).
//! - [`StyleKey`]: the declarative property names a stylesheet uses
//!   (`fill`, `radius`, ...). Each key knows its [`FormatKind`] and its
//!   default [`VisualValue`].
//! - [`VisualAccessor`]: the renderer-facing accessor names
//!   (`getFillColor`, `getRadius`, ...).
//!
//! Every style type maps a fixed set of accessors onto keys. The same key
//! may back different accessors on different types, e.g. `getColor` reads
//! `fill` on a marker and `stroke` on an edge.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::color::{self, Rgba};
use crate::error::StyleError;

/// A fully formatted visual value, ready for a renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualValue {
    Color(Rgba),
    Number(f64),
    Bool(bool),
    Text(String),
    Vector([f64; 2]),
}

impl VisualValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            VisualValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Rgba> {
        match self {
            VisualValue::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VisualValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            VisualValue::Color(c) => Value::from(c.to_vec()),
            VisualValue::Number(n) => Value::from(*n),
            VisualValue::Bool(b) => Value::from(*b),
            VisualValue::Text(s) => Value::from(s.as_str()),
            VisualValue::Vector(v) => Value::from(v.to_vec()),
        }
    }
}

/// How a raw declarative value is turned into a [`VisualValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Color,
    Number,
    Bool,
    Text,
    Vector,
    Choice(&'static [&'static str]),
}

impl FormatKind {
    fn format(self, property: &str, value: &Value) -> Result<VisualValue, StyleError> {
        match self {
            FormatKind::Color => color::parse_color(value).map(VisualValue::Color),
            FormatKind::Number => number(value)
                .map(VisualValue::Number)
                .ok_or_else(|| StyleError::invalid(property, format!("expected a number, got {value}"))),
            FormatKind::Bool => value
                .as_bool()
                .map(VisualValue::Bool)
                .ok_or_else(|| StyleError::invalid(property, format!("expected a boolean, got {value}"))),
            FormatKind::Text => match value {
                Value::String(s) => Ok(VisualValue::Text(s.clone())),
                Value::Number(n) => Ok(VisualValue::Text(n.to_string())),
                Value::Bool(b) => Ok(VisualValue::Text(b.to_string())),
                _ => Err(StyleError::invalid(property, format!("expected text, got {value}"))),
            },
            FormatKind::Vector => match value.as_array().map(Vec::as_slice) {
                Some([x, y]) => match (number(x), number(y)) {
                    (Some(x), Some(y)) => Ok(VisualValue::Vector([x, y])),
                    _ => Err(StyleError::invalid(property, format!("expected [x, y], got {value}"))),
                },
                _ => Err(StyleError::invalid(property, format!("expected [x, y], got {value}"))),
            },
            FormatKind::Choice(choices) => match value.as_str() {
                Some(s) if choices.contains(&s) => Ok(VisualValue::Text(s.to_owned())),
                _ => Err(StyleError::invalid(
                    property,
                    format!("expected one of {choices:?}, got {value}"),
                )),
            },
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name { $($variant),+ }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self { $($name::$variant => $text),+ }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name { $($text => Some($name::$variant),)+ _ => None }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

named_enum! {
    /// What a stylesheet draws.
    pub enum StyleType {
        Circle => "circle",
        Rectangle => "rectangle",
        RoundedRectangle => "rounded-rectangle",
        PathRoundedRectangle => "path-rounded-rectangle",
        Icon => "icon",
        Label => "label",
        Marker => "marker",
        Edge => "edge",
        EdgeLabel => "edge-label",
        Flow => "flow",
    }
}

named_enum! {
    /// A declarative style property.
    pub enum StyleKey {
        Opacity => "opacity",
        Fill => "fill",
        Stroke => "stroke",
        StrokeWidth => "strokeWidth",
        Radius => "radius",
        Offset => "offset",
        Width => "width",
        Height => "height",
        CornerRadius => "cornerRadius",
        Text => "text",
        Color => "color",
        FontSize => "fontSize",
        TextAnchor => "textAnchor",
        AlignmentBaseline => "alignmentBaseline",
        Angle => "angle",
        Icon => "icon",
        Size => "size",
        Marker => "marker",
        ScaleWithZoom => "scaleWithZoom",
        TextMaxWidth => "textMaxWidth",
        TextWordBreak => "textWordBreak",
        TextSizeMinPixels => "textSizeMinPixels",
        Speed => "speed",
        TailLength => "tailLength",
    }
}

named_enum! {
    /// A renderer-facing accessor name.
    pub enum VisualAccessor {
        GetOffset => "getOffset",
        Opacity => "opacity",
        GetFillColor => "getFillColor",
        GetLineColor => "getLineColor",
        GetLineWidth => "getLineWidth",
        GetRadius => "getRadius",
        GetWidth => "getWidth",
        GetHeight => "getHeight",
        GetCornerRadius => "getCornerRadius",
        GetColor => "getColor",
        GetText => "getText",
        GetSize => "getSize",
        GetTextAnchor => "getTextAnchor",
        GetAlignmentBaseline => "getAlignmentBaseline",
        GetAngle => "getAngle",
        GetIcon => "getIcon",
        GetMarker => "getMarker",
        ScaleWithZoom => "scaleWithZoom",
        TextMaxWidth => "textMaxWidth",
        TextWordBreak => "textWordBreak",
        TextSizeMinPixels => "textSizeMinPixels",
        GetSpeed => "getSpeed",
        GetTailLength => "getTailLength",
    }
}

impl FromStr for StyleType {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StyleType::from_name(s).ok_or_else(|| StyleError::UnknownType(s.to_owned()))
    }
}

impl FromStr for StyleKey {
    type Err = StyleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StyleKey::from_name(s).ok_or_else(|| StyleError::UnknownProperty(s.to_owned()))
    }
}

const TEXT_ANCHORS: &[&str] = &["start", "middle", "end"];
const ALIGNMENT_BASELINES: &[&str] = &["top", "center", "bottom"];
const WORD_BREAKS: &[&str] = &["break-all", "break-word"];

const BLACK: Rgba = [0, 0, 0, 255];

impl StyleKey {
    pub fn format_kind(self) -> FormatKind {
        use StyleKey::*;
        match self {
            Fill | Stroke | Color => FormatKind::Color,
            Opacity | StrokeWidth | Radius | Width | Height | CornerRadius | FontSize | Angle
            | Size | TextMaxWidth | TextSizeMinPixels | Speed | TailLength => FormatKind::Number,
            ScaleWithZoom => FormatKind::Bool,
            Text | Icon | Marker => FormatKind::Text,
            Offset => FormatKind::Vector,
            TextAnchor => FormatKind::Choice(TEXT_ANCHORS),
            AlignmentBaseline => FormatKind::Choice(ALIGNMENT_BASELINES),
            TextWordBreak => FormatKind::Choice(WORD_BREAKS),
        }
    }

    /// Value used when a stylesheet leaves the key undefined.
    pub fn default_value(self) -> VisualValue {
        use StyleKey::*;
        match self {
            Opacity => VisualValue::Number(1.0),
            Fill | Stroke | Color => VisualValue::Color(BLACK),
            StrokeWidth | Width | Height | CornerRadius | Angle | Speed => VisualValue::Number(0.0),
            Radius | Size | TailLength => VisualValue::Number(1.0),
            Offset => VisualValue::Vector([0.0, 0.0]),
            Text | Icon => VisualValue::Text(String::new()),
            FontSize => VisualValue::Number(12.0),
            TextAnchor => VisualValue::Text("middle".to_owned()),
            AlignmentBaseline => VisualValue::Text("center".to_owned()),
            Marker => VisualValue::Text("circle".to_owned()),
            ScaleWithZoom => VisualValue::Bool(true),
            TextMaxWidth => VisualValue::Number(-1.0),
            TextWordBreak => VisualValue::Text("break-all".to_owned()),
            TextSizeMinPixels => VisualValue::Number(9.0),
        }
    }

    /// Format a raw declarative value for this key.
    pub fn format(self, value: &Value) -> Result<VisualValue, StyleError> {
        self.format_kind().format(self.as_str(), value)
    }
}

use StyleKey as K;
use VisualAccessor as A;

const CIRCLE: &[(A, K)] = &[
    (A::GetOffset, K::Offset),
    (A::Opacity, K::Opacity),
    (A::GetFillColor, K::Fill),
    (A::GetLineColor, K::Stroke),
    (A::GetLineWidth, K::StrokeWidth),
    (A::GetRadius, K::Radius),
];

const RECTANGLE: &[(A, K)] = &[
    (A::GetOffset, K::Offset),
    (A::Opacity, K::Opacity),
    (A::GetWidth, K::Width),
    (A::GetHeight, K::Height),
    (A::GetFillColor, K::Fill),
    (A::GetLineColor, K::Stroke),
    (A::GetLineWidth, K::StrokeWidth),
];

const ROUNDED_RECTANGLE: &[(A, K)] = &[
    (A::GetOffset, K::Offset),
    (A::Opacity, K::Opacity),
    (A::GetWidth, K::Width),
    (A::GetHeight, K::Height),
    (A::GetFillColor, K::Fill),
    (A::GetLineColor, K::Stroke),
    (A::GetLineWidth, K::StrokeWidth),
    (A::GetCornerRadius, K::CornerRadius),
    (A::GetRadius, K::Radius),
];

const LABEL: &[(A, K)] = &[
    (A::GetOffset, K::Offset),
    (A::Opacity, K::Opacity),
    (A::GetColor, K::Color),
    (A::GetText, K::Text),
    (A::GetSize, K::FontSize),
    (A::GetTextAnchor, K::TextAnchor),
    (A::GetAlignmentBaseline, K::AlignmentBaseline),
    (A::GetAngle, K::Angle),
    (A::ScaleWithZoom, K::ScaleWithZoom),
    (A::TextMaxWidth, K::TextMaxWidth),
    (A::TextWordBreak, K::TextWordBreak),
    (A::TextSizeMinPixels, K::TextSizeMinPixels),
];

const ICON: &[(A, K)] = &[
    (A::GetOffset, K::Offset),
    (A::Opacity, K::Opacity),
    (A::GetIcon, K::Icon),
    (A::GetSize, K::Size),
    (A::ScaleWithZoom, K::ScaleWithZoom),
];

const MARKER: &[(A, K)] = &[
    (A::GetOffset, K::Offset),
    (A::Opacity, K::Opacity),
    (A::GetColor, K::Fill),
    (A::GetSize, K::Size),
    (A::GetMarker, K::Marker),
    (A::ScaleWithZoom, K::ScaleWithZoom),
];

const EDGE: &[(A, K)] = &[
    (A::Opacity, K::Opacity),
    (A::GetColor, K::Stroke),
    (A::GetWidth, K::StrokeWidth),
];

const FLOW: &[(A, K)] = &[
    (A::Opacity, K::Opacity),
    (A::GetColor, K::Color),
    (A::GetWidth, K::Width),
    (A::GetSpeed, K::Speed),
    (A::GetTailLength, K::TailLength),
];

impl StyleType {
    /// Accessor → key table of this type.
    pub fn accessors(self) -> &'static [(VisualAccessor, StyleKey)] {
        match self {
            StyleType::Circle => CIRCLE,
            StyleType::Rectangle => RECTANGLE,
            StyleType::RoundedRectangle | StyleType::PathRoundedRectangle => ROUNDED_RECTANGLE,
            StyleType::Icon => ICON,
            StyleType::Label | StyleType::EdgeLabel => LABEL,
            StyleType::Marker => MARKER,
            StyleType::Edge => EDGE,
            StyleType::Flow => FLOW,
        }
    }

    /// The key an accessor reads on this type, if the type has it.
    pub fn key_for(self, accessor: VisualAccessor) -> Option<StyleKey> {
        self.accessors()
            .iter()
            .find(|(a, _)| *a == accessor)
            .map(|(_, key)| *key)
    }

    pub fn uses_key(self, key: StyleKey) -> bool {
        self.accessors().iter().any(|(_, k)| *k == key)
    }

    pub fn is_edge_style(self) -> bool {
        matches!(self, StyleType::Edge | StyleType::EdgeLabel | StyleType::Flow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn names_round_trip() {
        for ty in StyleType::ALL {
            assert_eq!(ty.as_str().parse::<StyleType>().unwrap(), *ty);
        }
        for key in StyleKey::ALL {
            assert_eq!(StyleKey::from_name(key.as_str()), Some(*key));
        }
        assert!(matches!("hexagon".parse::<StyleType>(), Err(StyleError::UnknownType(_))));
    }

    #[test]
    fn accessor_tables() {
        assert_eq!(StyleType::Circle.key_for(VisualAccessor::GetRadius), Some(StyleKey::Radius));
        assert_eq!(StyleType::Marker.key_for(VisualAccessor::GetColor), Some(StyleKey::Fill));
        assert_eq!(StyleType::Edge.key_for(VisualAccessor::GetColor), Some(StyleKey::Stroke));
        assert_eq!(StyleType::Label.key_for(VisualAccessor::GetSize), Some(StyleKey::FontSize));
        assert_eq!(StyleType::Edge.key_for(VisualAccessor::GetRadius), None);
        assert!(StyleType::Flow.is_edge_style());
    }

    #[test]
    fn formatting() {
        assert_eq!(StyleKey::Radius.format(&json!(5)).unwrap(), VisualValue::Number(5.0));
        assert_eq!(StyleKey::Radius.format(&json!("2.5")).unwrap(), VisualValue::Number(2.5));
        assert_eq!(
            StyleKey::Offset.format(&json!([1, -2])).unwrap(),
            VisualValue::Vector([1.0, -2.0])
        );
        assert_eq!(
            StyleKey::Fill.format(&json!("#ff0000")).unwrap(),
            VisualValue::Color([255, 0, 0, 255])
        );
        assert!(StyleKey::TextAnchor.format(&json!("left")).is_err());
        assert!(StyleKey::Radius.format(&json!({"x": 1})).is_err());
        assert!(StyleKey::ScaleWithZoom.format(&json!("yes")).is_err());
    }

    #[test]
    fn defaults_are_well_formed() {
        for key in StyleKey::ALL {
            let default = key.default_value();
            assert_eq!(key.format(&default.to_json()).unwrap(), default, "{key}");
        }
    }
}

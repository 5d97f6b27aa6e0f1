//! Style Resolution
//!
//! Turns declarative stylesheets into renderer-ready accessors.
//!
//! ```text
//! JSON / StyleDeclaration ──► merge rules and selectors per key
//!                             │
//!                             ▼
//!                       StyleProperty (one per key)
//!                        ├─ Accessor       constant or fn(&dyn Datum)
//!                        └─ UpdateTrigger  never / token / tokens
//!                             │
//!                             ▼
//!        Stylesheet::get_deck_gl_accessors / get_deck_gl_update_triggers
//! ```
//!
//! All parsing and validation happens in [`Stylesheet::new`]. Accessors
//! never fail at call time: a value that cannot be formatted degrades to
//! the property's default and is logged.

mod color;
mod property;
mod scale;
mod stylesheet;
mod types;
mod value;

pub use color::{parse_color, parse_color_str, Rgba};
pub use property::{Accessor, AccessorFn, StyleProperty, UpdateTrigger};
pub use scale::{Nice, Scale, ScaleConfig, ScaleKind};
pub use stylesheet::{StyleDeclaration, Stylesheet};
pub use types::{FormatKind, StyleKey, StyleType, VisualAccessor, VisualValue};
pub use value::{AttributeRef, Datum, ResolverFn, StyleValue};

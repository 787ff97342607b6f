//! Editable component properties.
//!
//! The property panel edits a list of descriptors. The kind of each property
//! is carried by its value variant, so a numeric property cannot hold text.

use crate::error::{ForgeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The kind of a component property, without its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PropertyKind {
    Text,
    Number,
    Boolean,
    Color,
    Choice,
    MultilineText,
}

/// Typed value of a component property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyValue {
    Text {
        value: String,
    },
    Number {
        value: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    Boolean {
        value: bool,
    },
    /// Hex color, `#rgb` or `#rrggbb`.
    Color {
        value: String,
    },
    /// Enumerated choice; `value` must be one of `options`.
    Choice {
        value: String,
        options: Vec<String>,
    },
    MultilineText {
        value: String,
    },
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Text { .. } => PropertyKind::Text,
            Self::Number { .. } => PropertyKind::Number,
            Self::Boolean { .. } => PropertyKind::Boolean,
            Self::Color { .. } => PropertyKind::Color,
            Self::Choice { .. } => PropertyKind::Choice,
            Self::MultilineText { .. } => PropertyKind::MultilineText,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        match self {
            Self::Number {
                value,
                min,
                max,
                step,
            } => {
                if !value.is_finite() {
                    return Err(invalid(name, "value must be a finite number"));
                }
                if let (Some(min), Some(max)) = (min, max)
                    && min > max
                {
                    return Err(invalid(name, format!("min {} exceeds max {}", min, max)));
                }
                if let Some(step) = step
                    && !(step.is_finite() && *step > 0.0)
                {
                    return Err(invalid(name, "step must be positive"));
                }
                if min.is_some_and(|min| *value < min) || max.is_some_and(|max| *value > max) {
                    return Err(invalid(name, format!("value {} is out of range", value)));
                }
                Ok(())
            }
            Self::Color { value } => {
                if is_hex_color(value) {
                    Ok(())
                } else {
                    Err(invalid(name, format!("'{}' is not a hex color", value)))
                }
            }
            Self::Choice { value, options } => {
                if options.is_empty() {
                    return Err(invalid(name, "choice needs at least one option"));
                }
                if !options.contains(value) {
                    return Err(invalid(name, format!("'{}' is not one of the options", value)));
                }
                Ok(())
            }
            Self::Text { .. } | Self::Boolean { .. } | Self::MultilineText { .. } => Ok(()),
        }
    }
}

/// A single editable property descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentProperty {
    /// Property name, unique within a session's property list.
    pub name: String,
    #[serde(flatten)]
    pub value: PropertyValue,
}

impl ComponentProperty {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn kind(&self) -> PropertyKind {
        self.value.kind()
    }

    /// The property panel shown for a freshly generated component.
    pub fn default_panel() -> Vec<ComponentProperty> {
        vec![
            Self::new(
                "text",
                PropertyValue::Text {
                    value: "Hello World".to_string(),
                },
            ),
            Self::new(
                "color",
                PropertyValue::Color {
                    value: "#3b82f6".to_string(),
                },
            ),
            Self::new(
                "size",
                PropertyValue::Choice {
                    value: "medium".to_string(),
                    options: vec!["small".into(), "medium".into(), "large".into()],
                },
            ),
            Self::new("disabled", PropertyValue::Boolean { value: false }),
            Self::new(
                "padding",
                PropertyValue::Number {
                    value: 16.0,
                    min: Some(0.0),
                    max: Some(100.0),
                    step: Some(1.0),
                },
            ),
            Self::new(
                "description",
                PropertyValue::MultilineText {
                    value: "Component description".to_string(),
                },
            ),
        ]
    }
}

/// Validates a whole property list before it replaces the live one.
///
/// # Errors
///
/// Returns `InvalidInput` on the first empty or duplicate name or on a value
/// that violates its kind's constraints.
pub fn validate_properties(properties: &[ComponentProperty]) -> Result<()> {
    let mut seen = HashSet::new();
    for property in properties {
        let name = property.name.trim();
        if name.is_empty() {
            return Err(ForgeError::invalid_input("property name must not be empty"));
        }
        if !seen.insert(name) {
            return Err(ForgeError::invalid_input(format!(
                "duplicate property name '{}'",
                name
            )));
        }
        property.value.validate(name)?;
    }
    Ok(())
}

fn invalid(name: &str, reason: impl std::fmt::Display) -> ForgeError {
    ForgeError::invalid_input(format!("property '{}': {}", name, reason))
}

fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

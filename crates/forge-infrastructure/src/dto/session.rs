//! Session DTOs and migrations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use version_migrate::{IntoDomain, MigratesTo, Versioned};

use forge_core::session::{
    ChatMessage, ComponentProperty, GeneratedCode, MessageRole, PropertyValue, Session,
};

// ============================================================================
// Legacy building blocks (shared with the remote wire format)
// ============================================================================

/// Chat message as the browser client stored it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageV1_0_0 {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessageV1_0_0 {
    /// Converts to the domain message; unknown roles yield `None`.
    pub fn into_domain(self) -> Option<ChatMessage> {
        match self.role.parse::<MessageRole>() {
            Ok(role) => Some(ChatMessage {
                role,
                content: self.content,
                timestamp: self.timestamp,
            }),
            Err(_) => {
                tracing::warn!("Dropped chat message with unknown role '{}'", self.role);
                None
            }
        }
    }

    pub fn from_domain(message: &ChatMessage) -> Self {
        Self {
            role: message.role.to_string(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}

/// Generated code under its browser-era names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCodeV1_0_0 {
    #[serde(default)]
    pub jsx: String,
    #[serde(default)]
    pub css: String,
}

impl From<GeneratedCodeV1_0_0> for GeneratedCode {
    fn from(code: GeneratedCodeV1_0_0) -> Self {
        GeneratedCode::new(code.jsx, code.css)
    }
}

impl From<&GeneratedCode> for GeneratedCodeV1_0_0 {
    fn from(code: &GeneratedCode) -> Self {
        Self {
            jsx: code.markup.clone(),
            css: code.style.clone(),
        }
    }
}

/// Property descriptor tagged by a free-form `type` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentPropertyV1_0_0 {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl ComponentPropertyV1_0_0 {
    /// Converts to the typed domain property.
    ///
    /// Returns `None` when the `type` tag is unknown or the value does not
    /// match it.
    pub fn into_domain(self) -> Option<ComponentProperty> {
        let value = match self.kind.as_str() {
            "string" => PropertyValue::Text {
                value: self.value.as_str()?.to_string(),
            },
            "textarea" => PropertyValue::MultilineText {
                value: self.value.as_str()?.to_string(),
            },
            "color" => PropertyValue::Color {
                value: self.value.as_str()?.to_string(),
            },
            "boolean" => PropertyValue::Boolean {
                value: self.value.as_bool()?,
            },
            "number" => PropertyValue::Number {
                value: self.value.as_f64()?,
                min: self.min,
                max: self.max,
                step: self.step,
            },
            "select" => PropertyValue::Choice {
                value: self.value.as_str()?.to_string(),
                options: self.options.unwrap_or_default(),
            },
            _ => return None,
        };
        Some(ComponentProperty::new(self.name, value))
    }

    pub fn from_domain(property: &ComponentProperty) -> Self {
        let mut dto = Self {
            name: property.name.clone(),
            kind: String::new(),
            value: serde_json::Value::Null,
            options: None,
            min: None,
            max: None,
            step: None,
        };
        match &property.value {
            PropertyValue::Text { value } => {
                dto.kind = "string".into();
                dto.value = value.clone().into();
            }
            PropertyValue::MultilineText { value } => {
                dto.kind = "textarea".into();
                dto.value = value.clone().into();
            }
            PropertyValue::Color { value } => {
                dto.kind = "color".into();
                dto.value = value.clone().into();
            }
            PropertyValue::Boolean { value } => {
                dto.kind = "boolean".into();
                dto.value = (*value).into();
            }
            PropertyValue::Number {
                value,
                min,
                max,
                step,
            } => {
                dto.kind = "number".into();
                dto.value = (*value).into();
                dto.min = *min;
                dto.max = *max;
                dto.step = *step;
            }
            PropertyValue::Choice { value, options } => {
                dto.kind = "select".into();
                dto.value = value.clone().into();
                dto.options = Some(options.clone());
            }
        }
        dto
    }
}

/// Converts legacy properties, dropping the ones that no longer type-check.
pub fn properties_into_domain(properties: Vec<ComponentPropertyV1_0_0>) -> Vec<ComponentProperty> {
    properties
        .into_iter()
        .filter_map(|p| {
            let name = p.name.clone();
            let converted = p.into_domain();
            if converted.is_none() {
                tracing::warn!("Dropped component property '{}' with mismatched type", name);
            }
            converted
        })
        .collect()
}

// ============================================================================
// Session DTOs
// ============================================================================

/// Represents V1.0.0 of the session data schema.
/// Browser-era naming: `_id`, `sessionName`, camelCase fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "1.0.0")]
#[serde(rename_all = "camelCase")]
pub struct SessionV1_0_0 {
    #[serde(rename = "_id")]
    pub id: String,
    pub session_name: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessageV1_0_0>,
    #[serde(default)]
    pub generated_code: GeneratedCodeV1_0_0,
    #[serde(default)]
    pub component_properties: Vec<ComponentPropertyV1_0_0>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Represents V2.0.0 of the session data schema.
/// Canonical field names and the persisted `revision`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Versioned)]
#[versioned(version = "2.0.0")]
pub struct SessionV2_0_0 {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    pub generated_code: GeneratedCode,
    #[serde(default)]
    pub component_properties: Vec<ComponentProperty>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub revision: u64,
}

// ============================================================================
// Migrations
// ============================================================================

/// Migration from V1.0.0 to V2.0.0.
/// Renames fields and types the property descriptors. Never-revisioned
/// records start at revision 0.
impl MigratesTo<SessionV2_0_0> for SessionV1_0_0 {
    fn migrate(self) -> SessionV2_0_0 {
        SessionV2_0_0 {
            id: self.id,
            name: self.session_name,
            chat_history: self
                .chat_history
                .into_iter()
                .filter_map(ChatMessageV1_0_0::into_domain)
                .collect(),
            generated_code: self.generated_code.into(),
            component_properties: properties_into_domain(self.component_properties),
            created_at: self.created_at,
            last_modified: self.last_modified,
            revision: 0,
        }
    }
}

// ============================================================================
// Domain model conversions
// ============================================================================

impl IntoDomain<Session> for SessionV2_0_0 {
    fn into_domain(self) -> Session {
        Session {
            id: self.id,
            name: self.name,
            chat_history: self.chat_history,
            generated_code: self.generated_code,
            component_properties: self.component_properties,
            created_at: self.created_at,
            last_modified: self.last_modified,
            revision: self.revision,
        }
    }
}

impl version_migrate::FromDomain<Session> for SessionV2_0_0 {
    fn from_domain(session: Session) -> Self {
        let Session {
            id,
            name,
            chat_history,
            generated_code,
            component_properties,
            created_at,
            last_modified,
            revision,
        } = session;

        SessionV2_0_0 {
            id,
            name,
            chat_history,
            generated_code,
            component_properties,
            created_at,
            last_modified,
            revision,
        }
    }
}

// ============================================================================
// Migrator factory
// ============================================================================

/// Creates and configures a Migrator instance for Session entities.
///
/// # Migration Path
///
/// - V1.0.0 → V2.0.0: Renames `_id`/`sessionName`/`jsx`/`css`, types property tags
/// - V2.0.0 → Session: Converts DTO to domain model
pub fn create_session_migrator() -> version_migrate::Migrator {
    let mut migrator = version_migrate::Migrator::builder().build();

    let session_path = version_migrate::Migrator::define("session")
        .from::<SessionV1_0_0>()
        .step::<SessionV2_0_0>()
        .into_with_save::<Session>();

    migrator
        .register(session_path)
        .expect("Failed to register session migration path");

    migrator
}

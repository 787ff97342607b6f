//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs represent the versioned schema for persisting sessions.
//! They are private to the infrastructure layer and absorb the difference
//! between backend field naming and the canonical domain model.
//!
//! ### Session Version History
//! - **1.0.0**: Browser-era record (`_id`, `sessionName`, `generatedCode.{jsx,css}`,
//!   property `type` tags)
//! - **2.0.0**: Canonical field names plus `revision`

mod session;

pub use session::{
    ChatMessageV1_0_0, ComponentPropertyV1_0_0, GeneratedCodeV1_0_0, SessionV1_0_0,
    SessionV2_0_0, create_session_migrator, properties_into_domain,
};

// precedent-core/src/ids.rs
// ============================================================================
// Module: Precedent Identifiers
// Description: Canonical typed identifiers for organizations, agents, and traces.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Every record in Precedent is keyed by a version-4 UUID wrapped in a
//! dedicated newtype so tenant, agent, and decision identifiers cannot be
//! confused at call sites. The one exception is [`AgentKey`], the
//! human-readable agent name that is unique within an organization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype with the shared helper surface.
macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses the identifier from its canonical string form.
            ///
            /// # Errors
            ///
            /// Returns [`IdParseError`] when the input is not a valid UUID.
            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                Uuid::from_str(value).map(Self).map_err(|_| IdParseError {
                    kind: stringify!($name),
                    value: value.to_string(),
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

uuid_id! {
    /// Organization identifier, the tenant root.
    OrgId
}

uuid_id! {
    /// Agent record identifier (the row key, not the human name).
    AgentId
}

uuid_id! {
    /// Agent run identifier.
    RunId
}

uuid_id! {
    /// Decision identifier.
    DecisionId
}

uuid_id! {
    /// Decision conflict identifier.
    ConflictId
}

uuid_id! {
    /// Access grant identifier.
    GrantId
}

uuid_id! {
    /// Assessment identifier.
    AssessmentId
}

/// Error returned when an identifier fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value:?} is not a uuid")]
pub struct IdParseError {
    /// Identifier type that failed to parse.
    kind: &'static str,
    /// Offending input value.
    value: String,
}

// ============================================================================
// SECTION: Agent Key
// ============================================================================

/// Human-readable agent name, unique within an organization.
///
/// # Invariants
/// - Opaque to the core; format rules are enforced at validation boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentKey(String);

impl AgentKey {
    /// Creates a new agent key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AgentKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AgentKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::DecisionId;
    use super::OrgId;

    #[test]
    fn ids_round_trip_through_strings() {
        let id = DecisionId::generate();
        let parsed = DecisionId::parse(&id.to_string()).expect("parse id");
        assert_eq!(id, parsed);
    }

    #[test]
    fn ids_reject_non_uuid_input() {
        let result = OrgId::parse("not-a-uuid");
        assert!(result.is_err());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = OrgId::generate();
        let json = serde_json::to_string(&id).expect("serialize id");
        assert_eq!(json, format!("\"{id}\""));
    }
}

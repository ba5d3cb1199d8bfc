// precedent-core/src/validate.rs
// ============================================================================
// Module: Precedent Input Validation
// Description: Field validation rules for trace and signup inputs.
// Purpose: Provide strict, fail-closed validation shared by every surface.
// Dependencies: url, thiserror
// ============================================================================

//! ## Overview
//! Validation is centralized so the HTTP and MCP surfaces reject the same
//! inputs the same way. Rules cover length caps, the confidence range, the
//! lowercase-underscore source type format, URI scheme allowlists, and
//! kebab-case slugs. All checks are fail-closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum length of a decision type label.
pub const MAX_DECISION_TYPE_LEN: usize = 100;
/// Maximum length of a decision outcome.
pub const MAX_OUTCOME_LEN: usize = 2_000;
/// Maximum length of decision reasoning.
pub const MAX_REASONING_LEN: usize = 10_000;
/// Maximum length of evidence content.
pub const MAX_EVIDENCE_CONTENT_LEN: usize = 8_192;
/// Maximum length of an evidence source URI.
pub const MAX_SOURCE_URI_LEN: usize = 2_048;
/// Maximum length of an agent key.
pub const MAX_AGENT_KEY_LEN: usize = 128;
/// Maximum length of an organization slug.
pub const MAX_SLUG_LEN: usize = 63;

/// URI schemes accepted on evidence sources.
const ALLOWED_URI_SCHEMES: [&str; 5] = ["http", "https", "file", "internal", "agent"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Validation failures for trace and signup inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Field name.
        field: &'static str,
    },
    /// A field exceeded its length cap.
    #[error("{field} exceeds {max} characters")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },
    /// Confidence fell outside `[0, 1]`.
    #[error("confidence must be between 0 and 1, got {value}")]
    ConfidenceRange {
        /// Offending value.
        value: f64,
    },
    /// A field violated its format rule.
    #[error("{field} has invalid format: {reason}")]
    Format {
        /// Field name.
        field: &'static str,
        /// Human-readable reason.
        reason: &'static str,
    },
    /// An evidence source URI was rejected.
    #[error("source_uri rejected: {reason}")]
    SourceUri {
        /// Human-readable reason.
        reason: &'static str,
    },
}

// ============================================================================
// SECTION: Validators
// ============================================================================

/// Validates a decision type label.
///
/// # Errors
///
/// Returns [`ValidationError`] when the label is empty or too long.
pub fn decision_type(value: &str) -> Result<(), ValidationError> {
    non_empty("decision_type", value)?;
    bounded("decision_type", value, MAX_DECISION_TYPE_LEN)
}

/// Validates a decision outcome.
///
/// # Errors
///
/// Returns [`ValidationError`] when the outcome is empty or too long.
pub fn outcome(value: &str) -> Result<(), ValidationError> {
    non_empty("outcome", value)?;
    bounded("outcome", value, MAX_OUTCOME_LEN)
}

/// Validates optional reasoning text.
///
/// # Errors
///
/// Returns [`ValidationError`] when the reasoning is too long.
pub fn reasoning(value: &str) -> Result<(), ValidationError> {
    bounded("reasoning", value, MAX_REASONING_LEN)
}

/// Validates a confidence value.
///
/// # Errors
///
/// Returns [`ValidationError`] when the value is not in `[0, 1]` or not finite.
pub fn confidence(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::ConfidenceRange {
            value,
        });
    }
    Ok(())
}

/// Validates an agent key.
///
/// # Errors
///
/// Returns [`ValidationError`] when the key is empty, too long, or contains
/// characters outside `[A-Za-z0-9._-]`.
pub fn agent_key(value: &str) -> Result<(), ValidationError> {
    non_empty("agent_id", value)?;
    bounded("agent_id", value, MAX_AGENT_KEY_LEN)?;
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
        return Err(ValidationError::Format {
            field: "agent_id",
            reason: "only alphanumerics, dot, underscore, and dash are allowed",
        });
    }
    Ok(())
}

/// Validates an evidence source type label (lowercase underscore format).
///
/// # Errors
///
/// Returns [`ValidationError`] when the label is empty or malformed.
pub fn source_type(value: &str) -> Result<(), ValidationError> {
    non_empty("source_type", value)?;
    let well_formed = value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !value.starts_with('_')
        && !value.ends_with('_');
    if !well_formed {
        return Err(ValidationError::Format {
            field: "source_type",
            reason: "expected lowercase underscore format",
        });
    }
    Ok(())
}

/// Validates an evidence source URI against the scheme allowlist.
///
/// # Errors
///
/// Returns [`ValidationError`] when the URI is too long, unparsable, or
/// uses a scheme outside the allowlist.
pub fn source_uri(value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_SOURCE_URI_LEN {
        return Err(ValidationError::SourceUri {
            reason: "uri too long",
        });
    }
    let parsed = Url::parse(value).map_err(|_| ValidationError::SourceUri {
        reason: "uri failed to parse",
    })?;
    if !ALLOWED_URI_SCHEMES.contains(&parsed.scheme()) {
        return Err(ValidationError::SourceUri {
            reason: "scheme not allowed",
        });
    }
    Ok(())
}

/// Validates an organization slug (kebab-case).
///
/// # Errors
///
/// Returns [`ValidationError`] when the slug is empty, too long, or not
/// kebab-case.
pub fn slug(value: &str) -> Result<(), ValidationError> {
    non_empty("slug", value)?;
    bounded("slug", value, MAX_SLUG_LEN)?;
    let kebab = value.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-')
        && !value.contains("--");
    if !kebab {
        return Err(ValidationError::Format {
            field: "slug",
            reason: "expected kebab-case",
        });
    }
    Ok(())
}

/// Validates a contact email address.
///
/// # Errors
///
/// Returns [`ValidationError`] when the address is structurally invalid.
pub fn email(value: &str) -> Result<(), ValidationError> {
    non_empty("email", value)?;
    bounded("email", value, 254)?;
    let Some((local, domain)) = value.split_once('@') else {
        return Err(ValidationError::Format {
            field: "email",
            reason: "missing @",
        });
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') || domain.contains('@') {
        return Err(ValidationError::Format {
            field: "email",
            reason: "malformed address",
        });
    }
    Ok(())
}

/// Validates evidence content length.
///
/// # Errors
///
/// Returns [`ValidationError`] when the content is too long.
pub fn evidence_content(value: &str) -> Result<(), ValidationError> {
    bounded("evidence content", value, MAX_EVIDENCE_CONTENT_LEN)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty or whitespace-only values.
fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty {
            field,
        });
    }
    Ok(())
}

/// Rejects values over the character cap.
fn bounded(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field,
            max,
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ValidationError;

    #[test]
    fn confidence_bounds_are_inclusive() {
        assert!(super::confidence(0.0).is_ok());
        assert!(super::confidence(1.0).is_ok());
        assert!(super::confidence(-0.01).is_err());
        assert!(super::confidence(1.01).is_err());
        assert!(super::confidence(f64::NAN).is_err());
    }

    #[test]
    fn source_type_requires_lowercase_underscore() {
        assert!(super::source_type("file_read").is_ok());
        assert!(super::source_type("tool2_call").is_ok());
        assert!(super::source_type("FileRead").is_err());
        assert!(super::source_type("_leading").is_err());
        assert!(super::source_type("trailing_").is_err());
    }

    #[test]
    fn source_uri_enforces_scheme_allowlist() {
        assert!(super::source_uri("https://example.com/doc").is_ok());
        assert!(super::source_uri("file:///tmp/notes.md").is_ok());
        assert!(super::source_uri("internal://kb/42").is_ok());
        assert!(super::source_uri("javascript:alert(1)").is_err());
        assert!(super::source_uri("not a uri").is_err());
    }

    #[test]
    fn slug_rejects_non_kebab_forms() {
        assert!(super::slug("acme-labs").is_ok());
        assert!(super::slug("Acme").is_err());
        assert!(super::slug("acme--labs").is_err());
        assert!(super::slug("-acme").is_err());
    }

    #[test]
    fn outcome_length_cap_counts_characters() {
        let long = "x".repeat(2_001);
        assert_eq!(
            super::outcome(&long),
            Err(ValidationError::TooLong {
                field: "outcome",
                max: 2_000,
            })
        );
        let exactly = "x".repeat(2_000);
        assert!(super::outcome(&exactly).is_ok());
    }

    #[test]
    fn email_requires_local_and_domain() {
        assert!(super::email("ops@example.com").is_ok());
        assert!(super::email("example.com").is_err());
        assert!(super::email("a@b").is_err());
    }
}

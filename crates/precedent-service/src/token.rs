// precedent-service/src/token.rs
// ============================================================================
// Module: Bearer Tokens
// Description: JWT claims shared by the HTTP API and the MCP surface.
// Purpose: Issue and verify the bearer tokens both transports accept.
// Dependencies: jsonwebtoken, precedent-core
// ============================================================================

//! ## Overview
//! `POST /auth/token` exchanges an organization slug and agent API key for
//! a signed JWT; both the HTTP middleware and the MCP HTTP transport
//! verify the same claims. The role claim is advisory only: callers are
//! re-resolved against the agents table so revoked agents lose access at
//! the next request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;
use precedent_core::AgentKey;
use precedent_core::OrgId;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ServiceError;

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Bearer token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the agent key.
    pub sub: String,
    /// Organization id.
    pub org: OrgId,
    /// Expiry (unix seconds).
    pub exp: u64,
}

impl Claims {
    /// Returns the agent key carried by the token.
    #[must_use]
    pub fn agent_key(&self) -> AgentKey {
        AgentKey::new(self.sub.clone())
    }
}

// ============================================================================
// SECTION: Issue and Verify
// ============================================================================

/// Issues a token for an authenticated caller.
///
/// # Errors
///
/// Returns [`ServiceError`] when signing fails.
pub fn issue(
    secret: &[u8],
    org: OrgId,
    agent: &AgentKey,
    ttl_secs: u64,
    now_unix: u64,
) -> Result<String, ServiceError> {
    let claims = Claims {
        sub: agent.to_string(),
        org,
        exp: now_unix.saturating_add(ttl_secs),
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
        .map_err(|err| ServiceError::internal("token_issue", err))
}

/// Verifies a token and returns its claims.
///
/// # Errors
///
/// Returns [`ServiceError::Auth`] for invalid or expired tokens.
pub fn verify(secret: &[u8], token: &str) -> Result<Claims, ServiceError> {
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|err| ServiceError::Auth(format!("invalid token: {err}")))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use precedent_core::AgentKey;
    use precedent_core::OrgId;

    use super::issue;
    use super::verify;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    #[test]
    fn tokens_round_trip() {
        let org = OrgId::generate();
        let agent = AgentKey::new("planner");
        let now = 1_700_000_000;
        let token = issue(SECRET, org, &agent, 3_600, now).expect("issue token");
        let claims = verify(SECRET, &token).expect("verify token");
        assert_eq!(claims.org, org);
        assert_eq!(claims.sub, "planner");
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let org = OrgId::generate();
        let agent = AgentKey::new("planner");
        let token = issue(SECRET, org, &agent, 3_600, 1_700_000_000).expect("issue token");
        assert!(verify(b"another-secret-another-secret-32", &token).is_err());
        assert!(verify(SECRET, "not-a-token").is_err());
    }
}

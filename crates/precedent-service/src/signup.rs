// precedent-service/src/signup.rs
// ============================================================================
// Module: Signup & Verification
// Description: Self-serve organization creation and email verification.
// Purpose: Provision tenants, first owners, and one-shot verify tokens.
// Dependencies: precedent-core, precedent-store, rand, sha2
// ============================================================================

//! ## Overview
//! Signup creates an unverified organization on the free plan, derives a
//! unique kebab-case slug and tenant schema, applies the tenant
//! migrations, and provisions the first owner agent whose API key is
//! returned exactly once. Verification tokens are 32 bytes of
//! cryptographic randomness, hex-encoded, valid for 24 hours, single-use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use precedent_core::Agent;
use precedent_core::AgentId;
use precedent_core::AgentKey;
use precedent_core::IsolationTier;
use precedent_core::Organization;
use precedent_core::OrgId;
use precedent_core::Plan;
use precedent_core::Role;
use precedent_core::VerificationMailer;
use precedent_core::validate;
use precedent_store::Store;
use rand::RngCore;
use sha2::Digest;
use sha2::Sha256;
use time::Duration;
use time::OffsetDateTime;

use crate::error::ServiceError;

/// Verification token lifetime.
const VERIFICATION_TTL: Duration = Duration::hours(24);

// ============================================================================
// SECTION: Results
// ============================================================================

/// Result of a successful signup.
#[derive(Debug, Clone)]
pub struct SignupResult {
    /// Created organization.
    pub org_id: OrgId,
    /// Derived slug.
    pub slug: String,
    /// First owner agent key.
    pub owner_agent: AgentKey,
    /// Owner API key, returned exactly once.
    pub api_key: String,
}

// ============================================================================
// SECTION: Signup Service
// ============================================================================

/// Signup and verification orchestration.
pub struct SignupService {
    /// Storage backend.
    store: Arc<Store>,
    /// Verification mail seam.
    mailer: Arc<dyn VerificationMailer>,
    /// Base URL used to build verification links.
    base_url: String,
}

impl SignupService {
    /// Creates the signup service.
    #[must_use]
    pub fn new(store: Arc<Store>, mailer: Arc<dyn VerificationMailer>, base_url: String) -> Self {
        Self {
            store,
            mailer,
            base_url,
        }
    }

    /// Creates an organization, its schema, and its first owner.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on validation failure or storage errors.
    pub fn signup(&self, name: &str, email: &str) -> Result<SignupResult, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation(precedent_core::ValidationError::Empty {
                field: "name",
            }));
        }
        validate::email(email)?;
        let now = OffsetDateTime::now_utc();
        let slug = self.unique_slug(name)?;
        let org_id = OrgId::generate();
        let plan = Plan::Free;
        let org = Organization {
            id: org_id,
            name: name.trim().to_string(),
            slug: slug.clone(),
            plan,
            subscription_id: None,
            billing_customer_id: None,
            decision_limit: plan.decision_limit(),
            agent_limit: plan.agent_limit(),
            email: email.to_string(),
            email_verified: false,
            isolation_tier: IsolationTier::Schema,
            schema_name: format!("tenant_{}", slug.replace('-', "_")),
            database_url: None,
            tags: Vec::new(),
            created_at: now,
        };
        precedent_store::orgs::insert_organization(&self.store, &org)?;
        let scope = self.store.resolve(org_id)?;
        precedent_store::migrations::apply_tenant(&scope)?;

        let api_key = generate_api_key();
        let owner = Agent {
            id: AgentId::generate(),
            key: AgentKey::new("owner"),
            org_id,
            name: format!("{} owner", org.name),
            role: Role::OrgOwner,
            api_key_hash: Some(hash_api_key(&api_key)),
            tags: Vec::new(),
            metadata: serde_json::json!({}),
            created_at: now,
        };
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        precedent_store::agents::insert_agent(&mut tx, &owner)?;
        precedent_store::decisions::record_audit(
            &mut tx,
            org_id,
            "org_created",
            Some(&owner.key),
            None,
            &serde_json::json!({ "slug": slug }),
            now,
        )?;
        tx.commit().map_err(|err| ServiceError::internal("signup", err))?;

        self.send_verification(org_id, email, now)?;
        Ok(SignupResult {
            org_id,
            slug,
            owner_agent: owner.key,
            api_key,
        })
    }

    /// Issues (or re-issues) a verification token and mails the link.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the token cannot be stored.
    pub fn send_verification(
        &self,
        org_id: OrgId,
        email: &str,
        now: OffsetDateTime,
    ) -> Result<(), ServiceError> {
        let token = generate_token();
        precedent_store::orgs::insert_verification(
            &self.store,
            &token,
            org_id,
            now + VERIFICATION_TTL,
        )?;
        let verify_url = format!("{}/auth/verify?token={token}", self.base_url.trim_end_matches('/'));
        if let Err(err) = self.mailer.send_verification(email, &verify_url) {
            tracing::warn!(org = %org_id, error = %err, "verification mail not delivered");
        }
        Ok(())
    }

    /// Consumes a verification token and marks the organization verified.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] for unknown, expired, or used
    /// tokens.
    pub fn verify(&self, token: &str) -> Result<OrgId, ServiceError> {
        let now = OffsetDateTime::now_utc();
        let org_id = precedent_store::orgs::consume_verification(&self.store, token, now)?
            .ok_or(ServiceError::NotFound("verification token"))?;
        precedent_store::orgs::set_email_verified(&self.store, org_id)?;
        Ok(org_id)
    }

    /// Derives a unique kebab-case slug from the organization name.
    fn unique_slug(&self, name: &str) -> Result<String, ServiceError> {
        let base = slugify(name);
        validate::slug(&base)?;
        if !precedent_store::orgs::slug_exists(&self.store, &base)? {
            return Ok(base);
        }
        for _ in 0..8 {
            let mut suffix = [0_u8; 2];
            rand::thread_rng().fill_bytes(&mut suffix);
            let candidate = format!("{base}-{:02x}{:02x}", suffix[0], suffix[1]);
            if !precedent_store::orgs::slug_exists(&self.store, &candidate)? {
                return Ok(candidate);
            }
        }
        Err(ServiceError::Conflict("could not derive a unique slug".to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Lowercases a name into kebab-case, collapsing runs of punctuation.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut previous_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            previous_dash = false;
        } else if !previous_dash {
            slug.push('-');
            previous_dash = true;
        }
    }
    let trimmed = slug.trim_end_matches('-');
    let mut out = trimmed.to_string();
    out.truncate(48);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Generates a 32-byte hex verification token.
fn generate_token() -> String {
    let mut bytes = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Generates an agent API key.
#[must_use]
pub fn generate_api_key() -> String {
    let mut bytes = [0_u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("pk_{hex}")
}

/// Hashes an API key for storage and lookup.
#[must_use]
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.finalize().iter().map(|byte| format!("{byte:02x}")).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::generate_api_key;
    use super::hash_api_key;
    use super::slugify;

    #[test]
    fn slugify_produces_kebab_case() {
        assert_eq!(slugify("Acme Labs, Inc."), "acme-labs-inc");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("Ümlaut Café"), "mlaut-caf");
    }

    #[test]
    fn api_keys_are_prefixed_and_hash_deterministically() {
        let key = generate_api_key();
        assert!(key.starts_with("pk_"));
        assert_eq!(key.len(), 3 + 48);
        assert_eq!(hash_api_key(&key), hash_api_key(&key));
        assert_ne!(hash_api_key(&key), hash_api_key("pk_other"));
    }
}

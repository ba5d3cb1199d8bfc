// precedent-store/src/orgs.rs
// ============================================================================
// Module: Organization Storage
// Description: Control-plane tables: organizations, usage, verifications.
// Purpose: Persist tenant roots, quota counters, and signup tokens.
// Dependencies: postgres, precedent-core
// ============================================================================

//! ## Overview
//! Organizations live in the shared control-plane database together with
//! the monthly usage counters and the one-shot email verification tokens.
//! The usage increment is a single atomic upsert so concurrent traces never
//! race the counter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Row;
use precedent_core::IsolationTier;
use precedent_core::Organization;
use precedent_core::OrgId;
use precedent_core::Plan;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::migrations::quote_ident;
use crate::tenant::Store;

// ============================================================================
// SECTION: Organizations
// ============================================================================

/// Inserts a new organization.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] when the slug is already taken.
pub fn insert_organization(store: &Store, org: &Organization) -> Result<(), StoreError> {
    let mut conn = store.control_conn()?;
    conn.execute(
        "INSERT INTO organizations (id, name, slug, plan, subscription_id, billing_customer_id, \
         decision_limit, agent_limit, email, email_verified, isolation_tier, schema_name, \
         database_url, tags, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, \
         $12, $13, $14, $15)",
        &[
            &org.id.as_uuid(),
            &org.name,
            &org.slug,
            &org.plan.as_str(),
            &org.subscription_id,
            &org.billing_customer_id,
            &org.decision_limit,
            &org.agent_limit,
            &org.email,
            &org.email_verified,
            &org.isolation_tier.as_str(),
            &org.schema_name,
            &org.database_url,
            &org.tags,
            &org.created_at,
        ],
    )
    .map_err(|err| StoreError::from_pg("insert_organization", &err))?;
    Ok(())
}

/// Fetches an organization by id.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails or the row is malformed.
pub fn get_organization(store: &Store, org_id: OrgId) -> Result<Option<Organization>, StoreError> {
    let mut conn = store.control_conn()?;
    let row = conn
        .query_opt(
            "SELECT id, name, slug, plan, subscription_id, billing_customer_id, decision_limit, \
             agent_limit, email, email_verified, isolation_tier, schema_name, database_url, tags, \
             created_at FROM organizations WHERE id = $1",
            &[&org_id.as_uuid()],
        )
        .map_err(|err| StoreError::from_pg("get_organization", &err))?;
    row.map(|row| org_from_row(&row)).transpose()
}

/// Fetches an organization by slug.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails or the row is malformed.
pub fn get_organization_by_slug(
    store: &Store,
    slug: &str,
) -> Result<Option<Organization>, StoreError> {
    let mut conn = store.control_conn()?;
    let row = conn
        .query_opt(
            "SELECT id, name, slug, plan, subscription_id, billing_customer_id, decision_limit, \
             agent_limit, email, email_verified, isolation_tier, schema_name, database_url, tags, \
             created_at FROM organizations WHERE slug = $1",
            &[&slug],
        )
        .map_err(|err| StoreError::from_pg("get_organization_by_slug", &err))?;
    row.map(|row| org_from_row(&row)).transpose()
}

/// Returns true when a slug is already taken.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn slug_exists(store: &Store, slug: &str) -> Result<bool, StoreError> {
    let mut conn = store.control_conn()?;
    let row = conn
        .query_opt("SELECT 1 FROM organizations WHERE slug = $1", &[&slug])
        .map_err(|err| StoreError::from_pg("slug_exists", &err))?;
    Ok(row.is_some())
}

/// Marks an organization's email as verified.
///
/// # Errors
///
/// Returns [`StoreError`] when the organization does not exist.
pub fn set_email_verified(store: &Store, org_id: OrgId) -> Result<(), StoreError> {
    let mut conn = store.control_conn()?;
    let updated = conn
        .execute("UPDATE organizations SET email_verified = TRUE WHERE id = $1", &[
            &org_id.as_uuid(),
        ])
        .map_err(|err| StoreError::from_pg("set_email_verified", &err))?;
    if updated == 0 {
        return Err(StoreError::NotFound {
            what: "organization",
        });
    }
    Ok(())
}

/// Updates an organization's plan, limits, and billing identifiers.
///
/// # Errors
///
/// Returns [`StoreError`] when the organization does not exist.
pub fn update_plan(
    store: &Store,
    org_id: OrgId,
    plan: Plan,
    subscription_id: Option<&str>,
    billing_customer_id: Option<&str>,
) -> Result<(), StoreError> {
    let mut conn = store.control_conn()?;
    let updated = conn
        .execute(
            "UPDATE organizations SET plan = $2, decision_limit = $3, agent_limit = $4, \
             subscription_id = $5, billing_customer_id = $6 WHERE id = $1",
            &[
                &org_id.as_uuid(),
                &plan.as_str(),
                &plan.decision_limit(),
                &plan.agent_limit(),
                &subscription_id,
                &billing_customer_id,
            ],
        )
        .map_err(|err| StoreError::from_pg("update_plan", &err))?;
    if updated == 0 {
        return Err(StoreError::NotFound {
            what: "organization",
        });
    }
    store.invalidate_scope(org_id);
    Ok(())
}

/// Lists every schema-isolated tenant for background refresh loops.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn list_schema_names(store: &Store) -> Result<Vec<(OrgId, String)>, StoreError> {
    let mut conn = store.control_conn()?;
    let rows = conn
        .query("SELECT id, schema_name FROM organizations ORDER BY created_at", &[])
        .map_err(|err| StoreError::from_pg("list_schema_names", &err))?;
    Ok(rows
        .into_iter()
        .map(|row| (OrgId::from_uuid(row.get(0)), row.get::<_, String>(1)))
        .collect())
}

/// Removes an organization and drops its tenant schema (GDPR request).
///
/// # Errors
///
/// Returns [`StoreError`] when deletion fails.
pub fn delete_organization(store: &Store, org_id: OrgId) -> Result<(), StoreError> {
    let Some(org) = get_organization(store, org_id)? else {
        return Err(StoreError::NotFound {
            what: "organization",
        });
    };
    let mut conn = store.control_conn()?;
    if org.isolation_tier == IsolationTier::Schema {
        let drop_schema =
            format!("DROP SCHEMA IF EXISTS {} CASCADE", quote_ident(&org.schema_name));
        conn.batch_execute(&drop_schema)
            .map_err(|err| StoreError::from_pg("delete_organization", &err))?;
    }
    conn.execute("DELETE FROM search_outbox WHERE org_id = $1", &[&org_id.as_uuid()])
        .map_err(|err| StoreError::from_pg("delete_organization", &err))?;
    conn.execute("DELETE FROM org_usage WHERE org_id = $1", &[&org_id.as_uuid()])
        .map_err(|err| StoreError::from_pg("delete_organization", &err))?;
    conn.execute("DELETE FROM email_verifications WHERE org_id = $1", &[&org_id.as_uuid()])
        .map_err(|err| StoreError::from_pg("delete_organization", &err))?;
    conn.execute("DELETE FROM organizations WHERE id = $1", &[&org_id.as_uuid()])
        .map_err(|err| StoreError::from_pg("delete_organization", &err))?;
    store.invalidate_scope(org_id);
    Ok(())
}

/// Decodes an organization row.
fn org_from_row(row: &Row) -> Result<Organization, StoreError> {
    let plan_label: String = row.get(3);
    let plan = Plan::parse(&plan_label)
        .ok_or_else(|| StoreError::invalid("org_from_row", format!("unknown plan {plan_label}")))?;
    let tier_label: String = row.get(10);
    let isolation_tier = IsolationTier::parse(&tier_label).ok_or_else(|| {
        StoreError::invalid("org_from_row", format!("unknown isolation tier {tier_label}"))
    })?;
    Ok(Organization {
        id: OrgId::from_uuid(row.get(0)),
        name: row.get(1),
        slug: row.get(2),
        plan,
        subscription_id: row.get(4),
        billing_customer_id: row.get(5),
        decision_limit: row.get(6),
        agent_limit: row.get(7),
        email: row.get(8),
        email_verified: row.get(9),
        isolation_tier,
        schema_name: row.get(11),
        database_url: row.get(12),
        tags: row.get(13),
        created_at: row.get(14),
    })
}

// ============================================================================
// SECTION: Usage Counters
// ============================================================================

/// Returns the `YYYY-MM` usage period label for an instant (UTC).
#[must_use]
pub fn period_label(now: OffsetDateTime) -> String {
    format!("{:04}-{:02}", now.year(), u8::from(now.month()))
}

/// Reads the decision count for an organization and period.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn decision_count(store: &Store, org_id: OrgId, period: &str) -> Result<i64, StoreError> {
    let mut conn = store.control_conn()?;
    let row = conn
        .query_opt(
            "SELECT decision_count FROM org_usage WHERE org_id = $1 AND period = $2",
            &[&org_id.as_uuid(), &period],
        )
        .map_err(|err| StoreError::from_pg("decision_count", &err))?;
    Ok(row.map_or(0, |row| row.get(0)))
}

/// Atomically increments the decision count for an organization and period.
///
/// # Errors
///
/// Returns [`StoreError`] when the upsert fails.
pub fn increment_decision_count(
    store: &Store,
    org_id: OrgId,
    period: &str,
) -> Result<(), StoreError> {
    let mut conn = store.control_conn()?;
    conn.execute(
        "INSERT INTO org_usage (org_id, period, decision_count) VALUES ($1, $2, 1) ON CONFLICT \
         (org_id, period) DO UPDATE SET decision_count = org_usage.decision_count + 1",
        &[&org_id.as_uuid(), &period],
    )
    .map_err(|err| StoreError::from_pg("increment_decision_count", &err))?;
    Ok(())
}

// ============================================================================
// SECTION: Email Verifications
// ============================================================================

/// Stores a verification token for an organization.
///
/// # Errors
///
/// Returns [`StoreError`] when the insert fails.
pub fn insert_verification(
    store: &Store,
    token: &str,
    org_id: OrgId,
    expires_at: OffsetDateTime,
) -> Result<(), StoreError> {
    let mut conn = store.control_conn()?;
    conn.execute(
        "INSERT INTO email_verifications (token, org_id, expires_at) VALUES ($1, $2, $3)",
        &[&token, &org_id.as_uuid(), &expires_at],
    )
    .map_err(|err| StoreError::from_pg("insert_verification", &err))?;
    Ok(())
}

/// Consumes a verification token, returning its organization when the token
/// is live. Consumption is single-use: the same statement that reads the
/// token also stamps `used_at`.
///
/// # Errors
///
/// Returns [`StoreError`] when the update fails.
pub fn consume_verification(
    store: &Store,
    token: &str,
    now: OffsetDateTime,
) -> Result<Option<OrgId>, StoreError> {
    let mut conn = store.control_conn()?;
    let row = conn
        .query_opt(
            "UPDATE email_verifications SET used_at = $2 WHERE token = $1 AND used_at IS NULL AND \
             expires_at > $2 RETURNING org_id",
            &[&token, &now],
        )
        .map_err(|err| StoreError::from_pg("consume_verification", &err))?;
    Ok(row.map(|row| OrgId::from_uuid(row.get(0))))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use time::Date;
    use time::Month;
    use time::OffsetDateTime;
    use time::Time;

    use super::period_label;

    #[test]
    fn period_label_is_zero_padded_year_month() {
        let instant = Date::from_calendar_date(2026, Month::March, 5)
            .map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(period_label(instant), "2026-03");
    }
}

// precedent-broker/src/listener.rs
// ============================================================================
// Module: Notification Listener
// Description: Postgres LISTEN thread feeding the broker.
// Purpose: Turn pg_notify envelopes into broker fan-out.
// Dependencies: postgres, precedent-store
// ============================================================================

//! ## Overview
//! One listener thread per database executes `LISTEN` on the decision
//! channel and forwards every envelope to the broker. Database-isolated
//! tenants get their own listener against their dedicated pool; all
//! listeners feed the same broker. Malformed payloads are logged and
//! skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use postgres::Transaction;
use postgres::fallible_iterator::FallibleIterator;
use precedent_store::PgPool;

use crate::broker::Notification;
use crate::broker::NotificationBroker;

/// Channel name carrying decision envelopes.
pub const CHANNEL: &str = "precedent_decisions";

/// How often the listener polls for shutdown between notifications.
const POLL_TIMEOUT: Duration = Duration::from_millis(500);

// ============================================================================
// SECTION: Publishing
// ============================================================================

/// Publishes a notification through the database so every process's
/// listener (and therefore every subscriber) observes it.
///
/// # Errors
///
/// Returns [`precedent_store::StoreError`] when the notify call fails.
pub fn publish(
    tx: &mut Transaction<'_>,
    notification: &Notification,
) -> Result<(), precedent_store::StoreError> {
    let payload = serde_json::to_string(notification).map_err(|err| {
        precedent_store::StoreError::invalid("publish_notification", err.to_string())
    })?;
    tx.execute("SELECT pg_notify($1, $2)", &[&CHANNEL, &payload])
        .map_err(|err| precedent_store::StoreError::from_pg("publish_notification", &err))?;
    Ok(())
}

// ============================================================================
// SECTION: Listener
// ============================================================================

/// Handle to a running listener thread.
pub struct NotificationListener {
    /// Shutdown flag shared with the thread.
    shutdown: Arc<AtomicBool>,
    /// Join handle for shutdown.
    handle: Option<JoinHandle<()>>,
}

impl NotificationListener {
    /// Spawns a listener thread against one database pool.
    #[must_use]
    pub fn spawn(pool: PgPool, broker: Arc<NotificationBroker>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                if let Err(err) = listen_once(&pool, &broker, &flag) {
                    tracing::warn!(error = %err, "notification listener reconnecting");
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        });
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signals shutdown and joins the thread.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NotificationListener {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Runs one LISTEN session until shutdown or connection loss.
fn listen_once(
    pool: &PgPool,
    broker: &NotificationBroker,
    shutdown: &AtomicBool,
) -> Result<(), String> {
    let mut conn = pool.get().map_err(|err| err.to_string())?;
    conn.batch_execute(&format!("LISTEN {CHANNEL}")).map_err(|err| err.to_string())?;
    while !shutdown.load(Ordering::Relaxed) {
        let mut notifications = conn.notifications();
        let mut iter = notifications.timeout_iter(POLL_TIMEOUT);
        while let Some(entry) = iter.next().map_err(|err| err.to_string())? {
            match serde_json::from_str::<Notification>(entry.payload()) {
                Ok(notification) => broker.publish(&notification),
                Err(err) => {
                    tracing::warn!(error = %err, "malformed decision notification skipped");
                }
            }
        }
    }
    conn.batch_execute(&format!("UNLISTEN {CHANNEL}")).map_err(|err| err.to_string())?;
    Ok(())
}

// precedent-broker/src/broker.rs
// ============================================================================
// Module: Notification Broker
// Description: Per-tenant subscriber registry and fan-out.
// Purpose: Deliver decision notifications without blocking publishers.
// Dependencies: precedent-core, tokio, serde
// ============================================================================

//! ## Overview
//! Subscribers register with their organization and receive notifications
//! over a bounded channel. Publish iterates the registry, matches the
//! organization, and uses `try_send`; a full or closed channel drops the
//! subscriber on the spot so backpressure never reaches the publisher.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use precedent_core::AgentKey;
use precedent_core::DecisionId;
use precedent_core::OrgId;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;

/// Bounded queue depth per subscriber.
const SUBSCRIBER_QUEUE: usize = 32;

// ============================================================================
// SECTION: Notification
// ============================================================================

/// Envelope published when a decision is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recorded decision.
    pub decision_id: DecisionId,
    /// Acting agent.
    pub agent_id: AgentKey,
    /// Owning organization.
    pub org_id: OrgId,
    /// Decision outcome statement.
    pub outcome: String,
    /// Decision category.
    pub decision_type: String,
}

/// Opaque subscriber handle used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

/// One registered subscriber.
struct Subscriber {
    /// Subscriber handle.
    id: SubscriberId,
    /// Organization filter.
    org_id: OrgId,
    /// Delivery channel.
    sender: mpsc::Sender<Notification>,
}

// ============================================================================
// SECTION: Broker
// ============================================================================

/// In-process notification broker.
pub struct NotificationBroker {
    /// Registered subscribers.
    subscribers: Mutex<Vec<Subscriber>>,
    /// Monotonic subscriber id source.
    next_id: AtomicU64,
}

impl Default for NotificationBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationBroker {
    /// Creates an empty broker.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a subscriber bound to an organization.
    pub fn subscribe(&self, org_id: OrgId) -> (SubscriberId, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE);
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(Subscriber {
                id,
                org_id,
                sender,
            });
        }
        (id, receiver)
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|subscriber| subscriber.id != id);
        }
    }

    /// Returns the current subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subscribers| subscribers.len()).unwrap_or(0)
    }

    /// Fans a notification out to subscribers of its organization.
    ///
    /// Delivery is `try_send`: subscribers whose queue is full or whose
    /// receiver is gone are dropped immediately.
    pub fn publish(&self, notification: &Notification) {
        let Ok(mut subscribers) = self.subscribers.lock() else {
            return;
        };
        subscribers.retain(|subscriber| {
            if subscriber.org_id != notification.org_id {
                return true;
            }
            match subscriber.sender.try_send(notification.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(org = %notification.org_id, "dropping slow subscriber");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use precedent_core::AgentKey;
    use precedent_core::DecisionId;
    use precedent_core::OrgId;

    use super::Notification;
    use super::NotificationBroker;

    fn notification(org_id: OrgId) -> Notification {
        Notification {
            decision_id: DecisionId::generate(),
            agent_id: AgentKey::new("planner"),
            org_id,
            outcome: "chose Redis".to_string(),
            decision_type: "architecture".to_string(),
        }
    }

    #[test]
    fn fan_out_is_tenant_filtered() {
        let broker = NotificationBroker::new();
        let org_a = OrgId::generate();
        let org_b = OrgId::generate();
        let (_, mut rx_a) = broker.subscribe(org_a);
        let (_, mut rx_b) = broker.subscribe(org_b);

        broker.publish(&notification(org_a));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn full_subscribers_are_dropped_not_blocked() {
        let broker = NotificationBroker::new();
        let org = OrgId::generate();
        let (_, rx) = broker.subscribe(org);
        // Never drain: fill the queue past its bound.
        for _ in 0..64 {
            broker.publish(&notification(org));
        }
        assert_eq!(broker.subscriber_count(), 0);
        drop(rx);
    }

    #[test]
    fn unsubscribe_removes_the_subscriber() {
        let broker = NotificationBroker::new();
        let org = OrgId::generate();
        let (id, _rx) = broker.subscribe(org);
        assert_eq!(broker.subscriber_count(), 1);
        broker.unsubscribe(id);
        assert_eq!(broker.subscriber_count(), 0);
    }
}

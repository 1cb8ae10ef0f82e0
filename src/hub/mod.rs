//! In-process publish/subscribe hub for realtime sessions.
//!
//! The hub is an explicit service object: build one at startup, hand
//! clones to whoever publishes or subscribes, and call
//! [`EventHub::shutdown`] to end every session.
//!
//! Each subscriber owns an unbounded queue. Publishing holds the registry
//! lock while enqueueing, so events on one channel reach every subscriber
//! in publish order. A [`Subscription`] removes itself from the registry
//! when dropped, whatever path the owning session takes out.

pub mod events;

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::mpsc;
use tracing::{debug, info};

pub use events::OutboundEvent;

use crate::{AppError, Result};

/// Addressable broadcast group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// One agent's private channel, `agent:<id>`.
    Agent(String),
    /// Shared channel for every connected manager.
    Managers,
}

impl Channel {
    /// Private channel of one agent.
    #[must_use]
    pub fn agent(agent_id: impl Into<String>) -> Self {
        Self::Agent(agent_id.into())
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "agent:{id}"),
            Self::Managers => f.write_str("managers"),
        }
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

#[derive(Default)]
struct Registry {
    channels: HashMap<Channel, Vec<Subscriber>>,
    closed: bool,
}

#[derive(Default)]
struct HubInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl HubInner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn unsubscribe(&self, channel: &Channel, id: u64) {
        let mut registry = self.registry();
        if let Some(subscribers) = registry.channels.get_mut(channel) {
            subscribers.retain(|s| s.id != id);
            if subscribers.is_empty() {
                registry.channels.remove(channel);
            }
        }
    }
}

/// Channel registry shared by publishers and realtime sessions.
#[derive(Clone, Default)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl EventHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber on `channel`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Closed` once [`EventHub::shutdown`] has run.
    pub fn subscribe(&self, channel: Channel) -> Result<Subscription> {
        let mut registry = self.inner.registry();
        if registry.closed {
            return Err(AppError::Closed("event hub is shut down".into()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        registry
            .channels
            .entry(channel.clone())
            .or_default()
            .push(Subscriber { id, tx });
        debug!(%channel, subscriber = id, "subscribed");

        Ok(Subscription {
            id,
            channel,
            rx,
            hub: Arc::downgrade(&self.inner),
        })
    }

    /// Deliver `event` to every live subscriber of `channel`.
    ///
    /// Subscribers whose receiving end is gone are pruned. Returns the
    /// number of subscribers the event reached.
    pub fn publish(&self, channel: &Channel, event: OutboundEvent) -> usize {
        let mut registry = self.inner.registry();
        let Some(subscribers) = registry.channels.get_mut(channel) else {
            debug!(%channel, event_type = event.event_type(), "no subscribers");
            return 0;
        };

        subscribers.retain(|s| s.tx.send(event.clone()).is_ok());
        let delivered = subscribers.len();
        if delivered == 0 {
            registry.channels.remove(channel);
        }

        debug!(
            %channel,
            event_type = event.event_type(),
            delivered,
            "published"
        );
        delivered
    }

    /// Number of live subscribers on `channel`.
    #[must_use]
    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        self.inner
            .registry()
            .channels
            .get(channel)
            .map_or(0, Vec::len)
    }

    /// Whether [`EventHub::shutdown`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.registry().closed
    }

    /// Close the hub.
    ///
    /// Every subscriber queue is closed, so sessions drain what they
    /// already received and then end; further subscriptions are refused.
    pub fn shutdown(&self) {
        let mut registry = self.inner.registry();
        registry.closed = true;
        let dropped: usize = registry.channels.values().map(Vec::len).sum();
        registry.channels.clear();
        info!(subscribers = dropped, "event hub shut down");
    }
}

/// Receiving end of one channel subscription.
///
/// Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    channel: Channel,
    rx: mpsc::UnboundedReceiver<OutboundEvent>,
    hub: Weak<HubInner>,
}

impl Subscription {
    /// Channel this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Wait for the next event; `None` once the hub has shut down.
    pub async fn recv(&mut self) -> Option<OutboundEvent> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<OutboundEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(&self.channel, self.id);
            debug!(channel = %self.channel, subscriber = self.id, "unsubscribed");
        }
    }
}

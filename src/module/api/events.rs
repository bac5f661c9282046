//! In-process event bus shared by the registry and modules
//!
//! Delivery is synchronous and in subscription order. A listener that returns
//! an error or panics is logged and skipped; the publisher never sees it.
//! Nothing is persisted or replayed: a listener only sees events published
//! after it subscribed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Topic published after a successful `register`
pub const MODULE_REGISTERED: &str = "module:registered";
/// Topic published after a successful `unregister`
pub const MODULE_UNREGISTERED: &str = "module:unregistered";
/// Topic published after a module becomes ACTIVE
pub const MODULE_ACTIVATED: &str = "module:activated";
/// Topic published after a module becomes INACTIVE
pub const MODULE_DEACTIVATED: &str = "module:deactivated";

/// An event as seen by listeners
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Topic the event was published under
    pub name: String,
    /// Arbitrary payload
    pub payload: Value,
}

/// Lifecycle notifications emitted by the module registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    Registered { name: String, version: String },
    Unregistered { name: String },
    Activated { name: String },
    Deactivated { name: String },
}

#[derive(Serialize, Deserialize)]
struct LifecyclePayload {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

impl LifecycleEvent {
    /// Topic this event is published under
    pub fn topic(&self) -> &'static str {
        match self {
            LifecycleEvent::Registered { .. } => MODULE_REGISTERED,
            LifecycleEvent::Unregistered { .. } => MODULE_UNREGISTERED,
            LifecycleEvent::Activated { .. } => MODULE_ACTIVATED,
            LifecycleEvent::Deactivated { .. } => MODULE_DEACTIVATED,
        }
    }

    /// Module the event is about
    pub fn module_name(&self) -> &str {
        match self {
            LifecycleEvent::Registered { name, .. }
            | LifecycleEvent::Unregistered { name }
            | LifecycleEvent::Activated { name }
            | LifecycleEvent::Deactivated { name } => name,
        }
    }

    /// Payload shape: `{name, version}` for registered, `{name}` otherwise
    pub fn payload(&self) -> Value {
        let payload = match self {
            LifecycleEvent::Registered { name, version } => LifecyclePayload {
                name: name.clone(),
                version: Some(version.clone()),
            },
            other => LifecyclePayload {
                name: other.module_name().to_string(),
                version: None,
            },
        };
        serde_json::to_value(payload).unwrap_or(Value::Null)
    }

    /// Recover a lifecycle event from a bus event, if it is one
    pub fn from_event(event: &Event) -> Option<Self> {
        let payload: LifecyclePayload = serde_json::from_value(event.payload.clone()).ok()?;
        let name = payload.name;
        match event.name.as_str() {
            MODULE_REGISTERED => Some(LifecycleEvent::Registered {
                name,
                version: payload.version.unwrap_or_default(),
            }),
            MODULE_UNREGISTERED => Some(LifecycleEvent::Unregistered { name }),
            MODULE_ACTIVATED => Some(LifecycleEvent::Activated { name }),
            MODULE_DEACTIVATED => Some(LifecycleEvent::Deactivated { name }),
            _ => None,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Listener callback
pub type Listener = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Process-wide publish/subscribe channel
pub struct EventBus {
    listeners: RwLock<HashMap<String, Vec<(SubscriptionId, Listener)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for `event_name`
    pub fn subscribe<F>(&self, event_name: impl Into<String>, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let event_name = event_name.into();
        debug!("Subscribing listener {:?} to {}", id, event_name);
        self.listeners
            .write()
            .entry(event_name)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not subscribed
    pub fn unsubscribe(&self, event_name: &str, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(list) = listeners.get_mut(event_name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(sub_id, _)| *sub_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            listeners.remove(event_name);
        }
        removed
    }

    /// Deliver `payload` to every listener of `event_name`
    ///
    /// Listeners are snapshotted before delivery, so a listener may subscribe
    /// or unsubscribe from inside its callback without deadlocking.
    pub fn publish(&self, event_name: &str, payload: Value) {
        let snapshot: Vec<(SubscriptionId, Listener)> = match self.listeners.read().get(event_name)
        {
            Some(list) => list.clone(),
            None => return,
        };

        let event = Event {
            name: event_name.to_string(),
            payload,
        };

        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Listener {:?} for {} failed: {:#}", id, event_name, e);
                }
                Err(_) => {
                    error!("Listener {:?} for {} panicked", id, event_name);
                }
            }
        }
    }

    /// Publish a registry lifecycle event under its topic
    pub fn publish_lifecycle(&self, event: &LifecycleEvent) {
        debug!("Publishing {} for module {}", event.topic(), event.module_name());
        self.publish(event.topic(), event.payload());
    }

    /// Number of listeners currently subscribed to `event_name`
    pub fn listener_count(&self, event_name: &str) -> usize {
        self.listeners
            .read()
            .get(event_name)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

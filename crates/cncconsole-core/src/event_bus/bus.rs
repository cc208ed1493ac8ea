//! Console event fan-out.
//!
//! Listeners come in two kinds. Handlers registered with
//! [`EventBus::subscribe`] run on the publishing thread, inside the status
//! tick, so they must return quickly. Receivers from [`EventBus::receiver`]
//! are broadcast channels for async consumers; one that falls more than
//! [`CHANNEL_CAPACITY`] events behind gets `Lagged` and skips ahead.

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::events::{ConsoleEvent, EventCategory};

/// Events buffered per broadcast receiver
pub const CHANNEL_CAPACITY: usize = 256;

/// Which events a handler wants
#[derive(Debug, Clone, Default)]
pub enum EventFilter {
    /// Every event.
    #[default]
    All,
    /// Events in any of these categories.
    Categories(Vec<EventCategory>),
}

impl EventFilter {
    pub fn matches(&self, event: &ConsoleEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Categories(categories) => categories.contains(&event.category()),
        }
    }
}

type Handler = Box<dyn Fn(&ConsoleEvent) + Send + Sync>;

/// Publish/subscribe hub shared by the console and its presentation layer
pub struct EventBus {
    sender: broadcast::Sender<ConsoleEvent>,
    handlers: RwLock<Vec<(EventFilter, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Hand `event` to matching handlers, then to every receiver.
    ///
    /// Returns how many listeners got it. Nobody listening is not an error;
    /// the console runs headless in that case.
    pub fn publish(&self, event: ConsoleEvent) -> usize {
        let mut delivered = 0;
        for (filter, handler) in self.handlers.read().iter() {
            if filter.matches(&event) {
                handler(&event);
                delivered += 1;
            }
        }
        delivered + self.sender.send(event).unwrap_or(0)
    }

    /// Register a handler for the lifetime of the bus
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F)
    where
        F: Fn(&ConsoleEvent) + Send + Sync + 'static,
    {
        tracing::debug!("Event handler added for {:?}", filter);
        self.handlers.write().push((filter, Box::new(handler)));
    }

    /// A receiver that sees every event published from now on
    pub fn receiver(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handlers.read().len())
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

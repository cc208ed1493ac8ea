//! # Event Bus Module
//!
//! Publish/subscribe fan-out of console events to the presentation layer.
//!
//! - Notifications (info/error notices for the operator)
//! - Machine status edges observed by the sync loop
//! - Commands issued to the machine controller
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cncconsole_core::event_bus::{ConsoleEvent, EventBus, EventCategory, EventFilter};
//!
//! let bus = EventBus::new();
//! bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Notification]),
//!     |event| {
//!         if let ConsoleEvent::Notification(n) = event {
//!             println!("{}: {}", n.severity, n.message);
//!         }
//!     },
//! );
//!
//! bus.publish(ConsoleEvent::info("All axes have been homed"));
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;

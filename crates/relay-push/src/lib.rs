//! # Relay Push
//!
//! The push funnel (C3): a per-identity logical channel spanning a
//! websocket local half and a pub/sub remote half, with a durable queue
//! for identities that have no live funnel anywhere.
//!
//! [`Hub`] is the single value encapsulating all of this crate's global
//! state (per the design note against process-wide singletons); handlers
//! in `relay-server` hold a `&Hub` and call [`relay_core::notify::Notifier::send`].

pub mod bus;
pub mod error;
pub mod hub;

pub use bus::Bus;
pub use error::{PushError, Result};
pub use hub::{Hub, LocalSink};

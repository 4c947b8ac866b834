//! # Realtime
//!
//! Mutation events and the broker that fans them out.
//!
//! ## Architecture
//!
//! - **Events**: one [`ChangeEvent`] per successful write, delete or namespace drop
//! - **Broker**: bounded per-subscriber queues, disconnect on backpressure
//!
//! The websocket endpoint streaming these events lives in `http_server`.

pub mod broker;
pub mod event;

pub use broker::{Broker, BrokerConfig, DispatchResult, Subscriber, DEFAULT_QUEUE_CAPACITY};
pub use event::{ChangeEvent, EventKind};

//! Relay layer: typed run-lifecycle events and the topic broker that
//! fans them out to subscribed client connections.

pub mod broker;
pub mod protocol;

pub use broker::RelayBroker;
pub use protocol::{RelayEvent, RelayEventKind, WORKFLOWS_TOPIC};

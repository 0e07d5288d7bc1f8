//! ComfyUI client library: the boundary to the external generation
//! engine.
//!
//! Provides typed WebSocket message parsing, a per-run WebSocket
//! connection, HTTP API wrappers (submit, queue, interrupt, history,
//! upload), and the progress normalizer that turns raw engine events
//! into a completion percentage.

pub mod api;
pub mod client;
pub mod messages;
pub mod progress;

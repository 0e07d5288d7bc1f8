//! HTTP and WebSocket surface for the workflow execution service.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod ws;

//! Workflow execution service.
//!
//! Resolves stored workflow definitions through the content API, merges
//! them with caller overrides, drives the resulting prompt through the
//! generation engine, and relays run-lifecycle events (`running`,
//! `progress`, `state`, `done`, `error`) to subscribed clients.

pub mod content;
pub mod definition;
pub mod error;
pub mod history;
pub mod outputs;
pub mod registry;
pub mod runner;

pub use definition::{RunRequest, WorkflowDefinition, WorkflowType};
pub use error::WorkflowError;
pub use runner::WorkflowRunner;

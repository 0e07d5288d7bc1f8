//! HTTP request handlers.

pub mod workflows;

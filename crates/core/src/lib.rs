//! Pure building blocks shared across the flowdeck workspace.
//!
//! Contains the template merge engine, seed generation, and the TTL
//! cache used for per-client run history. Nothing here performs I/O.

pub mod cache;
pub mod merge;
pub mod seed;

//! # Event Harvester Core
//!
//! Runtime-independent logic for Event Harvester: event models, email
//! batching, field normalization, the store abstraction, and the
//! reconciliation (insert + sweep) step.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Native backends (SQLite store, model client, CLI) live in the
//! `event-harvester` crate.

pub mod batch;
pub mod models;
pub mod normalize;
pub mod policy;
pub mod reconcile;
pub mod store;

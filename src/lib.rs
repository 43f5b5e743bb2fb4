//! # Event Harvester
//!
//! Pulls event listings out of a file of newsletter emails with a
//! generative language model and keeps them in a local SQLite table.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌───────────┐   ┌────────────┐
//! │  Emails   │──▶│ Batcher │──▶│ Extractor │──▶│ Normalizer │
//! │  (file)   │   │  (3s)   │   │ (Gemini)  │   │            │
//! └───────────┘   └─────────┘   └───────────┘   └─────┬──────┘
//!                                                     ▼
//!                  ┌──────────┐   ┌──────────┐   ┌────────────┐
//!                  │   CLI    │◀──│  SQLite  │◀──│ Reconciler │
//!                  │  / HTTP  │   │  events  │   │insert+sweep│
//!                  └──────────┘   └──────────┘   └────────────┘
//! ```
//!
//! The domain types, batching, normalization and sweep rules live in
//! [`event_harvester_core`]; this crate adds SQLite, the model client,
//! rate limiting, logging, the CLI and the HTTP server.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | SQLite [`EventStore`](event_harvester_core::store::EventStore) |
//! | [`model`] | Text model abstraction and Gemini client |
//! | [`extract`] | Prompting, quota and response parsing |
//! | [`pipeline`] | One end-to-end invocation |
//! | [`events`] | Day and week listings |
//! | [`server`] | HTTP API |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod events;
pub mod extract;
pub mod logging;
pub mod migrate;
pub mod model;
pub mod pipeline;
pub mod run_cmd;
pub mod server;
pub mod sqlite_store;
pub mod sweep;

//! Owner gateway service library.
//!
//! A local HTTP gateway in front of a mailbox that may only be touched from
//! a single execution context:
//!
//! - Serializes mailbox, calendar and directory work onto one owner thread
//!   through the affinity dispatcher
//! - Computes meeting slot suggestions from free/busy timelines
//! - Serves the `/mcp` JSON endpoints and Prometheus metrics
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> dispatcher -> owner thread -> store
//!                                \-> slot_engine (caller task)
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `dispatcher` - Single-owner work queue
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP middleware
//! - `models` - Wire models
//! - `observability` - Metrics
//! - `routes` - Axum router setup
//! - `store` - Mailbox store trait and in-memory implementation

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod store;

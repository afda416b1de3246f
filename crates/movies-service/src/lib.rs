//! Movies API Service Library
//!
//! Credential vault, scoped token ledger, permission registry and the
//! authentication/authorization pipeline for a small movie catalog, plus
//! optimistic concurrency on writes and supervised background work.
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/*.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `crypto` - Password hashing, token generation and digests
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication, authorization gates, fault boundary, metrics
//! - `models` - Data models and request/response bodies
//! - `repositories` - Database access with per-call deadlines
//! - `routes` - Axum router setup
//! - `services` - Business logic layer
//! - `tasks` - Background task supervisor and token cleanup
//! - `validation` - Field-level input validation

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod tasks;
pub mod validation;

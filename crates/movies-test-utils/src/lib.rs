//! # Movies Test Utilities
//!
//! Shared test utilities for the movies service.
//!
//! This crate provides:
//! - Server test harness (`TestMoviesServer` for E2E tests)
//! - Fixtures for seeding users, permissions and tokens directly
//!
//! ## Usage
//!
//! ```rust,ignore
//! use movies_test_utils::*;
//!
//! #[sqlx::test(migrations = "../../migrations")]
//! async fn test_example(pool: PgPool) -> Result<()> {
//!     let server = TestMoviesServer::spawn(pool).await?;
//!
//!     let response = server
//!         .client()
//!         .get(format!("{}/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use fixtures::*;
pub use server_harness::*;

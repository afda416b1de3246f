//! Repository layer for database operations.
//!
//! Repository functions take a bare `&PgPool`, or any `PgExecutor` when they
//! take part in a multi-statement flow. Callers on the request path go
//! through [`Store::run`], which bounds every call by the configured store
//! deadline and maps an elapsed deadline to `ApiError::StoreTimeout`.
//!
//! Flows that write several rows open a transaction with [`Store::begin`]
//! and run the whole flow inside one `Store::run`. A deadline that fires
//! mid-flow drops the transaction, which rolls it back.

pub mod movies;
pub mod permissions;
pub mod tokens;
pub mod users;
pub mod versioned;

pub use versioned::{conditional_delete, conditional_update, Versioned};

use crate::errors::ApiError;
use crate::observability::metrics::record_store_timeout;
use sqlx::{PgPool, Postgres, Transaction};
use std::future::Future;
use std::time::Duration;

/// Shared connection pool plus the per-call deadline.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
    deadline: Duration,
}

impl Store {
    pub fn new(pool: PgPool, deadline: Duration) -> Self {
        Self { pool, deadline }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a transaction on the pool.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, ApiError> {
        self.pool
            .begin()
            .await
            .map_err(|e| ApiError::Database(format!("Failed to start transaction: {}", e)))
    }

    /// Run one store operation under the deadline.
    pub async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        with_deadline(self.deadline, operation, fut).await
    }
}

/// Commit a transaction opened with [`Store::begin`].
pub async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), ApiError> {
    tx.commit()
        .await
        .map_err(|e| ApiError::Database(format!("Failed to commit transaction: {}", e)))
}

/// Await `fut`, failing with `StoreTimeout` once `deadline` elapses.
///
/// Dropping the future on timeout cancels the in-flight query.
pub async fn with_deadline<T, F>(
    deadline: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            record_store_timeout(operation);
            tracing::warn!(
                target: "movies.store",
                operation = operation,
                deadline_ms = deadline.as_millis() as u64,
                "Store operation timed out"
            );
            Err(ApiError::StoreTimeout(operation.to_string()))
        }
    }
}

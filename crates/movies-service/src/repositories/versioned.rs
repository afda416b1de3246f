//! Optimistic concurrency for versioned records.
//!
//! Every versioned table carries an integer `version` column. A write is
//! applied only if the stored version still equals the version the caller
//! last read, and the same statement bumps the version by one:
//!
//! ```sql
//! UPDATE <table> SET <fields>, version = version + 1
//! WHERE <key> = $k AND version = $v
//! RETURNING version
//! ```
//!
//! No row back means someone else won the race and the caller gets
//! `ApiError::EditConflict`. Conflicts are never retried here.

use crate::errors::ApiError;
use crate::observability::metrics::record_edit_conflict;
use sqlx::query_builder::Separated;
use sqlx::{Encode, PgExecutor, PgPool, Postgres, QueryBuilder, Type};
use tracing::instrument;

/// A record stored in a table with a `version` column.
pub trait Versioned {
    /// Table name.
    const TABLE: &'static str;
    /// Primary key column.
    const KEY_COLUMN: &'static str;
    /// Human readable resource name used in errors and metrics.
    const RESOURCE: &'static str;

    type Key: for<'q> Encode<'q, Postgres> + Type<Postgres> + Send + Clone + 'static;

    fn key(&self) -> Self::Key;
    fn version(&self) -> i32;
    fn set_version(&mut self, version: i32);

    /// Push `column = <bind>` pairs for every mutable field.
    fn push_assignments(&self, set: &mut Separated<'_, '_, Postgres, &'static str>);
}

/// Persist `record`'s fields if its version is still current.
///
/// On success the record's version is updated in place and returned.
/// Runs on the pool or inside a caller-owned transaction.
#[instrument(skip_all, fields(resource = R::RESOURCE))]
pub async fn conditional_update<'e, R, E>(executor: E, record: &mut R) -> Result<i32, ApiError>
where
    R: Versioned,
    E: PgExecutor<'e>,
{
    let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE ");
    builder.push(R::TABLE).push(" SET ");
    {
        let mut set = builder.separated(", ");
        record.push_assignments(&mut set);
        set.push("version = version + 1");
    }
    builder
        .push(" WHERE ")
        .push(R::KEY_COLUMN)
        .push(" = ")
        .push_bind(record.key())
        .push(" AND version = ")
        .push_bind(record.version())
        .push(" RETURNING version");

    let new_version: Option<i32> = builder
        .build_query_scalar()
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            ApiError::Database(format!("Failed to update {}: {}", R::RESOURCE, e))
        })?;

    match new_version {
        Some(version) => {
            record.set_version(version);
            Ok(version)
        }
        None => {
            record_edit_conflict(R::RESOURCE);
            tracing::debug!(
                target: "movies.store",
                resource = R::RESOURCE,
                expected_version = record.version(),
                "Conditional update lost the race"
            );
            Err(ApiError::EditConflict)
        }
    }
}

/// Delete the record with `key` if its version is still `version`.
///
/// Returns `NotFound` when no such record exists and `EditConflict` when it
/// exists at a different version.
#[instrument(skip_all, fields(resource = R::RESOURCE))]
pub async fn conditional_delete<R>(pool: &PgPool, key: R::Key, version: i32) -> Result<(), ApiError>
where
    R: Versioned,
{
    let delete_sql = format!(
        "DELETE FROM {} WHERE {} = $1 AND version = $2",
        R::TABLE,
        R::KEY_COLUMN
    );
    let deleted = sqlx::query(&delete_sql)
        .bind(key.clone())
        .bind(version)
        .execute(pool)
        .await
        .map_err(|e| ApiError::Database(format!("Failed to delete {}: {}", R::RESOURCE, e)))?
        .rows_affected();

    if deleted > 0 {
        return Ok(());
    }

    let exists_sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1)",
        R::TABLE,
        R::KEY_COLUMN
    );
    let exists: bool = sqlx::query_scalar(&exists_sql)
        .bind(key)
        .fetch_one(pool)
        .await
        .map_err(|e| ApiError::Database(format!("Failed to look up {}: {}", R::RESOURCE, e)))?;

    if exists {
        record_edit_conflict(R::RESOURCE);
        Err(ApiError::EditConflict)
    } else {
        Err(ApiError::NotFound(R::RESOURCE.to_string()))
    }
}

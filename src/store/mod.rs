//! Employee persistence.
//!
//! The import pipeline only ever talks to storage through the two traits in
//! this module:
//!
//! - [`EmployeeStore`] opens a unit of work.
//! - [`EmployeeTransaction`] upserts rows inside it and is consumed by either
//!   `commit` or `rollback`, so a finished transaction cannot be touched again.
//!
//! [`postgres`] provides the production implementation on top of sqlx plus the
//! DAO queries used by the CRUD routes. [`migration`] owns the schema.

pub mod filter;
pub mod migration;
pub mod postgres;

use async_trait::async_trait;
use rocket_db_pools::sqlx;
use thiserror::Error;

use crate::models::Employee;

pub use filter::{EmployeeFilter, SortColumn, SortKey, SortOrder};
pub use migration::run_migrations;
pub use postgres::PgEmployeeStore;

/// SQLSTATE raised by PostgreSQL for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Errors surfaced by the storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("conflicting employee key: {key}")]
    Conflict { key: String },
    #[error("employee with ID {id} not found")]
    NotFound { id: String },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let key = db_err
                    .constraint()
                    .map(str::to_string)
                    .unwrap_or_else(|| db_err.message().to_string());
                return StoreError::Conflict { key };
            }
        }
        StoreError::Database(err)
    }
}

/// Capability to open a unit of work against employee storage.
#[async_trait]
pub trait EmployeeStore: Send + Sync {
    type Transaction: EmployeeTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError>;
}

/// An open unit of work. Dropping it without calling [`commit`] must discard
/// every write made through it.
///
/// [`commit`]: EmployeeTransaction::commit
#[async_trait]
pub trait EmployeeTransaction: Send {
    /// Insert the employee, or overwrite login, name and salary of the row
    /// holding the same identifier or the same login. Fails with
    /// [`StoreError::Conflict`] when those are two different rows.
    async fn upsert_employee(&mut self, employee: &Employee) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

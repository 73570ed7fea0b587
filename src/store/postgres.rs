//! PostgreSQL-backed employee storage.
//!
//! The free functions are the DAO used by the CRUD routes and take a bare
//! `PgConnection`, so they run equally against a pooled connection or inside a
//! transaction. [`PgEmployeeStore`] adapts them to the [`EmployeeStore`]
//! capability consumed by the import pipeline.

use async_trait::async_trait;
use rocket_db_pools::sqlx::{self, PgConnection, PgPool, Postgres, QueryBuilder, Transaction};

use super::filter::EmployeeFilter;
use super::{EmployeeStore, EmployeeTransaction, StoreError};
use crate::models::{Employee, EmployeeDetails};

/// Insert a new employee. Fails with [`StoreError::Conflict`] when the
/// identifier or login is taken.
pub async fn insert_employee(
    conn: &mut PgConnection,
    employee: &Employee,
) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO employees (id, login, name, salary) VALUES ($1, $2, $3, $4)")
        .bind(&employee.id)
        .bind(&employee.login)
        .bind(&employee.name)
        .bind(employee.salary)
        .execute(conn)
        .await?;

    Ok(())
}

/// Insert the employee, or update in place the row that already holds its
/// identifier or its login.
///
/// The matched row keeps its identifier; login, name and salary are replaced.
/// When the identifier and the login belong to two different rows the update
/// violates the login constraint and surfaces as [`StoreError::Conflict`].
pub async fn upsert_employee(
    conn: &mut PgConnection,
    employee: &Employee,
) -> Result<(), StoreError> {
    let updated = sqlx::query(
        r#"UPDATE employees
           SET login = $2, name = $3, salary = $4
           WHERE id = $1 OR login = $2"#,
    )
    .bind(&employee.id)
    .bind(&employee.login)
    .bind(&employee.name)
    .bind(employee.salary)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        insert_employee(conn, employee).await?;
    }

    log::trace!("upserted employee {}", employee.id);
    Ok(())
}

pub async fn get_employee(conn: &mut PgConnection, id: &str) -> Result<Employee, StoreError> {
    sqlx::query_as::<_, Employee>("SELECT id, login, name, salary FROM employees WHERE id = $1")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

/// Replace every mutable column of an existing employee.
pub async fn update_employee(
    conn: &mut PgConnection,
    id: &str,
    details: &EmployeeDetails,
) -> Result<Employee, StoreError> {
    sqlx::query_as::<_, Employee>(
        r#"UPDATE employees
           SET login = $2, name = $3, salary = $4
           WHERE id = $1
           RETURNING id, login, name, salary"#,
    )
    .bind(id)
    .bind(&details.login)
    .bind(&details.name)
    .bind(details.salary)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

pub async fn delete_employee(conn: &mut PgConnection, id: &str) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM employees WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound { id: id.to_string() });
    }
    Ok(())
}

/// Run a filtered, optionally sorted and paginated listing.
pub async fn list_employees(
    conn: &mut PgConnection,
    filter: &EmployeeFilter,
) -> Result<Vec<Employee>, StoreError> {
    let mut query =
        QueryBuilder::<Postgres>::new("SELECT id, login, name, salary FROM employees");

    let mut has_condition = false;
    for (operator, bound) in [(">=", filter.min_salary), ("<=", filter.max_salary)] {
        if let Some(value) = bound {
            query.push(if has_condition { " AND " } else { " WHERE " });
            query.push("salary ").push(operator).push(" ").push_bind(value);
            has_condition = true;
        }
    }

    if let Some(sort) = filter.sort {
        query
            .push(" ORDER BY ")
            .push(sort.column.sql_column())
            .push(" ")
            .push(sort.order.sql_keyword());
    }

    query
        .push(" LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let employees = query.build_query_as::<Employee>().fetch_all(conn).await?;
    Ok(employees)
}

/// [`EmployeeStore`] over a PostgreSQL pool. Each unit of work is a database
/// transaction.
#[derive(Clone)]
pub struct PgEmployeeStore {
    pool: PgPool,
}

impl PgEmployeeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeStore for PgEmployeeStore {
    type Transaction = PgEmployeeTransaction;

    async fn begin(&self) -> Result<Self::Transaction, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(PgEmployeeTransaction { tx })
    }
}

/// Open database transaction. sqlx rolls it back on drop if neither
/// `commit` nor `rollback` was reached.
pub struct PgEmployeeTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl EmployeeTransaction for PgEmployeeTransaction {
    async fn upsert_employee(&mut self, employee: &Employee) -> Result<(), StoreError> {
        upsert_employee(&mut self.tx, employee).await
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

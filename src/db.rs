use rocket_db_pools::{sqlx, Database};

#[derive(Database)]
#[database("employees_db")]
pub struct EmployeesDb(sqlx::PgPool);

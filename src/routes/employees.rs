//! Single-record employee endpoints and the filtered listing.

use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::openapi;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::models::{Employee, EmployeeDetails, EmployeeList, MessageResponse};
use crate::routes::params::EmployeeListParams;
use crate::store::postgres;

fn validate_salary(id: &str, salary: f64) -> Result<(), ApiError> {
    if salary.is_finite() && salary >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Invalid employee field: salary should be a decimal that is > 0.0 for employee where id = {id}"
        )))
    }
}

/// List employees, optionally filtered by salary, sorted and paginated.
#[openapi(tag = "Employees")]
#[get("/users?<params..>")]
pub async fn list_employees(
    params: EmployeeListParams,
    config: &State<ServiceConfig>,
    pool: &State<PgPool>,
) -> Result<Json<EmployeeList>, ApiError> {
    let filter = params.into_filter(config.inner())?;
    let mut conn = pool.acquire().await?;
    let results = postgres::list_employees(&mut conn, &filter).await?;

    Ok(Json(EmployeeList { results }))
}

/// Retrieve one employee.
#[openapi(tag = "Employees")]
#[get("/users/<id>")]
pub async fn get_employee(
    id: String,
    pool: &State<PgPool>,
) -> Result<Json<EmployeeDetails>, ApiError> {
    let mut conn = pool.acquire().await?;
    let employee = postgres::get_employee(&mut conn, &id).await?;
    Ok(Json(employee.into()))
}

/// Create an employee. Identifier and login must both be unused.
#[openapi(tag = "Employees")]
#[post("/users", data = "<employee>")]
pub async fn create_employee(
    employee: Json<Employee>,
    pool: &State<PgPool>,
) -> Result<Json<Employee>, ApiError> {
    let employee = employee.into_inner();
    if employee.id.is_empty() {
        return Err(ApiError::BadRequest(
            "missing employee fields: ID, login, name and salary fields are all required"
                .to_string(),
        ));
    }
    validate_salary(&employee.id, employee.salary)?;

    let mut conn = pool.acquire().await?;
    postgres::insert_employee(&mut conn, &employee).await?;
    log::info!("created employee {}", employee.id);

    Ok(Json(employee))
}

/// Replace login, name and salary of an existing employee.
#[openapi(tag = "Employees")]
#[put("/users/<id>", data = "<details>")]
pub async fn update_employee(
    id: String,
    details: Json<EmployeeDetails>,
    pool: &State<PgPool>,
) -> Result<Json<EmployeeDetails>, ApiError> {
    validate_salary(&id, details.salary)?;

    let mut conn = pool.acquire().await?;
    let updated = postgres::update_employee(&mut conn, &id, &details).await?;
    log::info!("updated employee {}", id);

    Ok(Json(updated.into()))
}

#[openapi(tag = "Employees")]
#[delete("/users/<id>")]
pub async fn delete_employee(
    id: String,
    pool: &State<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut conn = pool.acquire().await?;
    postgres::delete_employee(&mut conn, &id).await?;
    log::info!("deleted employee {}", id);

    Ok(Json(MessageResponse {
        message: format!("Employee with ID {id} was deleted successfully"),
    }))
}

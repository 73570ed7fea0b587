use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ===== Employee Models =====

/// A stored employee row. Also the body accepted by the create route and the
/// item type of list responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, JsonSchema)]
pub struct Employee {
    pub id: String,
    pub login: String,
    pub name: String,
    pub salary: f64,
}

impl Employee {
    pub fn new(
        id: impl Into<String>,
        login: impl Into<String>,
        name: impl Into<String>,
        salary: f64,
    ) -> Self {
        Self {
            id: id.into(),
            login: login.into(),
            name: name.into(),
            salary,
        }
    }
}

/// Employee columns without the identifier. Returned by the get-by-id route
/// and accepted by the update route, which expects every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EmployeeDetails {
    pub login: String,
    pub name: String,
    pub salary: f64,
}

impl From<Employee> for EmployeeDetails {
    fn from(employee: Employee) -> Self {
        Self {
            login: employee.login,
            name: employee.name,
            salary: employee.salary,
        }
    }
}

// ===== API Responses =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmployeeList {
    pub results: Vec<Employee>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Body returned when every uploaded file was imported.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub records_applied: usize,
    pub message: String,
}

impl UploadResponse {
    pub fn new(records_applied: usize) -> Self {
        Self {
            records_applied,
            message: format!("Number of employees inserted : {records_applied}"),
        }
    }
}

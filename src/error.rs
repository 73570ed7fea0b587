use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use rocket_db_pools::sqlx;
use serde::Serialize;
use std::io::Cursor;

use crate::import::ImportFailure;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    DatabaseError(sqlx::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    InternalError(String),
    ImportFailed {
        file: String,
        records_applied: usize,
        message: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    records_applied: Option<usize>,
}

impl ApiError {
    /// Build the response for an import that stopped at `failure` after
    /// `records_applied` records had been committed.
    pub fn import_failed(records_applied: usize, failure: ImportFailure) -> Self {
        ApiError::ImportFailed {
            file: failure.upload,
            records_applied,
            message: failure.error.to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut file = None;
        let mut records_applied = None;

        let (status, error_type, message) = match self {
            ApiError::DatabaseError(e) => {
                log::error!("database error: {}", e);
                (Status::InternalServerError, "DatabaseError", e.to_string())
            }
            ApiError::NotFound(msg) => {
                log::debug!("not found: {}", msg);
                (Status::NotFound, "NotFound", msg)
            }
            ApiError::BadRequest(msg) => {
                log::debug!("bad request: {}", msg);
                (Status::BadRequest, "BadRequest", msg)
            }
            ApiError::Conflict(msg) => {
                log::debug!("conflict: {}", msg);
                (Status::Conflict, "Conflict", msg)
            }
            ApiError::InternalError(msg) => {
                log::error!("internal error: {}", msg);
                (Status::InternalServerError, "InternalError", msg)
            }
            ApiError::ImportFailed {
                file: failed_file,
                records_applied: applied,
                message,
            } => {
                log::debug!("import of {} failed: {}", failed_file, message);
                file = Some(failed_file);
                records_applied = Some(applied);
                (Status::BadRequest, "ImportFailed", message)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
            file,
            records_applied,
        };

        let json = serde_json::to_string(&error_response)
            .unwrap_or_else(|_| r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string());

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(Responses::default())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            other => StoreError::from(other).into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => ApiError::DatabaseError(e),
            StoreError::Conflict { .. } => ApiError::Conflict(err.to_string()),
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
        }
    }
}

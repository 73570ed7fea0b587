//! Multipart bulk import endpoint.

use std::io;

use async_trait::async_trait;
use rocket::State;
use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::PgPool;

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::import::{UploadReader, UploadSource, import_uploads};
use crate::models::UploadResponse;
use crate::store::PgEmployeeStore;

/// `multipart/form-data` body: one or more parts named `file`.
#[derive(FromForm)]
pub struct UploadForm<'r> {
    #[field(name = "file")]
    pub files: Vec<TempFile<'r>>,
}

#[async_trait]
impl<'v> UploadSource for TempFile<'v> {
    fn name(&self) -> &str {
        TempFile::name(self).unwrap_or("upload")
    }

    async fn open<'a>(&'a self) -> io::Result<UploadReader<'a>> {
        let reader = TempFile::open(self).await?;
        Ok(Box::pin(reader))
    }
}

/// Import employees from every uploaded file, in the order the parts were
/// sent. Each file is applied in its own transaction; the first failing file
/// stops the import and the response reports how many records the earlier
/// files committed.
#[post("/users/upload", data = "<form>")]
pub async fn upload_employees(
    form: Form<UploadForm<'_>>,
    pool: &State<PgPool>,
    config: &State<ServiceConfig>,
) -> Result<Json<UploadResponse>, ApiError> {
    let files = &form.files;

    if files.is_empty() {
        return Err(ApiError::BadRequest(
            "at least one file must be uploaded in the `file` field".to_string(),
        ));
    }
    if files.len() > config.max_upload_files {
        return Err(ApiError::BadRequest(format!(
            "at most {} files can be uploaded at once",
            config.max_upload_files
        )));
    }

    log::info!("received {} employee upload(s)", files.len());

    let store = PgEmployeeStore::new(pool.inner().clone());
    let outcome = import_uploads(&store, files).await;

    match outcome.failure {
        Some(failure) => Err(ApiError::import_failed(outcome.records_applied, failure)),
        None => Ok(Json(UploadResponse::new(outcome.records_applied))),
    }
}

use std::io;

use thiserror::Error;

use crate::store::StoreError;

/// Reasons a single upload fails to import. Every variant is fatal to the
/// upload it occurred in and rolls back that upload's unit of work.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to open upload: {0}")]
    OpenUpload(#[source] io::Error),
    #[error("failed to read upload: {0}")]
    StreamRead(#[source] io::Error),
    #[error("missing employee fields: ID, login, name and salary fields are all required")]
    MalformedRecord,
    #[error(
        "invalid employee field: salary should be a decimal that is > 0.0 for employee where id = {id}"
    )]
    InvalidSalary { id: String },
    #[error(transparent)]
    StorageApply(#[from] StoreError),
    #[error("employees added is 0: empty file was uploaded")]
    EmptyBatch,
}

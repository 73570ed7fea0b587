//! Bulk employee import.
//!
//! An upload is a text stream of `id,login,name,salary` lines. The pipeline
//! is:
//!
//! 1. **Lines** (`lines`) - splits the stream into lines, telling end of stream
//!    apart from read failures
//! 2. **Records** (`record`) - turns a line into an employee, a skip (blank or
//!    `#` comment) or a rejection
//! 3. **Batch** (`batch`) - upserts the records of one upload inside a single
//!    unit of work; any failure rolls the whole upload back
//! 4. **Orchestration** (`orchestrator`) - runs the batches of a request in
//!    order, stops at the first failure and totals committed records
//!
//! Everything runs sequentially. Line order matters: a rejection on line N
//! must prevent every later line of that upload from being applied.
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use employee_api::import::{FileUpload, import_uploads};
//! use employee_api::store::PgEmployeeStore;
//!
//! let store = PgEmployeeStore::new(pool);
//! let outcome = import_uploads(&store, &[FileUpload::new("employees.csv")]).await;
//!
//! println!("Imported {} employees", outcome.records_applied);
//! ```

pub mod batch;
pub mod error;
pub mod lines;
pub mod orchestrator;
pub mod record;

pub use batch::apply_batch;
pub use error::ImportError;
pub use orchestrator::{
    FileUpload, ImportFailure, ImportOutcome, UploadReader, UploadSource, import_uploads,
};
pub use record::{ParsedLine, parse_line};

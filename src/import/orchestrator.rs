//! Multi-upload import coordination.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, BufReader};

use super::batch::apply_batch;
use super::ImportError;
use crate::store::EmployeeStore;

/// Readable body of an opened upload.
pub type UploadReader<'a> = Pin<Box<dyn AsyncBufRead + Send + 'a>>;

/// A named byte stream submitted for import.
#[async_trait]
pub trait UploadSource: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    async fn open<'a>(&'a self) -> io::Result<UploadReader<'a>>;
}

/// A file on the local filesystem, as imported by the command-line tool.
#[derive(Debug, Clone)]
pub struct FileUpload {
    path: PathBuf,
    name: String,
}

impl FileUpload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path.display().to_string();
        Self { path, name }
    }
}

#[async_trait]
impl UploadSource for FileUpload {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open<'a>(&'a self) -> io::Result<UploadReader<'a>> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::pin(BufReader::new(file)))
    }
}

/// The upload that stopped an import and why.
#[derive(Debug)]
pub struct ImportFailure {
    pub upload: String,
    pub error: ImportError,
}

/// Aggregate result of one import request.
///
/// `records_applied` only counts uploads that committed; a failing upload
/// contributes nothing because its unit of work was rolled back.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub records_applied: usize,
    pub failure: Option<ImportFailure>,
}

impl ImportOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Import each upload in order, one unit of work per upload.
///
/// Processing stops at the first upload that cannot be opened or fails to
/// apply; later uploads are never opened. The outcome keeps the records
/// committed by the uploads before the failing one.
pub async fn import_uploads<S, U>(store: &S, uploads: &[U]) -> ImportOutcome
where
    S: EmployeeStore + ?Sized,
    U: UploadSource,
{
    let mut outcome = ImportOutcome::default();

    for upload in uploads {
        log::info!("importing employees from {}", upload.name());

        let result = match upload.open().await {
            Ok(reader) => apply_batch(store, reader).await,
            Err(err) => Err(ImportError::OpenUpload(err)),
        };

        match result {
            Ok(applied) => {
                outcome.records_applied += applied;
                log::info!("imported {} employees from {}", applied, upload.name());
            }
            Err(error) => {
                log::warn!(
                    "import of {} failed, {} employees committed before it: {}",
                    upload.name(),
                    outcome.records_applied,
                    error
                );
                outcome.failure = Some(ImportFailure {
                    upload: upload.name().to_string(),
                    error,
                });
                break;
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Employee;
    use crate::test_support::{MemoryEmployeeStore, MemoryUpload};
    use std::io::Write;

    fn five_employees() -> MemoryUpload {
        MemoryUpload::new(
            "first.csv",
            "e1,l1,A,1\ne2,l2,B,2\n# comment\ne3,l3,C,3\ne4,l4,D,4\ne5,l5,E,5\n",
        )
    }

    #[tokio::test]
    async fn sums_records_across_uploads() {
        let store = MemoryEmployeeStore::new();
        let uploads = vec![
            five_employees(),
            MemoryUpload::new("second.csv", "e6,l6,F,6\n"),
        ];

        let outcome = import_uploads(&store, &uploads).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.records_applied, 6);
        assert_eq!(store.len(), 6);
        assert_eq!(store.commits(), 2);
    }

    #[tokio::test]
    async fn stops_at_first_failing_upload() {
        let store = MemoryEmployeeStore::new();
        let uploads = vec![
            five_employees(),
            MemoryUpload::new("second.csv", "e6,l6,F,6\ne7,l7,G,7\ne8,l8\n"),
            MemoryUpload::new("third.csv", "e9,l9,I,9\n"),
        ];

        let outcome = import_uploads(&store, &uploads).await;

        assert_eq!(outcome.records_applied, 5);
        let failure = outcome.failure.expect("second upload fails");
        assert_eq!(failure.upload, "second.csv");
        assert!(matches!(failure.error, ImportError::MalformedRecord));
        assert_eq!(store.len(), 5);
        assert!(store.get("e6").is_none());
        assert!(!uploads[2].was_opened());
    }

    #[tokio::test]
    async fn unopenable_upload_halts_processing() {
        let store = MemoryEmployeeStore::new();
        let uploads = vec![
            MemoryUpload::unopenable("broken.csv"),
            five_employees(),
        ];

        let outcome = import_uploads(&store, &uploads).await;

        assert_eq!(outcome.records_applied, 0);
        let failure = outcome.failure.expect("open failure");
        assert_eq!(failure.upload, "broken.csv");
        assert!(matches!(failure.error, ImportError::OpenUpload(_)));
        assert!(store.is_empty());
        assert_eq!(store.commits(), 0);
    }

    #[tokio::test]
    async fn empty_upload_fails_the_request() {
        let store = MemoryEmployeeStore::new();
        let uploads = vec![five_employees(), MemoryUpload::new("empty.csv", "#only a header\n")];

        let outcome = import_uploads(&store, &uploads).await;

        assert_eq!(outcome.records_applied, 5);
        assert!(matches!(
            outcome.failure.map(|failure| failure.error),
            Some(ImportError::EmptyBatch)
        ));
    }

    #[tokio::test]
    async fn no_uploads_is_a_successful_noop() {
        let store = MemoryEmployeeStore::new();
        let outcome = import_uploads::<_, MemoryUpload>(&store, &[]).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.records_applied, 0);
    }

    #[tokio::test]
    async fn imports_local_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "e1,l1,Jane Doe,1234.50\n#comment\ne2,l2,Bob,1").unwrap();
        let store = MemoryEmployeeStore::new();

        let outcome = import_uploads(&store, &[FileUpload::new(file.path())]).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.records_applied, 2);
        assert_eq!(store.get("e2"), Some(Employee::new("e2", "l2", "Bob", 1.0)));
    }

    #[tokio::test]
    async fn missing_local_file_cannot_be_opened() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryEmployeeStore::new();
        let upload = FileUpload::new(dir.path().join("missing.csv"));

        let outcome = import_uploads(&store, &[upload]).await;

        assert!(matches!(
            outcome.failure.map(|failure| failure.error),
            Some(ImportError::OpenUpload(_))
        ));
    }
}

//! Transactional application of one upload.

use tokio::io::AsyncBufRead;

use super::lines::LineReader;
use super::record::{ParsedLine, parse_line};
use super::ImportError;
use crate::store::{EmployeeStore, EmployeeTransaction};

/// Apply every record of `reader` inside a single unit of work.
///
/// Lines are read, parsed and upserted strictly in order. The first read
/// failure, rejected line or storage error rolls the whole batch back, so no
/// line of a failing upload is ever visible. On success the unit of work is
/// committed and the number of upserted records returned.
///
/// A batch without any record still commits its (empty) unit of work but is
/// reported as [`ImportError::EmptyBatch`].
pub async fn apply_batch<S, R>(store: &S, reader: R) -> Result<usize, ImportError>
where
    S: EmployeeStore + ?Sized,
    R: AsyncBufRead + Unpin,
{
    let mut lines = LineReader::new(reader);
    let mut tx = store.begin().await?;
    let mut applied = 0;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => return abort(tx, err).await,
        };

        let employee = match parse_line(&line) {
            ParsedLine::Skipped => {
                log::trace!("skipping line {}", lines.line_number());
                continue;
            }
            ParsedLine::Record(employee) => employee,
            ParsedLine::Rejected(err) => {
                log::warn!("rejected line {}: {}", lines.line_number(), err);
                return abort(tx, err).await;
            }
        };

        if let Err(err) = tx.upsert_employee(&employee).await {
            log::warn!(
                "failed to apply employee {} from line {}: {}",
                employee.id,
                lines.line_number(),
                err
            );
            return abort(tx, err.into()).await;
        }
        applied += 1;
    }

    tx.commit().await?;

    if applied == 0 {
        return Err(ImportError::EmptyBatch);
    }

    log::debug!("committed {} employees", applied);
    Ok(applied)
}

async fn abort<T>(tx: T, err: ImportError) -> Result<usize, ImportError>
where
    T: EmployeeTransaction,
{
    // Callers need the triggering error; a rollback error is only logged.
    if let Err(rollback_err) = tx.rollback().await {
        log::error!("failed to roll back employee import: {}", rollback_err);
    }
    Err(err)
}

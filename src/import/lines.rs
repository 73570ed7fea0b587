//! Line tokenizer over an uploaded byte stream.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::ImportError;

/// Yields the lines of a stream one at a time, each with its trailing `\n`
/// when present. The final line of a stream may come back without one.
///
/// Once the stream is exhausted, or a read fails, the reader is finished and
/// keeps returning `Ok(None)`.
pub struct LineReader<R> {
    reader: R,
    line_number: usize,
    finished: bool,
}

impl<R> LineReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            finished: false,
        }
    }

    /// Read the next line.
    ///
    /// `Ok(None)` marks the end of the stream. Any I/O failure, including
    /// bytes that are not valid UTF-8, is returned as
    /// [`ImportError::StreamRead`].
    pub async fn next_line(&mut self) -> Result<Option<String>, ImportError> {
        if self.finished {
            return Ok(None);
        }

        let mut line = String::new();
        match self.reader.read_line(&mut line).await {
            Ok(0) => {
                self.finished = true;
                Ok(None)
            }
            Ok(_) => {
                self.line_number += 1;
                Ok(Some(line))
            }
            Err(err) => {
                self.finished = true;
                Err(ImportError::StreamRead(err))
            }
        }
    }

    /// One-based number of the last line returned.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::failing_reader;

    async fn collect_lines(input: &[u8]) -> Vec<String> {
        let mut reader = LineReader::new(input);
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn keeps_line_terminators() {
        let lines = collect_lines(b"a,b\nc,d\r\n\ne,f").await;
        assert_eq!(lines, vec!["a,b\n", "c,d\r\n", "\n", "e,f"]);
    }

    #[tokio::test]
    async fn empty_stream_ends_immediately() {
        assert!(collect_lines(b"").await.is_empty());
    }

    #[tokio::test]
    async fn stays_finished_after_end_of_stream() {
        let mut reader = LineReader::new(&b"only\n"[..]);
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("only\n"));
        assert!(reader.next_line().await.unwrap().is_none());
        assert!(reader.next_line().await.unwrap().is_none());
        assert_eq!(reader.line_number(), 1);
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_read_error() {
        let mut reader = LineReader::new(&b"e1,l1,\xff\xfe,1.0\n"[..]);
        let err = reader.next_line().await.unwrap_err();
        assert!(matches!(err, ImportError::StreamRead(_)));
        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn surfaces_underlying_read_failure() {
        let mut reader = LineReader::new(failing_reader(b"e1,l1,Jane,1.0\ne2,"));
        assert_eq!(
            reader.next_line().await.unwrap().as_deref(),
            Some("e1,l1,Jane,1.0\n")
        );
        let err = reader.next_line().await.unwrap_err();
        assert!(matches!(err, ImportError::StreamRead(_)));
    }
}

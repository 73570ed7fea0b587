//! Conversion of one uploaded line into an employee record.
//!
//! Line format: `id,login,name,salary`. Empty lines and lines starting with
//! `#` are skipped. Fields are taken literally; only the salary loses its line
//! terminator before it is parsed.

use super::ImportError;
use crate::models::Employee;

const FIELD_SEPARATOR: char = ',';
const COMMENT_PREFIX: char = '#';

/// Outcome of parsing a single line.
#[derive(Debug)]
pub enum ParsedLine {
    /// Blank or comment line.
    Skipped,
    Record(Employee),
    /// The line is invalid; the whole batch must be abandoned.
    Rejected(ImportError),
}

/// Strip a trailing `\n` or `\r\n`.
fn strip_terminator(text: &str) -> &str {
    let text = text.strip_suffix('\n').unwrap_or(text);
    text.strip_suffix('\r').unwrap_or(text)
}

fn parse_salary(text: &str) -> Option<f64> {
    strip_terminator(text)
        .parse::<f64>()
        .ok()
        .filter(|salary| salary.is_finite() && *salary >= 0.0)
}

/// Parse one raw line as read from the upload.
pub fn parse_line(line: &str) -> ParsedLine {
    if strip_terminator(line).is_empty() || line.starts_with(COMMENT_PREFIX) {
        return ParsedLine::Skipped;
    }

    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    let &[id, login, name, salary] = fields.as_slice() else {
        return ParsedLine::Rejected(ImportError::MalformedRecord);
    };

    match parse_salary(salary) {
        Some(salary) => ParsedLine::Record(Employee::new(id, login, name, salary)),
        None => ParsedLine::Rejected(ImportError::InvalidSalary { id: id.to_string() }),
    }
}

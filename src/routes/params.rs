//! Query parameter helpers for the employee listing.
//!
//! Values are received as raw strings so malformed input produces the
//! service's own `Invalid data format` messages instead of Rocket's generic
//! form errors. [`EmployeeListParams::into_filter`] performs all validation
//! before anything reaches the query builder.

use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::ServiceConfig;
use crate::error::ApiError;
use crate::store::{EmployeeFilter, SortColumn, SortKey, SortOrder};

/// Query parameters accepted by the employee listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeListParams {
    /// Inclusive lower salary bound.
    #[field(name = "minSalary")]
    #[serde(default)]
    pub min_salary: Option<String>,
    /// Inclusive upper salary bound.
    #[field(name = "maxSalary")]
    #[serde(default)]
    pub max_salary: Option<String>,
    /// `+column` (ascending, send as `%2B`) or `-column` (descending), where
    /// column is one of `id`, `login`, `name`, `salary`.
    #[serde(default)]
    pub sort: Option<String>,
    /// Maximum number of rows to return.
    #[serde(default)]
    pub limit: Option<String>,
    /// Number of rows to skip.
    #[serde(default)]
    pub offset: Option<String>,
}

/// Treat a missing and an empty parameter alike.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn parse_salary_bound(value: &Option<String>, param: &str) -> Result<Option<f64>, ApiError> {
    match present(value) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|bound| bound.is_finite())
            .map(Some)
            .ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Invalid data format: {param} should be a decimal"
                ))
            }),
    }
}

fn parse_count(value: &Option<String>, param: &str, default: i64) -> Result<i64, ApiError> {
    match present(value) {
        None => Ok(default),
        Some(raw) => raw.parse::<i64>().ok().filter(|count| *count >= 0).ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Invalid data format: {param} should be an integer"
            ))
        }),
    }
}

fn parse_sort(value: &Option<String>) -> Result<Option<SortKey>, ApiError> {
    let Some(raw) = present(value) else {
        return Ok(None);
    };

    let mut chars = raw.chars();
    let order = match chars.next() {
        Some('+') => SortOrder::Asc,
        Some('-') => SortOrder::Desc,
        _ => {
            return Err(ApiError::BadRequest(
                "Invalid data format: Order should be represented by %2B (+) (ascending) or - (descending)"
                    .to_string(),
            ));
        }
    };

    let column = SortColumn::from_name(chars.as_str()).ok_or_else(|| {
        ApiError::BadRequest(
            "Invalid data format: Only columns \"id\", \"name\", \"login\" or \"salary\" can be sorted"
                .to_string(),
        )
    })?;

    Ok(Some(SortKey { column, order }))
}

impl EmployeeListParams {
    /// Validate the raw parameters into a listing filter.
    ///
    /// `limit` falls back to the configured default and is capped at the
    /// configured maximum; `offset` defaults to 0.
    pub fn into_filter(self, config: &ServiceConfig) -> Result<EmployeeFilter, ApiError> {
        let min_salary = parse_salary_bound(&self.min_salary, "minSalary")?;
        let max_salary = parse_salary_bound(&self.max_salary, "maxSalary")?;

        if let (Some(min), Some(max)) = (min_salary, max_salary) {
            if min > max {
                return Err(ApiError::BadRequest(
                    "Invalid data format: minSalary should not exceed maxSalary".to_string(),
                ));
            }
        }

        let sort = parse_sort(&self.sort)?;
        let limit = parse_count(&self.limit, "limit", config.default_limit)?.min(config.max_limit);
        let offset = parse_count(&self.offset, "offset", 0)?;

        Ok(EmployeeFilter {
            min_salary,
            max_salary,
            sort,
            offset,
            ..EmployeeFilter::with_limit(limit)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::form::Form;
    use rocket::http::RawStr;

    fn config() -> ServiceConfig {
        ServiceConfig {
            default_limit: 30,
            max_limit: 100,
            max_upload_files: 4,
        }
    }

    fn filter(query: &str) -> Result<EmployeeFilter, ApiError> {
        let params: EmployeeListParams = Form::parse_encoded(RawStr::new(query)).unwrap();
        params.into_filter(&config())
    }

    fn bad_request(query: &str) -> String {
        match filter(query) {
            Err(ApiError::BadRequest(message)) => message,
            other => panic!("expected bad request for {query:?}, got {other:?}"),
        }
    }

    #[test]
    fn defaults_when_nothing_is_given() {
        assert_eq!(filter("").unwrap(), EmployeeFilter::with_limit(30));
        assert_eq!(
            filter("minSalary=&sort=&limit=").unwrap(),
            EmployeeFilter::with_limit(30)
        );
    }

    #[test]
    fn parses_full_query() {
        let parsed = filter("minSalary=100.5&maxSalary=4000&sort=%2Bname&limit=10&offset=20").unwrap();
        assert_eq!(parsed.min_salary, Some(100.5));
        assert_eq!(parsed.max_salary, Some(4000.0));
        assert_eq!(
            parsed.sort,
            Some(SortKey {
                column: SortColumn::Name,
                order: SortOrder::Asc,
            })
        );
        assert_eq!(parsed.limit, 10);
        assert_eq!(parsed.offset, 20);

        let descending = filter("sort=-salary").unwrap();
        assert_eq!(
            descending.sort,
            Some(SortKey {
                column: SortColumn::Salary,
                order: SortOrder::Desc,
            })
        );
    }

    #[test]
    fn decodes_plus_sign_in_sort() {
        let ascending = filter("sort=%2Blogin").unwrap();
        assert_eq!(
            ascending.sort,
            Some(SortKey {
                column: SortColumn::Login,
                order: SortOrder::Asc,
            })
        );
    }

    #[test]
    fn caps_limit_at_configured_maximum() {
        assert_eq!(filter("limit=5000").unwrap().limit, 100);
        assert_eq!(filter("limit=0").unwrap().limit, 0);
    }

    #[test]
    fn rejects_bad_sort() {
        assert_eq!(
            bad_request("sort=salary"),
            "Invalid data format: Order should be represented by %2B (+) (ascending) or - (descending)"
        );
        assert_eq!(
            bad_request("sort=-age"),
            "Invalid data format: Only columns \"id\", \"name\", \"login\" or \"salary\" can be sorted"
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        assert_eq!(
            bad_request("limit=ten"),
            "Invalid data format: limit should be an integer"
        );
        assert_eq!(
            bad_request("offset=-1"),
            "Invalid data format: offset should be an integer"
        );
        assert_eq!(
            bad_request("minSalary=abc"),
            "Invalid data format: minSalary should be a decimal"
        );
        assert_eq!(
            bad_request("minSalary=10&maxSalary=5"),
            "Invalid data format: minSalary should not exceed maxSalary"
        );
    }
}

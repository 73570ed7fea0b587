//! Listing criteria handed to [`list_employees`](super::postgres::list_employees).
//!
//! Everything here is already validated; the query builder trusts these
//! values and only ever interpolates the static column and keyword strings.

/// Columns the listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    Login,
    Name,
    Salary,
}

impl SortColumn {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "id" => Some(SortColumn::Id),
            "login" => Some(SortColumn::Login),
            "name" => Some(SortColumn::Name),
            "salary" => Some(SortColumn::Salary),
            _ => None,
        }
    }

    pub fn sql_column(self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Login => "login",
            SortColumn::Name => "name",
            SortColumn::Salary => "salary",
        }
    }
}

/// Sort direction for the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Render the sort order as a SQL keyword.
    pub fn sql_keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: SortColumn,
    pub order: SortOrder,
}

/// Salary bounds (inclusive), ordering and paging for an employee listing.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeFilter {
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub sort: Option<SortKey>,
    pub limit: i64,
    pub offset: i64,
}

impl EmployeeFilter {
    /// Unfiltered, unsorted listing of the first `limit` rows.
    pub fn with_limit(limit: i64) -> Self {
        Self {
            min_salary: None,
            max_salary: None,
            sort: None,
            limit,
            offset: 0,
        }
    }
}

//! Paging and sorting input for list queries.
//!
//! Client-supplied sort tokens never reach SQL text: [`Filters::sort_column`]
//! resolves them to a literal taken from the caller's allow-list, and the
//! only other query inputs ([`Filters::limit`], [`Filters::offset`]) are
//! integers meant to be bound as parameters.

use serde::Serialize;

use crate::validator::Validator;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const DEFAULT_SORT: &str = "id";
pub const MAX_PAGE: i64 = 10_000_000;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Sort tokens accepted by the item listing.
pub const ITEM_SORT_SAFELIST: &[&str] =
    &["id", "item", "description", "-id", "-item", "-description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// Builds filters from raw query-string values and validates them.
    ///
    /// Missing or empty values fall back to the defaults; violations are
    /// recorded on `v` rather than returned.
    pub fn from_query(
        page: Option<&str>,
        page_size: Option<&str>,
        sort: Option<&str>,
        sort_safelist: &'static [&'static str],
        v: &mut Validator,
    ) -> Self {
        let filters = Self {
            page: read_int(page, "page", DEFAULT_PAGE, v),
            page_size: read_int(page_size, "page_size", DEFAULT_PAGE_SIZE, v),
            sort: sort
                .filter(|value| !value.is_empty())
                .unwrap_or(DEFAULT_SORT)
                .to_string(),
            sort_safelist,
        };
        validate_filters(v, &filters);
        filters
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0).saturating_mul(self.page_size)
    }

    /// Column named by the sort token, as spelled in the allow-list.
    ///
    /// Returns `None` unless the token is itself an allow-list entry.
    #[must_use]
    pub fn sort_column(&self) -> Option<&'static str> {
        self.sort_safelist
            .iter()
            .copied()
            .find(|entry| *entry == self.sort)
            .map(|entry| entry.strip_prefix('-').unwrap_or(entry))
    }

    #[must_use]
    pub fn sort_direction(&self) -> SortDirection {
        if self.sort.starts_with('-') {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

pub fn validate_filters(v: &mut Validator, filters: &Filters) {
    v.check(filters.page > 0, "page", "must be greater than zero");
    v.check(filters.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
    v.check(filters.page_size > 0, "page_size", "must be greater than zero");
    v.check(
        filters.page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );
    if filters.sort_column().is_none() {
        v.add_error("sort", format!("invalid sort value {:?}", filters.sort));
    }
}

fn read_int(raw: Option<&str>, key: &str, default: i64, v: &mut Validator) -> i64 {
    match raw.filter(|value| !value.is_empty()) {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

/// Pagination summary for one page of a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

/// All fields are zero when there are no records.
#[must_use]
pub fn calculate_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records <= 0 || page_size <= 0 {
        return Metadata::default();
    }

    let last_page = total_records / page_size + i64::from(total_records % page_size != 0);
    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page,
        total_records,
    }
}

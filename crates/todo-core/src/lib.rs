//! Transport-independent core of the todo list service.
//!
//! - [`codec`] turns bounded request bodies into typed inputs and envelopes
//!   back into indented JSON.
//! - [`validator`] accumulates field-level violations for one request.
//! - [`filters`] validates paging/sorting input against an allow-list and
//!   derives pagination [`Metadata`].
//! - [`DomainError`] is the closed error set returned by item stores.

use time::{OffsetDateTime, UtcOffset};

pub mod codec;
pub mod filters;
pub mod item;
pub mod validator;

mod error;

pub use codec::{decode, encode, DecodeError, EncodeError, Envelope, Shape, MAX_BODY_BYTES};
pub use error::DomainError;
pub use filters::{
    calculate_metadata, validate_filters, Filters, Metadata, SortDirection, ITEM_SORT_SAFELIST,
};
pub use item::{validate_item, CreateItemInput, Item, ItemDraft, UpdateItemInput};
pub use validator::{permitted_value, unique, ValidationErrors, Validator};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TimestampError {
    #[error("invalid RFC3339 timestamp: {0}")]
    Parse(String),
    #[error("failed to format RFC3339 timestamp: {0}")]
    Format(String),
}

#[must_use]
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(UtcOffset::UTC)
}

/// Formats a timestamp as RFC3339 after normalizing to UTC.
///
/// # Errors
/// Returns [`TimestampError::Format`] when the value cannot be represented.
pub fn format_rfc3339(value: OffsetDateTime) -> Result<String, TimestampError> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|err| TimestampError::Format(err.to_string()))
}

/// Parses an RFC3339 timestamp and normalizes it to UTC.
///
/// # Errors
/// Returns [`TimestampError::Parse`] for malformed input.
pub fn parse_rfc3339(value: &str) -> Result<OffsetDateTime, TimestampError> {
    OffsetDateTime::parse(value, &time::format_description::well_known::Rfc3339)
        .map(|parsed| parsed.to_offset(UtcOffset::UTC))
        .map_err(|err| TimestampError::Parse(err.to_string()))
}

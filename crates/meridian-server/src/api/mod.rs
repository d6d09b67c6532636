//! Route handlers, grouped by resource

pub mod cleanup;
pub mod servers;
pub mod stats;
pub mod users;

use crate::error::{ApiError, ApiResult};

/// Borrow a required string field, rejecting absent or blank values
pub(crate) fn required<'a>(name: &str, value: &'a Option<String>) -> ApiResult<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::BadRequest(format!("{} is required", name))),
    }
}

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{AppError, ErrorKind};

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new(ErrorKind::Storage, "CLOCK_FORMAT_FAILED", "Failed to format time")
            .with_details(e.to_string())
    })
}

/// Nanoseconds since the Unix epoch; used only as an id salt.
pub fn unix_nanos() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos()
}

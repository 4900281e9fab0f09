//! Timestamps for run records

use chrono::{DateTime, Local, Utc};

/// Wall-clock timestamp recorded in run metadata.
///
/// Honours `SOURCE_DATE_EPOCH` (seconds since the Unix epoch, UTC) so test
/// fixtures and reproducible builds get a stable value.
pub fn measurement_timestamp() -> String {
    if let Ok(epoch) = std::env::var("SOURCE_DATE_EPOCH") {
        if let Some(time) = epoch
            .parse::<i64>()
            .ok()
            .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
        {
            return time.format("%Y-%m-%d %H:%M:%S").to_string();
        }
    }
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

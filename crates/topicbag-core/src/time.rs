//! Timestamp and filename helpers.
//!
//! All capture and log timestamps in the pipeline are nanoseconds since the
//! Unix epoch. Output filenames embed local wall-clock time in the
//! `<prefix>_YYYY_MM_DD-HH_MM_SS.<ext>` convention.

use chrono::Local;
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in nanoseconds since the Unix epoch.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Render a nanosecond timestamp as a human-readable local time string.
pub fn timestamp_ns_to_string(timestamp_ns: u64) -> String {
    let secs = (timestamp_ns / 1_000_000_000) as i64;
    let nanos = (timestamp_ns % 1_000_000_000) as u32;
    match chrono::DateTime::from_timestamp(secs, nanos) {
        Some(dt) => dt
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S%.9f")
            .to_string(),
        None => format!("{}ns", timestamp_ns),
    }
}

/// Generate a unique, time-stamped filename: `<prefix>_YYYY_MM_DD-HH_MM_SS.<ext>`.
pub fn unique_filename(prefix: &str, extension: &str) -> String {
    let stamp = Local::now().format("%Y_%m_%d-%H_%M_%S");
    format!("{}_{}.{}", prefix, stamp, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ns_is_recent() {
        let ns = now_ns();
        // After 2020-01-01 and before 2100-01-01
        assert!(ns > 1_577_836_800_000_000_000);
        assert!(ns < 4_102_444_800_000_000_000);
    }

    #[test]
    fn test_now_ns_monotonic_enough() {
        let a = now_ns();
        let b = now_ns();
        assert!(b >= a);
    }

    #[test]
    fn test_unique_filename_shape() {
        let name = unique_filename("run", "bag");
        assert!(name.starts_with("run_"));
        assert!(name.ends_with(".bag"));
        // prefix + '_' + "YYYY_MM_DD-HH_MM_SS" + ".bag"
        assert_eq!(name.len(), "run_".len() + 19 + ".bag".len());
    }

    #[test]
    fn test_timestamp_ns_to_string_contains_date() {
        // 2021-01-01T00:00:00Z
        let s = timestamp_ns_to_string(1_609_459_200_000_000_000);
        assert!(s.contains("2021") || s.contains("2020-12-31"));
    }
}

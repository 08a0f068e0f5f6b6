//! Dump filename encoding and parsing.
//!
//! The filename is the authoritative index of a dump: both its update time
//! and its format version are recovered from the name alone, and file
//! metadata such as mtime is never consulted. A finished dump is named
//!
//! ```text
//! 2024-01-01T00:00:00.000000-v3
//! ```
//!
//! i.e. a UTC timestamp at microsecond precision followed by the format
//! version. An in-progress write uses the same name with a `.tmp` suffix.

use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Timestamp pattern used in dump filenames (UTC, microsecond precision).
const DUMP_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

static DUMP_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{6})-v(\d+)$")
        .expect("dump filename regex is valid")
});

static TMP_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{6})-v(\d+)\.tmp$")
        .expect("tmp filename regex is valid")
});

/// A dump identified purely by its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDumpName {
    /// The filename the fields were parsed from
    pub filename: String,
    /// Update time encoded in the filename, rounded to filename resolution
    pub update_time: DateTime<Utc>,
    /// Format version encoded in the filename
    pub format_version: u64,
}

/// Round a timestamp to the resolution dump filenames can represent.
///
/// Must be applied to every externally sourced time before it is encoded or
/// compared against a parsed filename, otherwise comparisons near the
/// microsecond boundary disagree with the on-disk representation.
#[must_use]
pub fn round_time(time: DateTime<Utc>) -> DateTime<Utc> {
    time.duration_round(TimeDelta::microseconds(1))
        .unwrap_or(time)
}

/// Format the filename of a finished dump.
#[must_use]
pub fn dump_name(update_time: DateTime<Utc>, format_version: u64) -> String {
    format!(
        "{}-v{}",
        update_time.format(DUMP_TIME_FORMAT),
        format_version
    )
}

/// Parse a dump filename back into its update time and format version.
///
/// Returns `None` for names that are not dump filenames at all. A name that
/// matches the dump pattern but fails timestamp or version parsing is logged
/// as a warning and also yields `None`.
#[must_use]
pub fn parse_dump_name(filename: &str) -> Option<ParsedDumpName> {
    let captures = DUMP_NAME_REGEX.captures(filename)?;

    let update_time = match NaiveDateTime::parse_from_str(&captures[1], DUMP_TIME_FORMAT) {
        Ok(naive) => naive.and_utc(),
        Err(err) => {
            tracing::warn!(
                filename,
                %err,
                "a filename looks like a cache dump, but it is not"
            );
            return None;
        }
    };

    let format_version = match captures[2].parse::<u64>() {
        Ok(version) => version,
        Err(err) => {
            tracing::warn!(
                filename,
                %err,
                "a filename looks like a cache dump, but its version is unparseable"
            );
            return None;
        }
    };

    Some(ParsedDumpName {
        filename: filename.to_owned(),
        update_time: round_time(update_time),
        format_version,
    })
}

/// Whether `filename` is a temporary file left by an in-progress write.
#[must_use]
pub fn is_tmp_name(filename: &str) -> bool {
    TMP_NAME_REGEX.is_match(filename)
}

/// Full path of a dump file inside its directory.
#[must_use]
pub fn dump_path(directory: &Path, filename: &str) -> PathBuf {
    directory.join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn time(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, micros: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap() + TimeDelta::microseconds(micros.into())
    }

    #[test]
    fn test_dump_name_format() {
        let name = dump_name(time(2024, 1, 1, 0, 0, 0, 0), 3);
        assert_eq!(name, "2024-01-01T00:00:00.000000-v3");

        let name = dump_name(time(2015, 3, 22, 9, 0, 27, 123456), 0);
        assert_eq!(name, "2015-03-22T09:00:27.123456-v0");
    }

    #[test]
    fn test_round_trip() {
        for (t, v) in [
            (time(2024, 1, 1, 0, 0, 0, 0), 3),
            (time(1999, 12, 31, 23, 59, 59, 999999), 0),
            (time(2030, 6, 15, 12, 30, 45, 1), u64::MAX),
        ] {
            let parsed = parse_dump_name(&dump_name(t, v)).unwrap();
            assert_eq!(parsed.update_time, t);
            assert_eq!(parsed.format_version, v);
        }
    }

    #[test]
    fn test_round_time_truncates_nanoseconds() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let sub_micro = base + TimeDelta::nanoseconds(123_456_789);
        let rounded = round_time(sub_micro);
        assert_eq!(rounded, base + TimeDelta::microseconds(123_457));
        // Round-tripping through a filename preserves rounded times exactly.
        let parsed = parse_dump_name(&dump_name(rounded, 1)).unwrap();
        assert_eq!(parsed.update_time, rounded);
    }

    #[test]
    fn test_parse_rejects_unrelated_names() {
        for name in [
            "",
            "just-a-file",
            "2024-01-01T00:00:00-v1",
            "2024-01-01T00:00:00.000-v1",
            "2024-01-01T00:00:00.000000-v",
            "2024-01-01T00:00:00.000000-v1x",
            "2024-01-01T00:00:00.000000-v1.tmp",
            "x2024-01-01T00:00:00.000000-v1",
            "2024-01-01 00:00:00.000000-v1",
        ] {
            assert!(parse_dump_name(name).is_none(), "accepted {name:?}");
        }
    }

    #[test]
    fn test_parse_rejects_invalid_timestamp() {
        // Matches the pattern but is not a real date.
        assert!(parse_dump_name("2024-13-41T25:61:61.000000-v1").is_none());
    }

    #[test]
    fn test_parse_rejects_version_overflow() {
        assert!(parse_dump_name("2024-01-01T00:00:00.000000-v99999999999999999999").is_none());
    }

    #[test]
    fn test_is_tmp_name() {
        assert!(is_tmp_name("2024-01-01T00:00:00.000000-v1.tmp"));
        assert!(!is_tmp_name("2024-01-01T00:00:00.000000-v1"));
        assert!(!is_tmp_name("2024-01-01T00:00:00.000000-v1.tmp.tmp"));
        assert!(!is_tmp_name("other.tmp"));
    }

    #[test]
    fn test_dump_path_joins() {
        let path = dump_path(Path::new("/var/dumps"), "2024-01-01T00:00:00.000000-v1");
        assert_eq!(
            path,
            Path::new("/var/dumps/2024-01-01T00:00:00.000000-v1")
        );
    }
}

//! Resolving the configured timezone to a UTC offset.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// The current UTC offset of `canonical_timezone`, e.g.
/// "Pacific/Auckland", or `None` when the name is unknown.
pub(crate) fn local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|timezone| timezone.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

#[cfg(test)]
mod timezone_tests {
    use time::UtcOffset;

    use super::local_offset;

    #[test]
    fn utc_resolves_to_zero_offset() {
        assert_eq!(local_offset("Etc/UTC"), Some(UtcOffset::UTC));
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        assert_eq!(local_offset("Atlantis/Central"), None);
    }
}

//! Timezone normalisation for date-only filter values (spec.md §4.4).
//!
//! A date-only string like `"2026-06-15"` means "the caller's local calendar
//! day", so before it reaches SQL it must become a `[start, end)` UTC bound.
//! The offset is computed against the *specific* date (via `chrono-tz`) so
//! DST transitions land correctly, never a single fixed offset applied
//! blindly across the year.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// The timezone to normalise date-only filter values against, per spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimezoneConfig {
    /// An IANA timezone name, e.g. `"America/Los_Angeles"`.
    Named(Tz),
    /// A fixed UTC offset in seconds, independent of DST.
    FixedOffsetSeconds(i32),
    /// No normalisation: dates are treated as already UTC.
    Utc,
}

impl TimezoneConfig {
    /// Parses the `utc`/`system`/IANA-name/offset forms spec.md §6 allows.
    /// `"system"` resolves to UTC here — the engine has no notion of "the
    /// host's local timezone" independent of an explicit configuration.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "utc" | "UTC" | "system" => Some(Self::Utc),
            other => {
                if let Ok(tz) = other.parse::<Tz>() {
                    return Some(Self::Named(tz));
                }
                parse_fixed_offset(other).map(Self::FixedOffsetSeconds)
            }
        }
    }

    /// Returns the `[start, end)` UTC instants covering the given local
    /// calendar day, computed against that specific date so DST transitions
    /// are respected (spec.md §4.4, §8 scenario: `2026-06-15` at `-0700`
    /// must cover up to `2026-06-16T06:30:00Z` et al.).
    pub fn local_day_bounds_utc(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let next = date.succ_opt().unwrap_or(date);
        match self {
            Self::Utc => {
                let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
                let end = next.and_hms_opt(0, 0, 0).unwrap().and_utc();
                (start, end)
            }
            Self::Named(tz) => {
                let start = tz
                    .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
                    .earliest()
                    .unwrap_or_else(|| tz.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()))
                    .with_timezone(&Utc);
                let end = tz
                    .from_local_datetime(&next.and_hms_opt(0, 0, 0).unwrap())
                    .earliest()
                    .unwrap_or_else(|| tz.from_utc_datetime(&next.and_hms_opt(0, 0, 0).unwrap()))
                    .with_timezone(&Utc);
                (start, end)
            }
            Self::FixedOffsetSeconds(offset) => {
                let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc()
                    - chrono::Duration::seconds(*offset as i64);
                let end = next.and_hms_opt(0, 0, 0).unwrap().and_utc()
                    - chrono::Duration::seconds(*offset as i64);
                (start, end)
            }
        }
    }
}

fn parse_fixed_offset(raw: &str) -> Option<i32> {
    // Accepts "+0700", "-0700", "+07:00", "-07:00".
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    Some(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_offset_day_boundary_matches_scenario() {
        // spec.md §8: date-only eq "2026-06-15" at local -0700 covers the
        // instant 2026-06-16T06:30:00Z (23:30 local June 15).
        let tz = TimezoneConfig::parse("-0700").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let (start, end) = tz.local_day_bounds_utc(date);
        let probe: DateTime<Utc> = "2026-06-16T06:30:00Z".parse().unwrap();
        assert!(probe >= start && probe < end);
    }

    #[test]
    fn named_timezone_respects_dst() {
        // Los Angeles DST (PDT, -0700) is in effect in June; the computed
        // UTC start must reflect -0700, not the winter -0800 offset.
        let tz = TimezoneConfig::parse("America/Los_Angeles").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let (start, _end) = tz.local_day_bounds_utc(date);
        let expected: DateTime<Utc> = "2026-06-15T07:00:00Z".parse().unwrap();
        assert_eq!(start, expected);
    }

    #[test]
    fn utc_mode_is_identity() {
        let tz = TimezoneConfig::Utc;
        let date = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        let (start, end) = tz.local_day_bounds_utc(date);
        assert_eq!(start.format("%H:%M:%S").to_string(), "00:00:00");
        assert_eq!((end - start).num_hours(), 24);
    }
}

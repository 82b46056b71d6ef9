//! Virtual clock and period arithmetic.

use chrono::{Duration, NaiveDateTime};
use hearth_env::{EnvError, EnvResult};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// The simulated "now". Only moves forward, and only when told to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualClock {
    now: NaiveDateTime,
}

impl VirtualClock {
    /// Creates a clock reading `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self { now: start }
    }

    /// Returns the current instant.
    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Validates a move to `target`.
    ///
    /// Returns `Ok(false)` when `target` is the current instant (nothing to do)
    /// and an error when it lies in the past.
    pub fn check_target(&self, target: NaiveDateTime) -> EnvResult<bool> {
        if target < self.now {
            return Err(EnvError::TimeTravel {
                from: self.now,
                to: target,
            });
        }
        Ok(target > self.now)
    }

    /// Moves the clock to `target` unless a nested advance already went further.
    pub fn settle(&mut self, target: NaiveDateTime) {
        if target > self.now {
            self.now = target;
        }
    }
}

/// Converts a duration to nanoseconds without the `i64` overflow of
/// `Duration::num_nanoseconds`.
pub fn duration_nanos(d: Duration) -> i128 {
    i128::from(d.num_seconds()) * NANOS_PER_SEC + i128::from(d.subsec_nanos())
}

fn duration_from_nanos(nanos: i128) -> Option<Duration> {
    let secs = i64::try_from(nanos.div_euclid(NANOS_PER_SEC)).ok()?;
    let rem = i64::try_from(nanos.rem_euclid(NANOS_PER_SEC)).ok()?;
    Duration::try_seconds(secs)?.checked_add(&Duration::nanoseconds(rem))
}

/// Returns the first instant of the series `start + n * period` (n >= 0)
/// that is at or after `bound`.
///
/// `period` must be positive. Returns `None` if the result is not representable.
pub fn first_at_or_after(
    start: NaiveDateTime,
    period: Duration,
    bound: NaiveDateTime,
) -> Option<NaiveDateTime> {
    if start >= bound {
        return Some(start);
    }
    let gap = duration_nanos(bound - start);
    let step = duration_nanos(period);
    // ceil(gap / step) for positive operands
    let periods = (gap + step - 1) / step;
    start.checked_add_signed(duration_from_nanos(periods * step)?)
}

/// Parses an instant given on the command line.
///
/// Accepts `2024-01-01T08:30:00`, `2024-01-01 08:30:00` and `2024-01-01`.
pub fn parse_instant(raw: &str) -> EnvResult<NaiveDateTime> {
    const FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
    for format in FORMATS {
        if let Ok(instant) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(instant);
        }
    }
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| EnvError::invalid(format!("unrecognised instant: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2000, 5, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_clock_rejects_past() {
        let clock = VirtualClock::new(at(12, 0, 0));
        let err = clock.check_target(at(11, 0, 0)).unwrap_err();
        assert!(matches!(err, EnvError::TimeTravel { .. }));
    }

    #[test]
    fn test_clock_same_instant_is_noop() {
        let clock = VirtualClock::new(at(12, 0, 0));
        assert!(!clock.check_target(at(12, 0, 0)).unwrap());
        assert!(clock.check_target(at(12, 0, 1)).unwrap());
    }

    #[test]
    fn test_clock_settle_never_rewinds() {
        let mut clock = VirtualClock::new(at(12, 0, 0));
        clock.settle(at(12, 30, 0));
        clock.settle(at(12, 10, 0));
        assert_eq!(clock.now(), at(12, 30, 0));
    }

    #[test]
    fn test_first_at_or_after() {
        let start = at(12, 9, 30);
        let minute = Duration::seconds(60);

        assert_eq!(first_at_or_after(start, minute, at(12, 0, 0)), Some(start));
        assert_eq!(first_at_or_after(start, minute, at(12, 9, 30)), Some(start));
        assert_eq!(first_at_or_after(start, minute, at(12, 9, 31)), Some(at(12, 10, 30)));
        assert_eq!(first_at_or_after(start, minute, at(12, 10, 30)), Some(at(12, 10, 30)));
        assert_eq!(first_at_or_after(start, minute, at(13, 0, 0)), Some(at(13, 0, 30)));
    }

    #[test]
    fn test_first_at_or_after_sub_second_period() {
        let start = at(12, 0, 0);
        let period = Duration::milliseconds(250);
        let expected = start + Duration::milliseconds(1250);
        assert_eq!(
            first_at_or_after(start, period, start + Duration::milliseconds(1001)),
            Some(expected)
        );
    }

    #[test]
    fn test_duration_nanos() {
        assert_eq!(duration_nanos(Duration::milliseconds(1500)), 1_500_000_000);
        assert_eq!(duration_nanos(Duration::milliseconds(-1500)), -1_500_000_000);
    }

    #[test]
    fn test_parse_instant() {
        assert_eq!(parse_instant("2000-05-10T12:09:30").unwrap(), at(12, 9, 30));
        assert_eq!(parse_instant("2000-05-10 12:09:30").unwrap(), at(12, 9, 30));
        assert_eq!(parse_instant("2000-05-10").unwrap(), at(0, 0, 0));
        assert!(parse_instant("noon").is_err());
    }
}

use crate::error::{UptimeError, UptimeResult};
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::num::NonZeroU32;

pub const BUCKET_SECONDS: i64 = 30 * 60;

pub const BUCKET_STEP: NonZeroU32 = match NonZeroU32::new(BUCKET_SECONDS as u32) {
    Some(step) => step,
    None => panic!("bucket step must be non-zero"),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Splits `[start, end]` into contiguous windows of `step` seconds, clamping the
/// last window's end to `end`. A zero-width range still yields one window.
pub fn generate_buckets(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: NonZeroU32,
) -> UptimeResult<Vec<TimeBucket>> {
    if end < start {
        return Err(UptimeError::InvalidRange { start, end });
    }

    let step = ChronoDuration::seconds(i64::from(step.get()));
    let mut buckets = Vec::new();
    let mut cursor = start;
    loop {
        let next = cursor + step;
        if next >= end {
            buckets.push(TimeBucket { start: cursor, end });
            break;
        }
        buckets.push(TimeBucket {
            start: cursor,
            end: next,
        });
        cursor = next;
    }

    Ok(buckets)
}

/// Every window start and end, ordered and without duplicates.
pub fn boundary_timestamps(buckets: &[TimeBucket]) -> Vec<DateTime<Utc>> {
    let mut boundaries: Vec<DateTime<Utc>> = buckets
        .iter()
        .flat_map(|bucket| [bucket.start, bucket.end])
        .collect();
    boundaries.sort();
    boundaries.dedup();
    boundaries
}

/// Minutes 0..=30 snap to the top of the hour, 31..=59 to the half hour.
/// Minute 30 belongs to the hour-start window, so a half-hour output
/// normalizes again to the top of the hour.
pub fn normalize_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    let minute = if ts.minute() <= 30 { 0 } else { 30 };
    ts.date_naive()
        .and_hms_opt(ts.hour(), minute, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_generate_buckets_clamps_last_window() {
        let buckets = generate_buckets(at(0, 0, 0), at(1, 10, 0), BUCKET_STEP).unwrap();
        assert_eq!(
            buckets,
            vec![
                TimeBucket {
                    start: at(0, 0, 0),
                    end: at(0, 30, 0),
                },
                TimeBucket {
                    start: at(0, 30, 0),
                    end: at(1, 0, 0),
                },
                TimeBucket {
                    start: at(1, 0, 0),
                    end: at(1, 10, 0),
                },
            ]
        );
    }

    #[test]
    fn test_generate_buckets_aligned_end_has_no_empty_tail() {
        let buckets = generate_buckets(at(0, 0, 0), at(2, 0, 0), BUCKET_STEP).unwrap();
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets.last().map(|b| b.end), Some(at(2, 0, 0)));
        assert!(buckets.iter().all(|b| b.end - b.start == ChronoDuration::minutes(30)));
    }

    #[test]
    fn test_generate_buckets_windows_are_contiguous_and_cover_range() {
        let start = at(3, 30, 0);
        let end = at(9, 47, 13);
        let buckets = generate_buckets(start, end, BUCKET_STEP).unwrap();
        assert_eq!(buckets.first().map(|b| b.start), Some(start));
        assert_eq!(buckets.last().map(|b| b.end), Some(end));
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[0].end);
        }
        assert!(buckets.iter().all(|b| b.end <= end));
    }

    #[test]
    fn test_generate_buckets_single_instant() {
        let instant = at(5, 0, 0);
        let buckets = generate_buckets(instant, instant, BUCKET_STEP).unwrap();
        assert_eq!(
            buckets,
            vec![TimeBucket {
                start: instant,
                end: instant,
            }]
        );
    }

    #[test]
    fn test_generate_buckets_rejects_inverted_range() {
        let err = generate_buckets(at(2, 0, 0), at(1, 0, 0), BUCKET_STEP).unwrap_err();
        assert!(matches!(err, UptimeError::InvalidRange { .. }));
    }

    #[test]
    fn test_boundary_timestamps_shares_adjacent_edges() {
        let buckets = generate_buckets(at(0, 0, 0), at(1, 10, 0), BUCKET_STEP).unwrap();
        assert_eq!(
            boundary_timestamps(&buckets),
            vec![at(0, 0, 0), at(0, 30, 0), at(1, 0, 0), at(1, 10, 0)]
        );
    }

    #[test]
    fn test_normalize_timestamp_minute_thirty_snaps_to_hour() {
        assert_eq!(normalize_timestamp(at(4, 0, 0)), at(4, 0, 0));
        assert_eq!(normalize_timestamp(at(4, 17, 42)), at(4, 0, 0));
        assert_eq!(normalize_timestamp(at(4, 30, 0)), at(4, 0, 0));
        assert_eq!(normalize_timestamp(at(4, 30, 59)), at(4, 0, 0));
        assert_eq!(normalize_timestamp(at(4, 31, 0)), at(4, 30, 0));
        assert_eq!(normalize_timestamp(at(4, 59, 59)), at(4, 30, 0));
    }

    #[test]
    fn test_normalize_timestamp_drops_subseconds() {
        let ts = at(7, 44, 9) + ChronoDuration::milliseconds(250);
        assert_eq!(normalize_timestamp(ts), at(7, 30, 0));
        assert_eq!(normalize_timestamp(at(7, 12, 0) + ChronoDuration::milliseconds(5)), at(7, 0, 0));
    }

    #[test]
    fn test_normalize_timestamp_stable_except_at_minute_thirty() {
        for minute in (0..60).filter(|minute| *minute != 30) {
            let once = normalize_timestamp(at(11, minute, 15));
            assert_eq!(normalize_timestamp(once), once, "minute {minute}");
        }

        // a half-hour output falls back to the top of the hour on a second pass
        let half = normalize_timestamp(at(11, 45, 0));
        assert_eq!(half, at(11, 30, 0));
        assert_eq!(normalize_timestamp(half), at(11, 0, 0));
        assert_eq!(normalize_timestamp(at(11, 30, 0)), at(11, 0, 0));
    }
}

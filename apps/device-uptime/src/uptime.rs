//! Grid-based uptime aggregation.
//!
//! A computation over `[start, end]` runs in four steps:
//! 1. split the range into 30-minute windows (`buckets`)
//! 2. snap each raw reading onto its window start (`normalize_timestamp`)
//! 3. count readings per (device, window) and complete the device × boundary
//!    grid with zero rows (`aggregate`)
//! 4. turn every row's count into an uptime/downtime pair (`calculator`)

mod aggregate;
mod buckets;
mod calculator;
mod types;


pub use aggregate::{dedupe_readings, expected_grid, group_readings, BucketAggregator};
pub use buckets::{
    boundary_timestamps, generate_buckets, normalize_timestamp, TimeBucket, BUCKET_SECONDS,
    BUCKET_STEP,
};
pub use calculator::{UptimeCalculator, UptimeSplit};
pub use types::{
    ChannelUptime, Device, DeviceBucketRecord, DeviceUptimeRecord, DeviceUptimeSummary,
    ExpectedGridCell, NetworkUptimeRecord, Percent, RawReading, UptimeReport,
};

use crate::error::{UptimeError, UptimeResult};
use chrono::{DateTime, Utc};
use std::num::NonZeroU32;

/// Computes the uptime report for `devices` over `[start, end]` from readings
/// already loaded for that range.
///
/// The range is validated as given, then `start` is snapped to its window
/// start so the grid lines up with the normalized readings. The report's
/// `start_date_time` is the snapped value.
pub fn compute_report(
    devices: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    threshold: NonZeroU32,
    readings: &[RawReading],
) -> UptimeResult<UptimeReport> {
    if end < start {
        return Err(UptimeError::InvalidRange { start, end });
    }
    let start = normalize_timestamp(start);
    let buckets = generate_buckets(start, end, BUCKET_STEP)?;
    let aggregator = BucketAggregator::new(UptimeCalculator::new(threshold));
    let records = aggregator.aggregate(devices, &buckets, readings)?;
    Ok(UptimeReport::from_records(start, end, records))
}

use super::buckets::{boundary_timestamps, normalize_timestamp, TimeBucket};
use super::calculator::UptimeCalculator;
use super::types::{DeviceBucketRecord, DeviceUptimeRecord, ExpectedGridCell, RawReading};
use crate::error::{UptimeError, UptimeResult};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
pub struct BucketAggregator {
    calculator: UptimeCalculator,
}

impl BucketAggregator {
    pub fn new(calculator: UptimeCalculator) -> Self {
        Self { calculator }
    }

    /// Builds the full device × boundary table for `buckets`, one row per
    /// expected cell, with observed counts where readings exist.
    pub fn aggregate(
        &self,
        devices: &[String],
        buckets: &[TimeBucket],
        readings: &[RawReading],
    ) -> UptimeResult<Vec<DeviceUptimeRecord>> {
        let boundaries = boundary_timestamps(buckets);
        let grid = expected_grid(devices, &boundaries);

        let mut index: HashMap<(&str, DateTime<Utc>), usize> = HashMap::with_capacity(grid.len());
        let mut rows: Vec<DeviceBucketRecord> = Vec::with_capacity(grid.len());
        for cell in &grid {
            let key = (cell.device.as_str(), cell.timestamp);
            if index.contains_key(&key) {
                continue;
            }
            index.insert(key, rows.len());
            rows.push(DeviceBucketRecord::empty(&cell.device, cell.timestamp));
        }

        let deduped = dedupe_readings(readings);
        let mut unmatched = 0usize;
        for group in group_readings(&deduped)? {
            let slot = index.get(&(group.device.as_str(), group.timestamp)).copied();
            match slot {
                Some(slot) => rows[slot] = group,
                None => unmatched += 1,
            }
        }
        if unmatched > 0 {
            tracing::debug!(unmatched, "dropped reading groups outside the expected grid");
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let split = self.calculator.calculate(row.data_points);
                DeviceUptimeRecord {
                    device: row.device,
                    timestamp: row.timestamp,
                    data_points: row.data_points,
                    average_battery: row.average_battery,
                    uptime: split.uptime,
                    downtime: split.downtime,
                }
            })
            .collect())
    }
}

/// Cross product of `devices` and `boundaries`, without duplicate cells.
pub fn expected_grid(devices: &[String], boundaries: &[DateTime<Utc>]) -> Vec<ExpectedGridCell> {
    let mut seen: HashSet<(&str, DateTime<Utc>)> = HashSet::new();
    let mut grid = Vec::with_capacity(devices.len() * boundaries.len());
    for device in devices {
        for timestamp in boundaries {
            if seen.insert((device.as_str(), *timestamp)) {
                grid.push(ExpectedGridCell {
                    device: device.clone(),
                    timestamp: *timestamp,
                });
            }
        }
    }
    grid
}

/// Keeps the first reading for each (timestamp, device) pair.
pub fn dedupe_readings(readings: &[RawReading]) -> Vec<&RawReading> {
    let mut seen: HashSet<(DateTime<Utc>, &str)> = HashSet::with_capacity(readings.len());
    readings
        .iter()
        .filter(|&reading| seen.insert((reading.timestamp, reading.device.as_str())))
        .collect()
}

/// Groups readings by device and normalized timestamp.
pub fn group_readings(readings: &[&RawReading]) -> UptimeResult<Vec<DeviceBucketRecord>> {
    let mut groups: BTreeMap<(&str, DateTime<Utc>), Vec<&RawReading>> = BTreeMap::new();
    for &reading in readings {
        groups
            .entry((reading.device.as_str(), normalize_timestamp(reading.timestamp)))
            .or_default()
            .push(reading);
    }

    groups
        .into_iter()
        .map(|((device, timestamp), members)| {
            if members.is_empty() {
                return Err(UptimeError::EmptyGroup {
                    device: device.to_string(),
                    timestamp,
                });
            }
            let batteries: Vec<f64> = members
                .iter()
                .filter_map(|reading| reading.battery)
                .filter(|value| value.is_finite())
                .collect();
            Ok(DeviceBucketRecord {
                device: device.to_string(),
                timestamp,
                data_points: members.len() as u32,
                average_battery: mean(&batteries).unwrap_or(0.0),
            })
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

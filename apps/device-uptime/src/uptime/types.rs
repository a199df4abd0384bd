use chrono::{DateTime, Utc};
use serde::Serialize;

/// Percentage clamped to `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize)]
#[serde(transparent)]
pub struct Percent(f64);

impl Percent {
    pub const ZERO: Percent = Percent(0.0);
    pub const FULL: Percent = Percent(100.0);

    pub fn new(value: f64) -> Self {
        if !value.is_finite() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 100.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn complement(self) -> Self {
        Self(100.0 - self.0)
    }
}

/// Registry view of a monitoring device. Identifiers are optional on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub name: Option<String>,
    pub channel_id: Option<i64>,
    pub network: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawReading {
    pub timestamp: DateTime<Utc>,
    pub device: String,
    pub battery: Option<f64>,
    pub sensor_one_pm2_5: Option<f64>,
    pub sensor_two_pm2_5: Option<f64>,
}

/// One (device, normalized timestamp) group of raw readings, before grid completion.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceBucketRecord {
    pub device: String,
    pub timestamp: DateTime<Utc>,
    pub data_points: u32,
    pub average_battery: f64,
}

impl DeviceBucketRecord {
    pub(crate) fn empty(device: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            device: device.to_string(),
            timestamp,
            data_points: 0,
            average_battery: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpectedGridCell {
    pub device: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceUptimeRecord {
    pub device: String,
    pub timestamp: DateTime<Utc>,
    pub data_points: u32,
    pub average_battery: f64,
    pub uptime: Percent,
    pub downtime: Percent,
}

/// Result of one grid computation over a time range.
#[derive(Debug, Clone, Serialize)]
pub struct UptimeReport {
    pub overall_uptime: Percent,
    pub overall_downtime: Percent,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub devices_uptime: Vec<DeviceUptimeRecord>,
}

impl UptimeReport {
    pub fn from_records(
        start_date_time: DateTime<Utc>,
        end_date_time: DateTime<Utc>,
        devices_uptime: Vec<DeviceUptimeRecord>,
    ) -> Self {
        let (overall_uptime, overall_downtime) = if devices_uptime.is_empty() {
            (Percent::ZERO, Percent::FULL)
        } else {
            let rows = devices_uptime.len() as f64;
            let uptime: f64 = devices_uptime.iter().map(|r| r.uptime.value()).sum();
            let downtime: f64 = devices_uptime.iter().map(|r| r.downtime.value()).sum();
            (Percent::new(uptime / rows), Percent::new(downtime / rows))
        };

        Self {
            overall_uptime,
            overall_downtime,
            start_date_time,
            end_date_time,
            devices_uptime,
        }
    }
}

/// Latest per-channel snapshot returned by a channel uptime provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelUptime {
    pub sensor_one_pm2_5: Option<f64>,
    pub sensor_two_pm2_5: Option<f64>,
    pub battery_voltage: Option<f64>,
    pub uptime: Percent,
    pub downtime: Percent,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceUptimeSummary {
    pub device_name: String,
    pub channel_id: i64,
    pub sensor_one_pm2_5: f64,
    pub sensor_two_pm2_5: f64,
    pub battery_voltage: f64,
    pub uptime: Percent,
    pub downtime: Percent,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl DeviceUptimeSummary {
    pub fn from_channel(
        device_name: &str,
        channel_id: i64,
        is_active: bool,
        channel: ChannelUptime,
    ) -> Self {
        Self {
            device_name: device_name.to_string(),
            channel_id,
            sensor_one_pm2_5: channel.sensor_one_pm2_5.unwrap_or(0.0),
            sensor_two_pm2_5: channel.sensor_two_pm2_5.unwrap_or(0.0),
            battery_voltage: channel.battery_voltage.unwrap_or(0.0),
            uptime: channel.uptime,
            downtime: channel.downtime,
            created_at: channel.timestamp,
            is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkUptimeRecord {
    pub network_name: String,
    pub uptime: Percent,
    pub created_at: DateTime<Utc>,
}

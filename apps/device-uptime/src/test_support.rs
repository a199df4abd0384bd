use crate::config::Config;
use crate::sources::{ChannelUptimeProvider, DeviceRegistry, RawReadingsSource, UptimeSink};
use crate::uptime::{
    ChannelUptime, Device, DeviceUptimeSummary, NetworkUptimeRecord, Percent, RawReading,
    UptimeReport,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;

pub fn test_config() -> Config {
    Config {
        database_url: "postgresql://postgres@localhost/postgres".to_string(),
        db_pool_size: 2,
        registry_url: "http://127.0.0.1:9/api/v1".to_string(),
        tenant: "airqo".to_string(),
        network: "airqo".to_string(),
        expected_data_points: NonZeroU32::new(3).unwrap(),
        lookback_hours: 2,
        channel_window_minutes: 60,
        worker_count: 4,
        run_interval_seconds: 3600,
        otlp_endpoint: None,
    }
}

pub fn ts(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

pub fn device(name: &str, channel_id: i64, network: &str, is_active: bool) -> Device {
    Device {
        name: Some(name.to_string()),
        channel_id: Some(channel_id),
        network: Some(network.to_string()),
        is_active,
    }
}

#[derive(Default)]
pub struct MemoryRegistry {
    pub devices: Vec<Device>,
    pub fail: bool,
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn list_devices(&self, _tenant: &str, _network: &str) -> Result<Vec<Device>> {
        if self.fail {
            return Err(anyhow!("registry unavailable"));
        }
        Ok(self.devices.clone())
    }
}

#[derive(Default)]
pub struct MemoryReadings {
    pub readings: Vec<RawReading>,
    pub fail: bool,
    pub requests: Mutex<Vec<(Vec<String>, DateTime<Utc>, DateTime<Utc>)>>,
}

impl MemoryReadings {
    pub fn new(readings: Vec<RawReading>) -> Self {
        Self {
            readings,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<(Vec<String>, DateTime<Utc>, DateTime<Utc>)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RawReadingsSource for MemoryReadings {
    async fn fetch_readings(
        &self,
        devices: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawReading>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((devices.to_vec(), start, end));
        }
        if self.fail {
            return Err(anyhow!("raw readings store unavailable"));
        }
        Ok(self
            .readings
            .iter()
            .filter(|r| devices.contains(&r.device))
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .filter(|r| r.sensor_one_pm2_5.is_some() || r.sensor_two_pm2_5.is_some())
            .cloned()
            .collect())
    }
}

/// Channel uptime keyed by device name; devices without an entry fail.
#[derive(Default)]
pub struct MemoryChannels {
    pub uptime: HashMap<String, f64>,
}

impl MemoryChannels {
    pub fn with(entries: &[(&str, f64)]) -> Self {
        Self {
            uptime: entries
                .iter()
                .map(|(name, uptime)| (name.to_string(), *uptime))
                .collect(),
        }
    }
}

#[async_trait]
impl ChannelUptimeProvider for MemoryChannels {
    async fn channel_uptime(
        &self,
        _tenant: &str,
        channel_id: i64,
        device_name: &str,
    ) -> Result<ChannelUptime> {
        let uptime = self
            .uptime
            .get(device_name)
            .copied()
            .ok_or_else(|| anyhow!("channel {channel_id} unreachable"))?;
        let uptime = Percent::new(uptime);
        Ok(ChannelUptime {
            sensor_one_pm2_5: Some(14.2),
            sensor_two_pm2_5: None,
            battery_voltage: Some(3.9),
            uptime,
            downtime: uptime.complement(),
            timestamp: ts(9, 0),
        })
    }
}

#[derive(Default)]
pub struct MemorySink {
    fail: bool,
    devices: Mutex<Vec<DeviceUptimeSummary>>,
    networks: Mutex<Vec<NetworkUptimeRecord>>,
    reports: Mutex<Vec<UptimeReport>>,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn device_records(&self) -> Vec<DeviceUptimeSummary> {
        self.devices.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn network_records(&self) -> Vec<NetworkUptimeRecord> {
        self.networks.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn reports(&self) -> Vec<UptimeReport> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UptimeSink for MemorySink {
    async fn save_device_uptime(&self, _tenant: &str, records: &[DeviceUptimeSummary]) -> Result<()> {
        if self.fail {
            return Err(anyhow!("sink rejected device uptime"));
        }
        if let Ok(mut devices) = self.devices.lock() {
            devices.extend_from_slice(records);
        }
        Ok(())
    }

    async fn save_network_uptime(&self, records: &[NetworkUptimeRecord]) -> Result<()> {
        if self.fail {
            return Err(anyhow!("sink rejected network uptime"));
        }
        if let Ok(mut networks) = self.networks.lock() {
            networks.extend_from_slice(records);
        }
        Ok(())
    }

    async fn save_bucket_uptime(&self, report: &UptimeReport) -> Result<()> {
        if self.fail {
            return Err(anyhow!("sink rejected bucket uptime"));
        }
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
        Ok(())
    }
}

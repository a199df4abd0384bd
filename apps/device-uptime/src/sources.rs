use crate::uptime::{
    ChannelUptime, Device, DeviceUptimeSummary, NetworkUptimeRecord, RawReading, UptimeReport,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn list_devices(&self, tenant: &str, network: &str) -> Result<Vec<Device>>;
}

/// Tabular store of raw per-device readings.
#[async_trait]
pub trait RawReadingsSource: Send + Sync {
    /// Rows for `devices` with `start <= timestamp <= end` where at least one
    /// PM2.5 channel is non-null.
    async fn fetch_readings(
        &self,
        devices: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawReading>>;
}

#[async_trait]
pub trait ChannelUptimeProvider: Send + Sync {
    async fn channel_uptime(
        &self,
        tenant: &str,
        channel_id: i64,
        device_name: &str,
    ) -> Result<ChannelUptime>;
}

/// Append-only destination for computed records.
#[async_trait]
pub trait UptimeSink: Send + Sync {
    async fn save_device_uptime(&self, tenant: &str, records: &[DeviceUptimeSummary]) -> Result<()>;
    async fn save_network_uptime(&self, records: &[NetworkUptimeRecord]) -> Result<()>;
    async fn save_bucket_uptime(&self, report: &UptimeReport) -> Result<()>;
}

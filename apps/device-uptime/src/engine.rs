use crate::collector::{ConcurrentCollector, DeviceTarget};
use crate::config::Config;
use crate::error::{UptimeError, UptimeResult};
use crate::network::NetworkAggregator;
use crate::sources::{ChannelUptimeProvider, DeviceRegistry, RawReadingsSource, UptimeSink};
use crate::uptime::{
    compute_report, normalize_timestamp, Device, DeviceUptimeSummary, NetworkUptimeRecord,
    UptimeReport,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Optional overrides for one grid computation; unset fields fall back to
/// configuration and the registry.
#[derive(Debug, Clone, Default)]
pub struct UptimeRequest {
    pub expected_data_points: Option<NonZeroU32>,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
    pub devices: Option<Vec<String>>,
}

#[derive(Debug, Default)]
pub struct TargetPlan {
    pub targets: Vec<DeviceTarget>,
    pub active_device_count: usize,
    pub skipped: Vec<UptimeError>,
}

/// Picks the fetchable devices of `network`.
///
/// Active devices are counted before identifiers are checked, so a device
/// skipped for a missing name or channel still counts toward the network
/// divisor.
pub fn plan_targets(devices: &[Device], network: &str) -> TargetPlan {
    let mut plan = TargetPlan::default();
    for device in devices {
        if device.network.as_deref() != Some(network) {
            continue;
        }
        if device.is_active {
            plan.active_device_count += 1;
        }

        match (device.name.as_deref(), device.channel_id) {
            (Some(name), Some(channel_id)) => plan.targets.push(DeviceTarget {
                name: name.to_string(),
                channel_id,
                is_active: device.is_active,
            }),
            (name, channel_id) => plan.skipped.push(UptimeError::Configuration {
                device: name.unwrap_or("<unnamed>").to_string(),
                reason: match channel_id {
                    None => "missing channel id".to_string(),
                    Some(_) => "missing device name".to_string(),
                },
            }),
        }
    }
    plan
}

pub struct UptimeEngine {
    registry: Arc<dyn DeviceRegistry>,
    readings: Arc<dyn RawReadingsSource>,
    channels: Arc<dyn ChannelUptimeProvider>,
    sink: Arc<dyn UptimeSink>,
    collector: ConcurrentCollector,
    tenant: String,
    network: String,
    expected_data_points: NonZeroU32,
    lookback: ChronoDuration,
}

impl UptimeEngine {
    pub fn new(
        config: &Config,
        registry: Arc<dyn DeviceRegistry>,
        readings: Arc<dyn RawReadingsSource>,
        channels: Arc<dyn ChannelUptimeProvider>,
        sink: Arc<dyn UptimeSink>,
    ) -> Self {
        Self {
            registry,
            readings,
            channels,
            sink,
            collector: ConcurrentCollector::new(config.worker_count),
            tenant: config.tenant.clone(),
            network: config.network.clone(),
            expected_data_points: config.expected_data_points,
            lookback: config.lookback(),
        }
    }

    async fn registry_devices(&self) -> UptimeResult<Vec<Device>> {
        self.registry
            .list_devices(&self.tenant, &self.network)
            .await
            .map_err(UptimeError::Registry)
    }

    /// Grid computation over `request`'s range, without persisting.
    ///
    /// The range is checked before `start` is snapped to its window, so a
    /// supplied `00:30` start covers readings from `00:00`.
    pub async fn compute_device_uptime(&self, request: UptimeRequest) -> UptimeResult<UptimeReport> {
        let end = request.end_date_time.unwrap_or_else(Utc::now);
        let start = request.start_date_time.unwrap_or(end - self.lookback);
        if end < start {
            return Err(UptimeError::InvalidRange { start, end });
        }
        let window_start = normalize_timestamp(start);
        let threshold = request
            .expected_data_points
            .unwrap_or(self.expected_data_points);

        let devices = match request.devices {
            Some(devices) => devices,
            None => self
                .registry_devices()
                .await?
                .into_iter()
                .filter(|device| device.is_active)
                .filter(|device| device.network.as_deref() == Some(self.network.as_str()))
                .filter_map(|device| device.name)
                .collect(),
        };

        let readings = self
            .readings
            .fetch_readings(&devices, window_start, end)
            .await
            .map_err(UptimeError::Store)?;

        let report = compute_report(&devices, start, end, threshold, &readings)?;
        tracing::info!(
            devices = devices.len(),
            readings = readings.len(),
            rows = report.devices_uptime.len(),
            overall_uptime = report.overall_uptime.value(),
            overall_downtime = report.overall_downtime.value(),
            start = %report.start_date_time,
            %end,
            "computed device uptime"
        );
        Ok(report)
    }

    pub async fn compute_and_save_device_uptime(
        &self,
        request: UptimeRequest,
    ) -> UptimeResult<UptimeReport> {
        let report = self.compute_device_uptime(request).await?;
        self.sink
            .save_bucket_uptime(&report)
            .await
            .map_err(UptimeError::Persistence)?;
        Ok(report)
    }

    /// Fetches every device's channel uptime, then stores the device
    /// summaries and the network roll-up.
    pub async fn save_device_uptime(&self) -> UptimeResult<NetworkUptimeRecord> {
        let devices = self.registry_devices().await?;
        let plan = plan_targets(&devices, &self.network);
        for skipped in &plan.skipped {
            tracing::warn!(error = %skipped, "this device could not be processed");
        }

        let channels = self.channels.clone();
        let tenant = self.tenant.clone();
        let records: Vec<DeviceUptimeSummary> = self
            .collector
            .collect(plan.targets, move |target| {
                let channels = channels.clone();
                let tenant = tenant.clone();
                async move {
                    let channel = channels
                        .channel_uptime(&tenant, target.channel_id, &target.name)
                        .await
                        .map_err(|err| UptimeError::upstream(target.name.clone(), err))?;
                    Ok(DeviceUptimeSummary::from_channel(
                        &target.name,
                        target.channel_id,
                        target.is_active,
                        channel,
                    ))
                }
            })
            .await;

        let aggregator = NetworkAggregator::new(self.tenant.clone());
        let network_record = aggregator.aggregate(&records, plan.active_device_count);
        aggregator
            .persist(self.sink.as_ref(), &records, &network_record)
            .await?;

        tracing::info!(
            network = %network_record.network_name,
            uptime = network_record.uptime.value(),
            devices = records.len(),
            active_devices = plan.active_device_count,
            skipped = plan.skipped.len(),
            "saved network uptime"
        );
        Ok(network_record)
    }
}

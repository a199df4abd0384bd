use crate::error::{UptimeError, UptimeResult};
use crate::sources::UptimeSink;
use crate::uptime::{DeviceUptimeSummary, NetworkUptimeRecord, Percent};
use chrono::{DateTime, Utc};

/// Rolls per-device summaries into one network figure.
///
/// The divisor is the active-device count taken from the registry before any
/// fetch ran, not the number of active records that came back. When active
/// devices fail to fetch, their missing uptime counts as zero.
#[derive(Debug, Clone)]
pub struct NetworkAggregator {
    network_name: String,
}

impl NetworkAggregator {
    pub fn new(network_name: impl Into<String>) -> Self {
        Self {
            network_name: network_name.into(),
        }
    }

    pub fn network_uptime(records: &[DeviceUptimeSummary], active_device_count: usize) -> Percent {
        if records.is_empty() || active_device_count == 0 {
            return Percent::ZERO;
        }
        let active_total: f64 = records
            .iter()
            .filter(|record| record.is_active)
            .map(|record| record.uptime.value())
            .sum();
        Percent::new(active_total / active_device_count as f64)
    }

    pub fn aggregate_at(
        &self,
        records: &[DeviceUptimeSummary],
        active_device_count: usize,
        created_at: DateTime<Utc>,
    ) -> NetworkUptimeRecord {
        NetworkUptimeRecord {
            network_name: self.network_name.clone(),
            uptime: Self::network_uptime(records, active_device_count),
            created_at,
        }
    }

    pub fn aggregate(
        &self,
        records: &[DeviceUptimeSummary],
        active_device_count: usize,
    ) -> NetworkUptimeRecord {
        self.aggregate_at(records, active_device_count, Utc::now())
    }

    /// Appends the device summaries, then the network record.
    pub async fn persist(
        &self,
        sink: &dyn UptimeSink,
        records: &[DeviceUptimeSummary],
        network_record: &NetworkUptimeRecord,
    ) -> UptimeResult<()> {
        sink.save_device_uptime(&self.network_name, records)
            .await
            .map_err(UptimeError::Persistence)?;
        sink.save_network_uptime(std::slice::from_ref(network_record))
            .await
            .map_err(UptimeError::Persistence)?;
        Ok(())
    }
}

use crate::sources::UptimeSink;
use crate::uptime::{DeviceUptimeSummary, NetworkUptimeRecord, UptimeReport};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Instant;

// Keeps each multi-row INSERT under the Postgres bind-parameter limit.
const INSERT_CHUNK_ROWS: usize = 1000;

/// Append-only uptime tables. Rows are never updated or deleted here.
#[derive(Clone)]
pub struct PgUptimeSink {
    pool: PgPool,
}

impl PgUptimeSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UptimeSink for PgUptimeSink {
    async fn save_device_uptime(&self, tenant: &str, records: &[DeviceUptimeSummary]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;
        for chunk in records.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO device_uptime (tenant, device_name, channel_id, sensor_one_pm2_5, sensor_two_pm2_5, battery_voltage, uptime, downtime, created_at, is_active) ",
            );
            builder.push_values(chunk.iter(), |mut b, record| {
                b.push_bind(tenant)
                    .push_bind(&record.device_name)
                    .push_bind(record.channel_id)
                    .push_bind(record.sensor_one_pm2_5)
                    .push_bind(record.sensor_two_pm2_5)
                    .push_bind(record.battery_voltage)
                    .push_bind(record.uptime.value())
                    .push_bind(record.downtime.value())
                    .push_bind(record.created_at)
                    .push_bind(record.is_active);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("device_uptime insert failed")?;
        }
        tx.commit().await?;
        tracing::debug!(
            len = records.len(),
            micros = started.elapsed().as_micros() as u64,
            "saved device uptime"
        );
        Ok(())
    }

    async fn save_network_uptime(&self, records: &[NetworkUptimeRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO network_uptime (network_name, uptime, created_at) ");
        builder.push_values(records.iter(), |mut b, record| {
            b.push_bind(&record.network_name)
                .push_bind(record.uptime.value())
                .push_bind(record.created_at);
        });
        builder
            .build()
            .execute(&self.pool)
            .await
            .context("network_uptime insert failed")?;
        tracing::debug!(len = records.len(), "saved network uptime");
        Ok(())
    }

    async fn save_bucket_uptime(&self, report: &UptimeReport) -> Result<()> {
        if report.devices_uptime.is_empty() {
            return Ok(());
        }
        let computed_at = Utc::now();
        let mut tx = self.pool.begin().await?;
        for chunk in report.devices_uptime.chunks(INSERT_CHUNK_ROWS) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO device_bucket_uptime (device, ts, data_points, average_battery, uptime, downtime, range_start, range_end, computed_at) ",
            );
            builder.push_values(chunk.iter(), |mut b, row| {
                b.push_bind(&row.device)
                    .push_bind(row.timestamp)
                    .push_bind(i64::from(row.data_points))
                    .push_bind(row.average_battery)
                    .push_bind(row.uptime.value())
                    .push_bind(row.downtime.value())
                    .push_bind(report.start_date_time)
                    .push_bind(report.end_date_time)
                    .push_bind(computed_at);
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .context("device_bucket_uptime insert failed")?;
        }
        tx.commit().await?;
        tracing::debug!(len = report.devices_uptime.len(), "saved bucket uptime");
        Ok(())
    }
}

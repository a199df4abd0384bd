use crate::sources::{ChannelUptimeProvider, RawReadingsSource};
use crate::uptime::{ChannelUptime, RawReading, UptimeCalculator, BUCKET_SECONDS};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::{PgPool, Row};
use std::num::NonZeroU32;

#[derive(Clone)]
pub struct PgReadingsStore {
    pool: PgPool,
}

impl PgReadingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RawReadingsSource for PgReadingsStore {
    async fn fetch_readings(
        &self,
        devices: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawReading>> {
        if devices.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT
                timestamp,
                device_id AS device,
                battery,
                s1_pm2_5,
                s2_pm2_5
            FROM raw_readings
            WHERE timestamp >= $1
              AND timestamp <= $2
              AND (s1_pm2_5 IS NOT NULL OR s2_pm2_5 IS NOT NULL)
              AND device_id = ANY($3)
            ORDER BY timestamp
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(devices)
        .fetch_all(&self.pool)
        .await
        .context("raw readings query failed")?;

        let mut readings = Vec::with_capacity(rows.len());
        for row in rows {
            readings.push(RawReading {
                timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
                device: row.try_get::<String, _>("device")?,
                battery: row.try_get::<Option<f64>, _>("battery")?,
                sensor_one_pm2_5: row.try_get::<Option<f64>, _>("s1_pm2_5")?,
                sensor_two_pm2_5: row.try_get::<Option<f64>, _>("s2_pm2_5")?,
            });
        }

        tracing::debug!(
            devices = devices.len(),
            rows = readings.len(),
            %start,
            %end,
            "loaded raw readings"
        );
        Ok(readings)
    }
}

/// Channel uptime over the most recent `window`, computed from `raw_readings`.
///
/// The expected count for the window scales the per-bucket threshold by the
/// number of 30-minute buckets it spans.
#[derive(Clone)]
pub struct PgChannelUptime {
    pool: PgPool,
    window: ChronoDuration,
    calculator: UptimeCalculator,
}

impl PgChannelUptime {
    pub fn new(pool: PgPool, window: ChronoDuration, bucket_threshold: NonZeroU32) -> Self {
        let buckets = u32::try_from((window.num_seconds() / BUCKET_SECONDS).max(1))
            .unwrap_or(u32::MAX);
        let expected = bucket_threshold.saturating_mul(
            NonZeroU32::new(buckets).unwrap_or(NonZeroU32::MIN),
        );
        Self {
            pool,
            window,
            calculator: UptimeCalculator::new(expected),
        }
    }

    pub fn expected_data_points(&self) -> NonZeroU32 {
        self.calculator.threshold()
    }

    pub(crate) async fn channel_uptime_at(
        &self,
        tenant: &str,
        channel_id: i64,
        device_name: &str,
        now: DateTime<Utc>,
    ) -> Result<ChannelUptime> {
        let row = sqlx::query(
            r#"
            SELECT
                timestamp,
                battery,
                s1_pm2_5,
                s2_pm2_5,
                COUNT(*) OVER () AS data_points
            FROM raw_readings
            WHERE device_id = $1
              AND timestamp > $2
              AND timestamp <= $3
              AND (s1_pm2_5 IS NOT NULL OR s2_pm2_5 IS NOT NULL)
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(device_name)
        .bind(now - self.window)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("channel {channel_id} readings query failed"))?;

        let Some(row) = row else {
            anyhow::bail!(
                "no readings for device {device_name} (channel {channel_id}, tenant {tenant}) in the last {} minutes",
                self.window.num_minutes()
            );
        };

        let data_points = row.try_get::<i64, _>("data_points")?;
        let split = self
            .calculator
            .calculate(u32::try_from(data_points).unwrap_or(u32::MAX));

        Ok(ChannelUptime {
            sensor_one_pm2_5: row.try_get::<Option<f64>, _>("s1_pm2_5")?,
            sensor_two_pm2_5: row.try_get::<Option<f64>, _>("s2_pm2_5")?,
            battery_voltage: row.try_get::<Option<f64>, _>("battery")?,
            uptime: split.uptime,
            downtime: split.downtime,
            timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        })
    }
}

#[async_trait]
impl ChannelUptimeProvider for PgChannelUptime {
    async fn channel_uptime(
        &self,
        tenant: &str,
        channel_id: i64,
        device_name: &str,
    ) -> Result<ChannelUptime> {
        self.channel_uptime_at(tenant, channel_id, device_name, Utc::now())
            .await
    }
}

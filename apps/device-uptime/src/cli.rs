use crate::engine::UptimeRequest;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::num::NonZeroU32;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "device-uptime",
    version,
    about = "Device and network uptime aggregation"
)]
pub struct Args {
    /// Run a single cycle and exit.
    #[arg(long, default_value_t = false)]
    pub once: bool,
    /// RFC 3339 start of the bucket range; defaults to end minus the lookback.
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,
    /// RFC 3339 end of the bucket range; defaults to now.
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,
    #[arg(long)]
    pub expected_data_points: Option<NonZeroU32>,
    /// Restrict the bucket computation to these devices. Repeatable.
    #[arg(long = "device")]
    pub devices: Vec<String>,
}

impl Args {
    pub fn uptime_request(&self) -> UptimeRequest {
        UptimeRequest {
            expected_data_points: self.expected_data_points,
            start_date_time: self.start,
            end_date_time: self.end,
            devices: (!self.devices.is_empty()).then(|| self.devices.clone()),
        }
    }
}

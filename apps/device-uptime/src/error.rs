use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UptimeError {
    #[error("invalid range: end {end} is before start {start}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("cannot average an empty group for device {device} at {timestamp}")]
    EmptyGroup {
        device: String,
        timestamp: DateTime<Utc>,
    },

    #[error("failed to fetch uptime data for device {device}")]
    UpstreamFetch {
        device: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("device registry request failed")]
    Registry(#[source] anyhow::Error),

    #[error("raw readings query failed")]
    Store(#[source] anyhow::Error),

    #[error("failed to persist uptime records")]
    Persistence(#[source] anyhow::Error),

    #[error("device {device} could not be processed: {reason}")]
    Configuration { device: String, reason: String },
}

impl UptimeError {
    pub fn upstream(device: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::UpstreamFetch {
            device: device.into(),
            source: source.into(),
        }
    }

    /// Errors scoped to a single device never abort a network-wide run.
    pub fn is_device_local(&self) -> bool {
        matches!(
            self,
            Self::UpstreamFetch { .. } | Self::Configuration { .. } | Self::EmptyGroup { .. }
        )
    }
}

pub type UptimeResult<T> = Result<T, UptimeError>;

/// Renders an error followed by every source in its chain.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

use crate::sources::DeviceRegistry;
use crate::uptime::Device;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the device registry's `GET /devices` listing.
#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct DevicesEnvelope {
    #[serde(default)]
    devices: Vec<RegistryDevice>,
}

#[derive(Deserialize)]
struct RegistryDevice {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    device_number: Option<JsonValue>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default, rename = "isActive")]
    is_active: Option<bool>,
}

impl From<RegistryDevice> for Device {
    fn from(raw: RegistryDevice) -> Self {
        Device {
            name: raw
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            channel_id: raw.device_number.as_ref().and_then(channel_id_from_json),
            network: raw.network,
            is_active: raw.is_active.unwrap_or(false),
        }
    }
}

fn channel_id_from_json(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(number) => number.as_i64().filter(|id| *id != 0),
        JsonValue::String(raw) => raw.trim().parse::<i64>().ok().filter(|id| *id != 0),
        _ => None,
    }
}

pub(crate) fn parse_devices(body: &str) -> Result<Vec<Device>> {
    let envelope: DevicesEnvelope =
        serde_json::from_str(body).context("device registry returned malformed JSON")?;
    Ok(envelope.devices.into_iter().map(Device::from).collect())
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build registry HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DeviceRegistry for RegistryClient {
    async fn list_devices(&self, tenant: &str, network: &str) -> Result<Vec<Device>> {
        let url = format!("{}/devices", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("tenant", tenant), ("network", network)])
            .send()
            .await
            .with_context(|| format!("device registry request to {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("device registry returned {status} for {url}");
        }

        let body = response
            .text()
            .await
            .context("failed to read device registry response")?;
        let devices = parse_devices(&body)?;
        tracing::debug!(tenant, network, devices = devices.len(), "loaded device registry");
        Ok(devices)
    }
}

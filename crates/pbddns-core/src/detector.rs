//! Current-address detection
//!
//! * Public     – plain-text echo endpoint over HTTP
//! * Interface  – first non-loopback IPv4 via `pnet_datalink` on Unix;
//!   not supported on Windows

use crate::cfg::{AddressSource, DetectCfg};
use crate::error::CoreError;
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::debug;

/// Anything that can tell the engine which address the record should hold.
#[async_trait]
pub trait Detect: Send + Sync {
    async fn detect(&self) -> Result<Ipv4Addr, CoreError>;
}

pub struct Detector {
    source: AddressSource,
    url: String,
    client: Client,
}

impl Detector {
    pub fn new(cfg: &DetectCfg) -> anyhow::Result<Self> {
        Ok(Self {
            source: cfg.source,
            url: cfg.url.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(cfg.timeout_secs))
                .build()?,
        })
    }

    pub fn source(&self) -> AddressSource {
        self.source
    }
}

#[async_trait]
impl Detect for Detector {
    async fn detect(&self) -> Result<Ipv4Addr, CoreError> {
        let ip = match self.source {
            AddressSource::Public => detect_http(&self.client, &self.url).await?,
            AddressSource::LocalInterface => detect_iface()?,
        };
        debug!("detect/{:?} -> {ip}", self.source);
        Ok(ip)
    }
}

/*──────── HTTP detector ────────*/
async fn detect_http(client: &Client, url: &str) -> Result<Ipv4Addr, CoreError> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to get public IP address from {url}"))?;

    let status = resp.status();
    if status != StatusCode::OK {
        return Err(CoreError::Critical(anyhow!(
            "failed to get public IP address, HTTP status code: {}",
            status.as_u16()
        )));
    }

    let body = resp
        .text()
        .await
        .context("failed to read public IP address response body")?;
    let ip = body
        .trim()
        .parse::<Ipv4Addr>()
        .with_context(|| format!("public IP endpoint returned `{}`", body.trim()))?;
    Ok(ip)
}

/*──────── interface detector (platform split) ────────*/

/// First address that is IPv4 and not loopback.
pub fn pick_ipv4<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find_map(|ip| match ip {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        _ => None,
    })
}

#[cfg(unix)]
fn detect_iface() -> Result<Ipv4Addr, CoreError> {
    use pnet_datalink::interfaces;

    let addrs = interfaces()
        .into_iter()
        .flat_map(|i| i.ips.into_iter().map(|ipn| ipn.ip()));
    pick_ipv4(addrs).ok_or_else(|| CoreError::NotFound("local IP address not found".into()))
}

#[cfg(not(unix))]
fn detect_iface() -> Result<Ipv4Addr, CoreError> {
    Err(CoreError::NotFound(
        r#"source = "local" is not supported on Windows; use "public" instead"#.into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn skips_loopback_and_v6() {
        let addrs = [
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V6("fe80::1".parse().unwrap()),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)),
        ];
        assert_eq!(pick_ipv4(addrs), Some(Ipv4Addr::new(192, 168, 1, 20)));
    }

    #[test]
    fn nothing_usable() {
        let addrs = [
            IpAddr::V4(Ipv4Addr::new(127, 0, 0, 53)),
            IpAddr::V6("2001:db8::1".parse().unwrap()),
        ];
        assert_eq!(pick_ipv4(addrs), None);
    }
}

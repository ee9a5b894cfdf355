use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Identifier the `ipam.type` field must carry
pub const PLUGIN_TYPE: &str = "host-remote";

/// Version assumed when a configuration does not declare one
pub const DEFAULT_CNI_VERSION: &str = "0.1.0";

/// CNI specification versions this plugin can speak
pub const SUPPORTED_VERSIONS: &[&str] = &["0.1.0", "0.2.0", "0.3.0", "0.3.1", "0.4.0", "1.0.0"];

/// Deadline applied to allocation calls unless `timeout_secs` overrides it
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Minimal envelope decoded before anything else to learn the protocol version
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VersionEnvelope {
    #[serde(rename = "cniVersion", default)]
    pub cni_version: Option<String>,
}

impl VersionEnvelope {
    /// Decode the declared version, rejecting versions outside [`SUPPORTED_VERSIONS`]
    pub fn decode(bytes: &[u8]) -> Result<String> {
        let envelope: VersionEnvelope = serde_json::from_slice(bytes)
            .map_err(|e| Error::config(format!("failed to decode version envelope: {e}")))?;

        let version = match envelope.cni_version.as_deref() {
            None | Some("") => DEFAULT_CNI_VERSION,
            Some(v) => v,
        };

        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(Error::UnsupportedVersion {
                version: version.to_string(),
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        Ok(version.to_string())
    }
}

/// Network configuration handed to the plugin on stdin
///
/// Only the `ipam` block matters here; the surrounding fields belong to
/// whichever main plugin delegated to us.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetConf {
    /// CNI specification version
    #[serde(rename = "cniVersion", default)]
    pub cni_version: Option<String>,
    /// Name of the network
    #[serde(default)]
    pub name: String,
    /// IPAM (IP Address Management) block
    #[serde(default)]
    pub ipam: Option<RawIPAMConfig>,
}

/// IPAM block as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIPAMConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub ipam_type: String,
    #[serde(default)]
    pub ipam_server: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl NetConf {
    /// Parse NetConf from bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::config(format!("failed to parse network configuration: {e}")))
    }
}

/// Validated IPAM configuration
#[derive(Debug, Clone, PartialEq)]
pub struct IPAMConfig {
    pub name: String,
    pub plugin_type: String,
    /// Base URL of the allocation server
    pub server: Url,
    /// Per-request deadline; `None` waits as long as the transport does
    pub timeout: Option<Duration>,
}

impl IPAMConfig {
    /// Parse and validate the IPAM block of a raw configuration document
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let conf = NetConf::parse(bytes)?;
        let ipam = conf
            .ipam
            .ok_or_else(|| Error::config("missing \"ipam\" section"))?;

        if ipam.ipam_type != PLUGIN_TYPE {
            return Err(Error::config(format!(
                "ipam type {:?} is not {:?}",
                ipam.ipam_type, PLUGIN_TYPE
            )));
        }

        let raw_server = ipam
            .ipam_server
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::config("missing \"ipam_server\" in ipam section"))?;
        let server = parse_server_url(raw_server)?;

        let timeout = match ipam.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            name: ipam.name.unwrap_or(conf.name),
            plugin_type: ipam.ipam_type,
            server,
            timeout,
        })
    }
}

fn parse_server_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::config(format!("invalid ipam_server {raw:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "ipam_server {raw:?} must use http or https"
        )));
    }
    if url.cannot_be_a_base() || url.host().is_none() {
        return Err(Error::config(format!(
            "ipam_server {raw:?} is not a base URL"
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::config(format!(
            "ipam_server {raw:?} must not carry a query or fragment"
        )));
    }

    Ok(url)
}

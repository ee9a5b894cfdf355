use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::net::IpAddr;

use crate::error::Error;

/// CNI command arguments
#[derive(Debug, Clone, Default)]
pub struct CmdArgs {
    /// Container ID
    pub container_id: String,
    /// Network namespace path
    pub netns: String,
    /// Interface name
    pub ifname: String,
    /// Raw `CNI_ARGS` string, passed through untouched
    pub args: String,
    /// Path
    pub path: String,
    /// Standard input data
    pub stdin_data: Vec<u8>,
}

/// Address family of an assignment, `"4"` or `"6"` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpVersion {
    #[serde(rename = "4")]
    V4,
    #[serde(rename = "6")]
    V6,
}

impl IpVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpVersion::V4 => "4",
            IpVersion::V6 => "6",
        }
    }

    fn matches(&self, ip: &IpAddr) -> bool {
        matches!(
            (self, ip),
            (IpVersion::V4, IpAddr::V4(_)) | (IpVersion::V6, IpAddr::V6(_))
        )
    }
}

/// A single IP assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IPConfig {
    pub version: IpVersion,
    /// Address with prefix length, host bits preserved
    pub address: IpNetwork,
    pub gateway: IpAddr,
}

impl IPConfig {
    /// Build an assignment from the textual address and gateway the server hands back
    pub fn parse(version: IpVersion, address: &str, gateway: &str) -> Result<Self, Error> {
        let prefix = match address.trim().split_once('/') {
            Some((_, prefix)) => prefix,
            None => return Err(Error::malformed_address(address, "missing prefix length")),
        };
        let canonical = !prefix.is_empty()
            && prefix.bytes().all(|b| b.is_ascii_digit())
            && (prefix == "0" || !prefix.starts_with('0'));
        if !canonical {
            return Err(Error::malformed_address(address, "prefix length is not canonical"));
        }
        let address: IpNetwork = address
            .trim()
            .parse()
            .map_err(|e| Error::malformed_address(address, e))?;
        let gateway: IpAddr = gateway
            .trim()
            .parse()
            .map_err(|e| Error::malformed_address(gateway, e))?;

        if !version.matches(&address.ip()) {
            return Err(Error::malformed_address(
                &address.to_string(),
                format!("not an IPv{} address", version.as_str()),
            ));
        }
        if !version.matches(&gateway) {
            return Err(Error::malformed_address(
                &gateway.to_string(),
                format!("gateway is not an IPv{} address", version.as_str()),
            ));
        }

        Ok(Self {
            version,
            address,
            gateway,
        })
    }
}

/// Result of a successful ADD, tagged with the configuration's CNI version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CniResult {
    pub cni_version: String,
    pub ips: Vec<IPConfig>,
}

impl CniResult {
    /// Create a new empty result
    pub fn new(cni_version: &str) -> Self {
        Self {
            cni_version: cni_version.to_string(),
            ips: Vec::new(),
        }
    }

    /// Add an IP configuration to the result
    pub fn add_ip(&mut self, ip: IPConfig) {
        self.ips.push(ip);
    }

    /// Render the result in the layout its CNI version prescribes
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("cniVersion".into(), json!(self.cni_version));

        match self.cni_version.as_str() {
            "0.1.0" | "0.2.0" => {
                for (key, version) in [("ip4", IpVersion::V4), ("ip6", IpVersion::V6)] {
                    if let Some(ip) = self.ips.iter().find(|ip| ip.version == version) {
                        doc.insert(
                            key.into(),
                            json!({
                                "ip": ip.address.to_string(),
                                "gateway": ip.gateway.to_string(),
                            }),
                        );
                    }
                }
            }
            version => {
                // 1.0.0 dropped the per-address version field
                let with_version = version != "1.0.0";
                let ips: Vec<Value> = self
                    .ips
                    .iter()
                    .map(|ip| {
                        let mut entry = json!({
                            "address": ip.address.to_string(),
                            "gateway": ip.gateway.to_string(),
                        });
                        if with_version {
                            entry["version"] = json!(ip.version.as_str());
                        }
                        entry
                    })
                    .collect();
                doc.insert("ips".into(), Value::Array(ips));
            }
        }

        Value::Object(doc)
    }

    /// Print result as JSON
    pub fn print(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.to_document())?;
        println!("{}", json);
        Ok(())
    }
}

/// Error document written for the runtime when a command fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDoc {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    pub code: u32,
    pub msg: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

/// Answer to the VERSION command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    #[serde(rename = "supportedVersions")]
    pub supported_versions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(version: &str) -> CniResult {
        let mut result = CniResult::new(version);
        result.add_ip(IPConfig::parse(IpVersion::V4, "10.35.4.1/20", "10.35.0.1").unwrap());
        result
    }

    #[test]
    fn keeps_host_bits() {
        let ip = IPConfig::parse(IpVersion::V4, "10.35.4.1/20", "10.35.0.1").unwrap();
        assert_eq!(ip.address.to_string(), "10.35.4.1/20");
        assert_eq!(ip.address.prefix(), 20);

        let default_route = IPConfig::parse(IpVersion::V4, "0.0.0.0/0", "10.35.0.1").unwrap();
        assert_eq!(default_route.address.prefix(), 0);
    }

    #[test]
    fn rejects_bare_or_mismatched_addresses() {
        for (version, addr, gw) in [
            (IpVersion::V4, "10.35.4.1", "10.35.0.1"),
            (IpVersion::V4, "10.35.4.1/33", "10.35.0.1"),
            (IpVersion::V4, "10.35.4.1/020", "10.35.0.1"),
            (IpVersion::V4, "10.35.4.1/+20", "10.35.0.1"),
            (IpVersion::V4, "10.35.4.1/", "10.35.0.1"),
            (IpVersion::V6, "fd00::5/064", "fd00::1"),
            (IpVersion::V4, "garbage", "10.35.0.1"),
            (IpVersion::V4, "10.35.4.1/20", "10.35.0.1/20"),
            (IpVersion::V4, "fd00::5/64", "fd00::1"),
            (IpVersion::V6, "fd00::5/64", "10.35.0.1"),
        ] {
            let err = IPConfig::parse(version, addr, gw).unwrap_err();
            assert!(matches!(err, Error::MalformedAddress { .. }), "{addr} {gw}");
        }
    }

    #[test]
    fn current_layout_carries_version() {
        assert_eq!(
            sample("0.3.1").to_document(),
            json!({
                "cniVersion": "0.3.1",
                "ips": [{"version": "4", "address": "10.35.4.1/20", "gateway": "10.35.0.1"}],
            })
        );
    }

    #[test]
    fn v1_layout_drops_version() {
        assert_eq!(
            sample("1.0.0").to_document(),
            json!({
                "cniVersion": "1.0.0",
                "ips": [{"address": "10.35.4.1/20", "gateway": "10.35.0.1"}],
            })
        );
    }

    #[test]
    fn legacy_layout_uses_ip4() {
        assert_eq!(
            sample("0.2.0").to_document(),
            json!({
                "cniVersion": "0.2.0",
                "ip4": {"ip": "10.35.4.1/20", "gateway": "10.35.0.1"},
            })
        );
    }
}

use tracing::{info, warn};

use crate::client::AllocationClient;
use crate::config::{IPAMConfig, VersionEnvelope};
use crate::error::{Error, Result};
use crate::types::{CmdArgs, CniResult, IPConfig};

/// host-remote IPAM plugin implementation
///
/// Every call is a single pass: parse configuration, call the allocation
/// server once, translate. Nothing is kept between invocations.
pub struct HostRemotePlugin {
    /// Command arguments
    args: CmdArgs,
}

impl HostRemotePlugin {
    /// Create a new plugin for one invocation
    pub fn new(args: CmdArgs) -> Self {
        Self { args }
    }

    /// Obtain an address from the allocation server
    pub async fn add_network(&self) -> Result<CniResult> {
        let cni_version = VersionEnvelope::decode(&self.args.stdin_data)?;
        let config = IPAMConfig::load(&self.args.stdin_data)?;
        info!(
            container_id = %self.args.container_id,
            ifname = %self.args.ifname,
            server = %config.server,
            "registering interface"
        );

        let client = AllocationClient::new(&config).map_err(Error::AllocationFailed)?;
        let response = client
            .register(&self.args)
            .await
            .map_err(Error::AllocationFailed)?;

        let ip = IPConfig::parse(response.version, &response.address, &response.gateway)
            .inspect_err(|e| warn!("rejecting allocation response: {e}"))?;
        info!(address = %ip.address, gateway = %ip.gateway, "address allocated");

        let mut result = CniResult::new(&cni_version);
        result.add_ip(ip);
        Ok(result)
    }

    /// Release the address held for this container
    pub async fn del_network(&self) -> Result<()> {
        let config = IPAMConfig::load(&self.args.stdin_data)?;
        info!(
            container_id = %self.args.container_id,
            ifname = %self.args.ifname,
            server = %config.server,
            "unregistering interface"
        );

        let client = AllocationClient::new(&config).map_err(Error::ReleaseFailed)?;
        client
            .unregister(&self.args)
            .await
            .map_err(Error::ReleaseFailed)?;

        info!(container_id = %self.args.container_id, "address released");
        Ok(())
    }

    /// CHECK is accepted without consulting the allocation server
    pub fn check_network(&self) -> Result<()> {
        info!(container_id = %self.args.container_id, "check is a no-op");
        Ok(())
    }
}

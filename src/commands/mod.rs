use anyhow::{Context, Result};
use std::env;
use std::io::{self, Read};
use tokio::runtime::{Builder, Runtime};
use tracing::info;

use crate::config::{VersionEnvelope, SUPPORTED_VERSIONS};
use crate::error::Error;
use crate::plugin::HostRemotePlugin;
use crate::types::{CmdArgs, VersionInfo};

/// Commands a runtime may issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Del,
    Check,
    Version,
}

impl Command {
    /// Parse the `CNI_COMMAND` value
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value {
            "ADD" => Ok(Command::Add),
            "DEL" => Ok(Command::Del),
            "CHECK" => Ok(Command::Check),
            "VERSION" => Ok(Command::Version),
            other => Err(Error::InvalidEnvironment(format!(
                "unknown CNI command: {other}"
            ))),
        }
    }

    /// Whether `CNI_NETNS` must be present
    fn needs_netns(&self) -> bool {
        matches!(self, Command::Add | Command::Check)
    }
}

/// Build command arguments from an environment lookup and the stdin payload
pub fn parse_args<F>(command: Command, lookup: F, stdin_data: Vec<u8>) -> Result<CmdArgs, Error>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |name: &str| {
        lookup(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::InvalidEnvironment(format!("{name} not found in environment")))
    };

    let netns = if command.needs_netns() {
        required("CNI_NETNS")?
    } else {
        lookup("CNI_NETNS").unwrap_or_default()
    };

    Ok(CmdArgs {
        container_id: required("CNI_CONTAINERID")?,
        netns,
        ifname: required("CNI_IFNAME")?,
        args: lookup("CNI_ARGS").unwrap_or_default(),
        path: required("CNI_PATH")?,
        stdin_data,
    })
}

fn read_stdin() -> Result<Vec<u8>, Error> {
    let mut stdin_data = Vec::new();
    io::stdin().read_to_end(&mut stdin_data)?;
    Ok(stdin_data)
}

fn env_lookup(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")
}

/// Execute the add command
pub fn cmd_add(args: CmdArgs) -> Result<()> {
    let plugin = HostRemotePlugin::new(args);
    let result = runtime()?.block_on(plugin.add_network())?;

    // Output result as JSON
    result.print()?;

    Ok(())
}

/// Execute the delete command
pub fn cmd_del(args: CmdArgs) -> Result<()> {
    let plugin = HostRemotePlugin::new(args);
    runtime()?.block_on(plugin.del_network())?;

    Ok(())
}

/// Execute the check command
pub fn cmd_check(args: CmdArgs) -> Result<()> {
    HostRemotePlugin::new(args).check_network()?;

    Ok(())
}

/// Answer VERSION; a declared version is echoed and must be one we speak
pub fn version_info(stdin_data: &[u8]) -> Result<VersionInfo, Error> {
    let cni_version = if stdin_data.iter().all(u8::is_ascii_whitespace) {
        "1.0.0".to_string()
    } else {
        VersionEnvelope::decode(stdin_data)?
    };

    Ok(VersionInfo {
        cni_version,
        supported_versions: SUPPORTED_VERSIONS.iter().map(|v| v.to_string()).collect(),
    })
}

/// Main entry point for the CNI plugin
pub fn run_cni(command: Command) -> Result<()> {
    let stdin_data = read_stdin().context("Failed to read from stdin")?;
    info!(?command, "running CNI command");

    match command {
        Command::Version => {
            println!("{}", serde_json::to_string(&version_info(&stdin_data)?)?);
            Ok(())
        }
        Command::Add => cmd_add(parse_args(command, env_lookup, stdin_data)?),
        Command::Del => cmd_del(parse_args(command, env_lookup, stdin_data)?),
        Command::Check => cmd_check(parse_args(command, env_lookup, stdin_data)?),
    }
}

//! Client for the remote allocation server
//!
//! The server exposes two JSON endpoints, `POST {base}/register` and
//! `POST {base}/unregister`, both taking an [`AllocationRequest`]. Only a
//! register answer carries a body of interest.

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::IPAMConfig;
use crate::error::ClientError;
use crate::types::{CmdArgs, IpVersion};

/// What the plugin asks of the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Register,
    Unregister,
}

impl Mode {
    /// Path segment appended to the server base URL
    pub fn suffix(&self) -> &'static str {
        match self {
            Mode::Register => "register",
            Mode::Unregister => "unregister",
        }
    }
}

/// Body posted to both endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub container_id: String,
    pub net_ns: String,
    pub if_name: String,
    pub args: String,
    pub path: String,
}

impl From<&CmdArgs> for AllocationRequest {
    fn from(args: &CmdArgs) -> Self {
        Self {
            container_id: args.container_id.clone(),
            net_ns: args.netns.clone(),
            if_name: args.ifname.clone(),
            args: args.args.clone(),
            path: args.path.clone(),
        }
    }
}

/// Body returned by a successful register call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub version: IpVersion,
    pub address: String,
    pub gateway: String,
}

/// One-shot client, built per invocation
pub struct AllocationClient {
    http: Client,
    server: Url,
}

impl AllocationClient {
    /// Create a client for the server named in `config`
    pub fn new(config: &IPAMConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|source| ClientError::Transport {
            url: config.server.to_string(),
            source,
        })?;

        Ok(Self {
            http,
            server: config.server.clone(),
        })
    }

    /// Full URL for a mode, keeping any path the base URL carries
    pub fn endpoint(&self, mode: Mode) -> Url {
        let mut url = self.server.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(mode.suffix());
        }
        url
    }

    /// Ask the server for an address
    pub async fn register(&self, args: &CmdArgs) -> Result<AllocationResponse, ClientError> {
        let body = self.send(Mode::Register, args).await?;
        serde_json::from_str(&body)
            .map_err(|source| ClientError::MalformedResponse { body, source })
    }

    /// Tell the server the address is no longer used
    pub async fn unregister(&self, args: &CmdArgs) -> Result<(), ClientError> {
        self.send(Mode::Unregister, args).await.map(|_| ())
    }

    async fn send(&self, mode: Mode, args: &CmdArgs) -> Result<String, ClientError> {
        let url = self.endpoint(mode);
        let request = AllocationRequest::from(args);
        info!(%url, container_id = %request.container_id, "calling allocation server");
        debug!(?request, "allocation request");

        let transport = |source: reqwest::Error| ClientError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .http
            .post(url.clone())
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if status != StatusCode::OK {
            warn!(%url, %status, %body, "allocation server rejected request");
            return Err(ClientError::Remote { status, body });
        }

        debug!(%status, %body, "allocation response");
        Ok(body)
    }
}

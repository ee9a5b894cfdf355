// In-process stand-in for the remote allocation server.
#![allow(dead_code)]

use axum::{extract::State, http::StatusCode, routing::post, Router};
use host_remote::client::AllocationRequest;
use host_remote::types::CmdArgs;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const IFNAME: &str = "eth0";
pub const NSPATH: &str = "/path/to/ns";
pub const CONTAINER_ID: &str = "fake_container_id";

pub const REGISTER_OK: &str = r#"{"version":"4","address":"10.35.4.1/20","gateway":"10.35.0.1"}"#;

/// Canned behaviour for each endpoint
#[derive(Clone)]
pub struct Behaviour {
    pub register: (StatusCode, String),
    pub unregister: (StatusCode, String),
    pub delay: Option<Duration>,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            register: (StatusCode::OK, REGISTER_OK.to_string()),
            unregister: (StatusCode::OK, String::new()),
            delay: None,
        }
    }
}

#[derive(Default)]
struct Shared {
    behaviour: Behaviour,
    register_hits: AtomicUsize,
    unregister_hits: AtomicUsize,
    requests: Mutex<Vec<AllocationRequest>>,
}

pub struct FakeServer {
    pub addr: SocketAddr,
    shared: Arc<Shared>,
}

impl FakeServer {
    /// Serve `{prefix}/register` and `{prefix}/unregister` on an ephemeral port
    pub async fn start(prefix: &str, behaviour: Behaviour) -> Self {
        let shared = Arc::new(Shared {
            behaviour,
            ..Default::default()
        });

        let app = Router::new()
            .route(&format!("{prefix}/register"), post(register))
            .route(&format!("{prefix}/unregister"), post(unregister))
            .with_state(shared.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, shared }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn register_hits(&self) -> usize {
        self.shared.register_hits.load(Ordering::SeqCst)
    }

    pub fn unregister_hits(&self) -> usize {
        self.shared.unregister_hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<AllocationRequest> {
        self.shared.requests.lock().unwrap().clone()
    }
}

fn record(shared: &Shared, body: &str) -> bool {
    match serde_json::from_str::<AllocationRequest>(body) {
        Ok(request) => {
            shared.requests.lock().unwrap().push(request);
            true
        }
        Err(_) => false,
    }
}

async fn register(State(shared): State<Arc<Shared>>, body: String) -> (StatusCode, String) {
    shared.register_hits.fetch_add(1, Ordering::SeqCst);
    if !record(&shared, &body) {
        return (StatusCode::BAD_REQUEST, "bad request body".to_string());
    }
    if let Some(delay) = shared.behaviour.delay {
        tokio::time::sleep(delay).await;
    }
    shared.behaviour.register.clone()
}

async fn unregister(State(shared): State<Arc<Shared>>, body: String) -> (StatusCode, String) {
    shared.unregister_hits.fetch_add(1, Ordering::SeqCst);
    if !record(&shared, &body) {
        return (StatusCode::BAD_REQUEST, "bad request body".to_string());
    }
    shared.behaviour.unregister.clone()
}

/// Network configuration delegating IPAM to `server`
pub fn conf(cni_version: &str, server: &str) -> String {
    format!(
        r#"{{
            "cniVersion": "{cni_version}",
            "name": "blackFaceQuestion",
            "type": "macvlan",
            "master": "bond0",
            "ipam": {{
                "type": "host-remote",
                "ipam_server": "{server}",
                "timeout_secs": 5
            }}
        }}"#
    )
}

pub fn cmd_args(stdin: impl Into<Vec<u8>>) -> CmdArgs {
    CmdArgs {
        container_id: CONTAINER_ID.to_string(),
        netns: NSPATH.to_string(),
        ifname: IFNAME.to_string(),
        args: "IgnoreUnknown=1;K8S_POD_NAME=web".to_string(),
        path: "/opt/cni/bin".to_string(),
        stdin_data: stdin.into(),
    }
}

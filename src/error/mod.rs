use reqwest::StatusCode;
use thiserror::Error;

/// Errors raised while talking to the allocation server
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connect failure, timeout, ...)
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server answered with a non-success status
    #[error("allocation server returned {status}: {body}")]
    Remote { status: StatusCode, body: String },
    /// A successful register response did not decode
    #[error("malformed allocation response: {body}")]
    MalformedResponse {
        body: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Plugin errors, each mapped onto a CNI error code
#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported CNI version {version} (supported: {})", .supported.join(", "))]
    UnsupportedVersion {
        version: String,
        supported: Vec<&'static str>,
    },
    #[error("invalid network configuration: {0}")]
    Config(String),
    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),
    #[error("I/O failure")]
    Io(#[from] std::io::Error),
    #[error("failed to allocate address")]
    AllocationFailed(#[source] ClientError),
    #[error("failed to release address")]
    ReleaseFailed(#[source] ClientError),
    #[error("malformed address {value:?}: {reason}")]
    MalformedAddress { value: String, reason: String },
}

impl Error {
    /// CNI error code reported to the runtime
    pub fn code(&self) -> u32 {
        match self {
            Error::UnsupportedVersion { .. } => 1,
            Error::InvalidEnvironment(_) => 4,
            Error::Io(_) => 5,
            Error::Config(_) => 7,
            Error::AllocationFailed(_) => 100,
            Error::ReleaseFailed(_) => 101,
            Error::MalformedAddress { .. } => 102,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub(crate) fn malformed_address(value: &str, reason: impl ToString) -> Self {
        Error::MalformedAddress {
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Code used for failures that did not originate from [`Error`]
pub const GENERIC_ERROR_CODE: u32 = 999;

pub type Result<T> = std::result::Result<T, Error>;

/// One-line message for the runtime, built from the whole cause chain
///
/// Some transport errors repeat their source in their own text, so a cause
/// already present in the message is not appended again.
pub fn describe(err: &anyhow::Error) -> String {
    let mut msg = String::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if text.is_empty() || msg.contains(&text) {
            continue;
        }
        if !msg.is_empty() {
            msg.push_str(": ");
        }
        msg.push_str(&text);
    }
    msg
}

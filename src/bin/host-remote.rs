use anyhow::Result;
use host_remote::commands::{run_cni, Command};
use host_remote::error::{describe, Error, GENERIC_ERROR_CODE};
use host_remote::types::ErrorDoc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    // stdout carries the result document, so logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);

    let command = match std::env::var("CNI_COMMAND") {
        Ok(value) => Command::parse(&value).map_err(anyhow::Error::from),
        Err(_) => {
            eprintln!("CNI host-remote plugin v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
    };

    // Run the CNI plugin
    if let Err(err) = command.and_then(run_cni) {
        let msg = describe(&err);
        error!("CNI plugin error: {}", msg);

        let doc = ErrorDoc {
            cni_version: "1.0.0".to_string(),
            code: err
                .downcast_ref::<Error>()
                .map(Error::code)
                .unwrap_or(GENERIC_ERROR_CODE),
            msg,
            details: String::new(),
        };
        eprintln!("{}", serde_json::to_string(&doc)?);
        std::process::exit(1);
    }

    Ok(())
}

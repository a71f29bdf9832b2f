//! Connects to a pipeline server and prints everything it pushes.
//!
//! ```text
//! COMFY_HOST=http://127.0.0.1:8188 RUST_LOG=comfylink=debug cargo run -p watch
//! ```
//!
//! Set `COMFY_TOKEN` to authenticate with a bearer token.

use comfylink::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_HOST: &str = "http://127.0.0.1:8188";

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let host = std::env::var("COMFY_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let mut options = ClientOptions::default().listen_terminal(true);
    if let Ok(token) = std::env::var("COMFY_TOKEN") {
        options = options.with_credentials(Credentials::bearer(token));
    }

    let client = ComfyClient::new(host, options)?;

    for topic in [
        Topic::Connected,
        Topic::Disconnected,
        Topic::Reconnecting,
        Topic::Reconnected,
        Topic::ConnectionError,
        Topic::AuthError,
        Topic::AuthSuccess,
    ] {
        client.on(topic, |event| tracing::info!(?event, "lifecycle"));
    }
    client.on(Topic::All, |event| {
        if let Event::All(envelope) = event {
            println!("{} {}", envelope.kind, envelope.data_value());
        }
    });
    client.on(Topic::Preview, |event| {
        if let Event::Preview(preview) = event {
            println!("preview {} ({} bytes)", preview.mime, preview.data.len());
        }
    });
    client.on(Topic::Terminal, |event| {
        if let Event::Terminal(Some(entry)) = event {
            println!("terminal {entry}");
        }
    });

    client.init(InitOptions::default());
    match client.wait_for_ready().await {
        Ok(()) => tracing::info!(
            id = %client.id(),
            os = ?client.os_type(),
            features = ?client.available_features(),
            "ready"
        ),
        Err(error) => {
            tracing::error!(%error, "server unreachable");
            client.destroy().await;
            return Err(error);
        }
    }

    if client.monitor().is_supported() {
        client
            .monitor()
            .on(|sample| tracing::info!(cpu = sample.cpu_utilization, ram = sample.ram_used_percent, "monitor"));
    }

    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "cannot listen for ctrl-c");
    }
    client.destroy().await;
    Ok(())
}

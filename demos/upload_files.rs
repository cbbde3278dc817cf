//! Upload local files to an Apillon bucket in one session
//!
//! ```text
//! APILLON_API_KEY=... APILLON_BUCKET_UUID=... \
//!     cargo run --example upload_files -- index.html style.css
//! ```

use anyhow::Context;
use apillon_client::{CancellationToken, Config, StorageClient, UploadFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let log_level = if std::env::var("APILLON_DEBUG").is_ok() { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("apillon_client={},upload_files={}", log_level, log_level).into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let bucket = std::env::var("APILLON_BUCKET_UUID").context("APILLON_BUCKET_UUID is not set")?;
    let paths: Vec<String> = std::env::args().skip(1).collect();
    anyhow::ensure!(!paths.is_empty(), "usage: upload_files <file>...");

    let client = StorageClient::new(Config::from_env())?;

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(UploadFile::from_path(path, None).await?);
    }

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling upload");
            on_ctrl_c.cancel();
        }
    });

    tracing::info!("Uploading {} file(s) to bucket {}", files.len(), bucket);
    let outcome = client.upload_files(&bucket, files, &cancel).await?;

    tracing::info!(
        "Session {} closed, {} file(s) uploaded",
        outcome.session_uuid,
        outcome.files_uploaded
    );
    println!("{}", serde_json::to_string_pretty(&outcome.response)?);

    Ok(())
}

use std::path::Path;

use anyhow::{Context, Result};
use syncbyte_engine::config::parser;
use syncbyte_engine::{
    AttemptInput, FailureOrigin, FailureReason, Platform, RetryClassifier, SyncAttempt,
};
use syncbyte_types::{ConfiguredCatalog, ConnectionId, Version};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

const LINE_CHANNEL_CAPACITY: usize = 1024;

/// Execute the `replay` command: run one sync attempt over recorded
/// connector output and print the guarded attempt output.
pub async fn execute(
    config_path: &Path,
    connection: &str,
    protocol_version: Option<Version>,
    catalog_path: Option<&Path>,
    output_path: &Path,
) -> Result<()> {
    // 1. Parse and validate config, build the platform
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    let platform = Platform::from_config(config)?;

    // 2. Describe the attempt
    let mut input = AttemptInput::new(ConnectionId::new(connection));
    if let Some(version) = protocol_version {
        input = input.with_declared_version(version);
    }
    if let Some(path) = catalog_path {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        let catalog: ConfiguredCatalog =
            serde_json::from_str(&content).context("Failed to parse configured catalog")?;
        input = input.with_catalog(catalog);
    }

    // 3. Feed recorded output line by line; Ctrl-C cancels the attempt
    let file = tokio::fs::File::open(output_path)
        .await
        .with_context(|| format!("Failed to open connector output: {}", output_path.display()))?;
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(file).lines();
        while let Some(line) = lines.next_line().await? {
            if tx.send(line).await.is_err() {
                break;
            }
        }
        Ok::<_, std::io::Error>(())
    });
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling attempt");
            let _ = cancel_tx.send(true);
        }
    });

    // 4. Run and report
    let result = SyncAttempt::new(platform, input).run(rx, cancel_rx).await;
    reader
        .await
        .context("Connector output reader panicked")?
        .context("Failed to read connector output")?;

    match result {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => {
            let classifier = RetryClassifier::new();
            let reason = FailureReason::from_error(FailureOrigin::Replication, &err);
            eprintln!("{}", serde_json::to_string_pretty(&reason)?);
            tracing::error!(
                kind = %classifier.classify(&err),
                action = ?classifier.action(&err),
                "Sync attempt failed"
            );
            Err(err.into())
        }
    }
}

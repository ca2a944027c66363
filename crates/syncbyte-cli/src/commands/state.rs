use std::path::Path;

use anyhow::{Context, Result};
use syncbyte_engine::config::parser;
use syncbyte_engine::Platform;
use syncbyte_types::ConnectionId;

/// Execute the `state` command: print the persisted state of a connection.
pub fn execute(config_path: &Path, connection: &str) -> Result<()> {
    let config = parser::parse_config(config_path)
        .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
    let platform = Platform::from_config(config)?;

    let connection = ConnectionId::new(connection);
    match platform.store.get_state(&connection)? {
        Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
        None => anyhow::bail!("No state persisted for connection {connection}"),
    }
    Ok(())
}

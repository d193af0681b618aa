//! Flat list files: gate addresses and user agents

use std::io::ErrorKind;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;

/// Read non-empty, non-comment lines from a text file
pub async fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    Ok(parse_lines(&content))
}

/// Load the gate address list. A missing file is fatal.
pub async fn load_gate_list(path: &str) -> Result<Vec<String>> {
    let gates = read_lines(path).await?;
    info!("Loaded gate list {} with {} entries", path, gates.len());
    Ok(gates)
}

/// Load the user-agent list. A missing file means no user agent rotation.
pub async fn load_user_agents(path: &str) -> Result<Vec<String>> {
    match read_lines(path).await {
        Ok(agents) => {
            info!("Loaded {} user agents from {}", agents.len(), path);
            Ok(agents)
        }
        Err(crate::error::RelayError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            warn!("User agent list {} not found, requests go out without one", path);
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

//! Persistence layer.
//!
//! Writes the pass result to a JSON file so completed trades survive the
//! process. Nothing is read back; each pass starts empty.

use anyhow::{Context, Result};
use tracing::info;

use crate::types::PassResult;

/// Save a pass result as pretty-printed JSON, replacing any previous file.
pub fn save_pass_result(result: &PassResult, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(result)
        .context("Failed to serialise pass result")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write pass result to {path}"))?;

    info!(path, trades = result.trades.len(), "Pass result saved");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

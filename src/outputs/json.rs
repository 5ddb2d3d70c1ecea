//! JSON copy of the digest.
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06.json
//! ```

use crate::models::Digest;
use std::error::Error;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write a [`Digest`] to `{json_output_dir}/{date}.json`.
///
/// Returns the path written.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_digest(digest: &Digest, json_output_dir: &str) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(digest)?;

    let dir = json_output_dir.trim_end_matches('/');
    if let Err(e) = fs::create_dir_all(dir).await {
        error!(%dir, error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = format!("{}/{}.json", dir, digest.issue_date.format("%Y-%m-%d"));
    fs::write(&path, json).await?;
    info!(path = %path, "Wrote JSON digest");
    Ok(path)
}

use std::path::Path;

use tracing::debug;

use crate::error::{DocgraphError, Result};
use super::call_graph::GraphSnapshot;

/// Write a snapshot as pretty JSON, creating parent directories
pub fn save_snapshot<P: AsRef<Path>>(snapshot: &GraphSnapshot, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, content)?;
    debug!(
        "Saved snapshot with {} nodes to {}",
        snapshot.nodes.len(),
        path.display()
    );
    Ok(())
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<GraphSnapshot> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DocgraphError::SnapshotMissing(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| DocgraphError::SnapshotCorrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

//! Append-only dump file writer.
//!
//! Each message lands in a file addressed by topic, partition, and the UTC
//! day of its timestamp:
//!
//! ```text
//! <output_root>/<topic>/partition-<N>/<YYYY-MM-DD>_Partition_<N>.txt
//! ```
//!
//! Payload bytes are appended verbatim, with no delimiter or framing, so
//! the dump file is the exact concatenation of the payloads in arrival
//! order.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

/// Compute the dump file path for a message.
///
/// Pure function of its inputs: every message for the same topic,
/// partition, and UTC day maps to the same file.
pub fn dump_path(
    output_root: &Path,
    topic: &str,
    partition: i32,
    timestamp: DateTime<Utc>,
) -> PathBuf {
    let day = timestamp.format("%Y-%m-%d");
    output_root
        .join(topic)
        .join(format!("partition-{partition}"))
        .join(format!("{day}_Partition_{partition}.txt"))
}

/// Append a message payload to its dump file, creating the directory chain
/// and the file on first use. Returns the path written to.
pub async fn append(
    output_root: &Path,
    topic: &str,
    partition: i32,
    timestamp: DateTime<Utc>,
    payload: &[u8],
) -> anyhow::Result<PathBuf> {
    let path = dump_path(output_root, topic, partition, timestamp);
    let dir = path.parent().context("Dump path has no parent directory")?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create dump directory {}", dir.display()))?;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .with_context(|| format!("Failed to open dump file {}", path.display()))?;

    file.write_all(payload)
        .await
        .with_context(|| format!("Failed to append to dump file {}", path.display()))?;
    // tokio files buffer writes internally; flush here so a failed write
    // surfaces on this call, before the message's offset is marked.
    file.flush()
        .await
        .with_context(|| format!("Failed to flush dump file {}", path.display()))?;

    Ok(path)
}

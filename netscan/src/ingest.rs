//! Input pipeline: bytes or file → format detection → parser → registry.

use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::detect::{self, FormatKind};
use crate::error::Result;
use crate::parsers::{self, ParseStats};
use crate::registry::{DeviceRegistry, MergeStats};

/// What one input contributed to the registry.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub source: String,
    pub format: FormatKind,
    /// Whether `format` came from detection rather than the caller.
    pub detected: bool,
    pub parsed: usize,
    pub stats: ParseStats,
    pub merge: MergeStats,
}

/// Parse `raw` (detecting its format unless `format` is given) and merge
/// the records into `registry`. Never fails: unusable units are counted.
pub fn ingest_bytes(
    registry: &mut DeviceRegistry,
    source: &str,
    raw: &[u8],
    format: Option<FormatKind>,
) -> IngestSummary {
    let (format, detected) = match format {
        Some(kind) => (kind, false),
        None => (detect::detect(raw), true),
    };
    let output = parsers::parse(format, raw);
    let parsed = output.records.len();
    let merge = registry.merge(output.records);

    info!(
        source,
        %format,
        detected,
        parsed,
        added = merge.added,
        updated = merge.updated,
        rejected = merge.rejected,
        "Input merged"
    );

    IngestSummary {
        source: source.to_string(),
        format,
        detected,
        parsed,
        stats: output.stats,
        merge,
    }
}

/// Read `path` and ingest it. An unreadable file is the only failure.
pub async fn ingest_file(
    registry: &mut DeviceRegistry,
    path: &Path,
    format: Option<FormatKind>,
) -> Result<IngestSummary> {
    let raw = tokio::fs::read(path).await?;
    Ok(ingest_bytes(
        registry,
        &path.display().to_string(),
        &raw,
        format,
    ))
}

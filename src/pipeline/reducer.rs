//! Size reducer for large browser-print output
//!
//! Runs a Ghostscript-compatible tool over a scratch-file round trip. Any
//! failure falls back to the original bytes.

use std::process::{Command, Stdio};

use crate::config::CompactionSettings;
use crate::error::{CompactionError, RenderError};

/// Arguments for a `pdfwrite` pass at the given preset
fn compaction_args(settings: &CompactionSettings, input: &str, output: &str) -> Vec<String> {
    vec![
        "-sDEVICE=pdfwrite".to_string(),
        "-dCompatibilityLevel=1.4".to_string(),
        format!("-dPDFSETTINGS=/{}", settings.preset.as_str()),
        "-dNOPAUSE".to_string(),
        "-dQUIET".to_string(),
        "-dBATCH".to_string(),
        format!("-sOutputFile={}", output),
        input.to_string(),
    ]
}

/// Run the external tool once. Scratch files live in a temporary directory
/// that is removed when this returns, on success or failure.
pub fn compact(input: &[u8], settings: &CompactionSettings) -> Result<Vec<u8>, CompactionError> {
    let scratch = tempfile::Builder::new()
        .prefix("report-pdf-compact-")
        .tempdir()?;
    let in_path = scratch.path().join("input.pdf");
    let out_path = scratch.path().join("output.pdf");
    std::fs::write(&in_path, input)?;

    let args = compaction_args(
        settings,
        &in_path.to_string_lossy(),
        &out_path.to_string_lossy(),
    );
    let output = Command::new(&settings.binary)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            CompactionError::ToolUnavailable(format!("{}: {}", settings.binary.display(), e))
        })?;

    if !output.status.success() {
        return Err(CompactionError::ToolFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let compacted = std::fs::read(&out_path)?;
    if compacted.is_empty() {
        return Err(CompactionError::EmptyOutput);
    }
    Ok(compacted)
}

/// Compact `bytes` when they exceed the threshold; otherwise, or when
/// compaction fails or does not help, return them unchanged.
pub fn reduce_blocking(bytes: Vec<u8>, settings: &CompactionSettings) -> Vec<u8> {
    if bytes.len() <= settings.threshold_bytes {
        return bytes;
    }

    match compact(&bytes, settings) {
        Ok(compacted) if compacted.len() <= bytes.len() => {
            log::info!(
                "Compacted output from {} to {} bytes",
                bytes.len(),
                compacted.len()
            );
            compacted
        }
        Ok(compacted) => {
            log::info!(
                "Compaction grew output ({} > {} bytes); keeping original",
                compacted.len(),
                bytes.len()
            );
            bytes
        }
        Err(e) => {
            log::warn!("Compaction skipped: {}", e);
            bytes
        }
    }
}

/// [`reduce_blocking`] on the blocking thread pool
pub async fn reduce(bytes: Vec<u8>, settings: CompactionSettings) -> Result<Vec<u8>, RenderError> {
    tokio::task::spawn_blocking(move || reduce_blocking(bytes, &settings))
        .await
        .map_err(|e| RenderError::TaskAborted(e.to_string()))
}

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::sync::LazyLock;

/// Matches `filename=violations.csv`, `filename="a b.csv"` and `filename*=UTF-8''x.csv`
static FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'')?"?([^";]+)"?"#)
        .expect("Invalid Content-Disposition regex")
});

/// Violations report as returned by the export service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedReport {
    /// Filename suggested by the server, if any
    pub filename: Option<String>,
    /// CSV payload, one record per detected violation
    pub bytes: Vec<u8>,
}

impl ExportedReport {
    /// Number of data records (lines after the header)
    pub fn record_count(&self) -> usize {
        String::from_utf8_lossy(&self.bytes)
            .lines()
            .skip(1)
            .filter(|line| !line.trim().is_empty())
            .count()
    }
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// Only the final path component is kept, so a hostile header cannot point
/// the save outside the export directory.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let captures = FILENAME_PATTERN.captures(header)?;
    let raw = captures.get(1)?.as_str().trim();
    let name = Utf8Path::new(raw).file_name()?;

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Write the report under `dir`, using the server's filename or `default_name`.
///
/// # Returns
/// The path the report was saved to
pub async fn save_report(
    report: &ExportedReport,
    dir: &Utf8Path,
    default_name: &str,
) -> Result<Utf8PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory: {}", dir))?;

    let name = report.filename.as_deref().unwrap_or(default_name);
    let path = dir.join(name);

    tokio::fs::write(&path, &report.bytes)
        .await
        .with_context(|| format!("Failed to write report: {}", path))?;

    tracing::info!(
        "Saved violations report to {} ({} records)",
        path,
        report.record_count()
    );

    Ok(path)
}

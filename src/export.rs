use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::document::{render_pdf, PageLayout};
use crate::snapshots::Snapshot;

pub const DEFAULT_REPORT_TITLE: &str = "8086 Architecture Simulation Report";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON with a fixed key order.
    Json,
    /// Title plus the JSON text laid out on PDF pages.
    Pdf,
}

impl ExportFormat {
    pub fn from_name(name: &str) -> Option<ExportFormat> {
        match name {
            "json" => Some(ExportFormat::Json),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Json => "simulation-report.json",
            ExportFormat::Pdf => "simulation-report.pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Encodes snapshots into downloadable report bytes.
#[derive(Debug, Clone)]
pub struct ExportEncoder {
    title: String,
    layout: PageLayout,
}

impl ExportEncoder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            layout: PageLayout::default(),
        }
    }

    pub fn encode(&self, snapshot: &Snapshot, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        let json = serde_json::to_string_pretty(snapshot)?;

        let bytes = match format {
            ExportFormat::Json => json.into_bytes(),
            ExportFormat::Pdf => render_pdf(&self.title, &json, &self.layout),
        };

        tracing::debug!(format = format.name(), bytes = bytes.len(), "encoded snapshot");
        Ok(bytes)
    }
}

impl Default for ExportEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_TITLE)
    }
}

/// Hex SHA-256 of an artifact, used as its download ETag.
pub fn artifact_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

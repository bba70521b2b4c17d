use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::diagnostics::MemorySnapshot;
use crate::error::Result;
use crate::variants::{VariantRecord, VariantRun};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub initial: MemorySnapshot,
    #[serde(rename = "final")]
    pub final_: MemorySnapshot,
    pub timestamp: String,
}

/// Variant crawl results bundled with their diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantReport {
    pub results: Vec<VariantRecord>,
    pub total_processed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub memory_info: MemoryInfo,
}

impl VariantReport {
    pub fn new(run: VariantRun, initial: MemorySnapshot, final_: MemorySnapshot) -> Self {
        Self {
            results: run.results,
            total_processed: run.total_processed,
            error: run.error,
            memory_info: MemoryInfo {
                initial,
                final_,
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
        }
    }
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(mut out: W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    write_json(std::io::stdout().lock(), value)
}

pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_json(std::io::BufWriter::new(file), value)?;
    info!("💾 Results saved to '{}'", path.display());
    Ok(())
}

//! Best-effort evidence for humans: screenshots on failure and JS heap
//! figures while a long crawl runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::page::Page;

pub const DEBUG_SCREENSHOT: &str = "debug-screenshot.png";
pub const ERROR_SCREENSHOT: &str = "error-screenshot.png";

const MEMORY_SCRIPT: &str = r#"
    JSON.stringify((() => {
        if (typeof performance !== 'undefined' && performance.memory) {
            return {
                usedJSHeapSize: performance.memory.usedJSHeapSize,
                totalJSHeapSize: performance.memory.totalJSHeapSize,
                jsHeapSizeLimit: performance.memory.jsHeapSizeLimit,
                userAgent: navigator.userAgent
            };
        }
        return { error: 'Memory API not available' };
    })())
"#;

/// Outcome of a screenshot attempt. Inspected for logging, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Saved(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: PathBuf,
}

impl Diagnostics {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn capture<P: Page + ?Sized>(&self, page: &P, file_name: &str) -> Capture {
        let path = self.dir.join(file_name);
        let outcome = match page.screenshot().await {
            Ok(png) => match std::fs::write(&path, &png) {
                Ok(()) => Capture::Saved(path),
                Err(e) => Capture::Failed(format!("writing {}: {}", path.display(), e)),
            },
            Err(e) => Capture::Failed(format!("{:#}", e)),
        };

        match &outcome {
            Capture::Saved(path) => info!("📸 Screenshot saved to {}", path.display()),
            Capture::Failed(reason) => warn!("⚠️ Could not capture screenshot: {}", reason),
        }
        outcome
    }
}

/// JS heap figures reported by the page, or the reason they are missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemorySnapshot {
    #[serde(rename = "usedJSHeapSize", skip_serializing_if = "Option::is_none")]
    pub used_js_heap_size: Option<u64>,
    #[serde(rename = "totalJSHeapSize", skip_serializing_if = "Option::is_none")]
    pub total_js_heap_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js_heap_size_limit: Option<u64>,
    #[serde(rename = "usedMB", skip_serializing_if = "Option::is_none")]
    pub used_mb: Option<u64>,
    #[serde(rename = "totalMB", skip_serializing_if = "Option::is_none")]
    pub total_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

impl MemorySnapshot {
    pub async fn take<P: Page + ?Sized>(page: &P) -> Self {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut snapshot = match page.evaluate(MEMORY_SCRIPT).await {
            Ok(serde_json::Value::String(raw)) => {
                serde_json::from_str::<MemorySnapshot>(&raw).unwrap_or_else(|e| MemorySnapshot {
                    error: Some(format!("unreadable memory report: {}", e)),
                    ..Default::default()
                })
            }
            Ok(_) => MemorySnapshot {
                error: Some("Memory API not available".to_string()),
                ..Default::default()
            },
            Err(e) => MemorySnapshot {
                error: Some(format!("{:#}", e)),
                ..Default::default()
            },
        };

        snapshot.used_mb = snapshot.used_js_heap_size.map(to_mb);
        snapshot.total_mb = snapshot.total_js_heap_size.map(to_mb);
        snapshot.timestamp = timestamp;
        snapshot
    }

    pub fn summary(&self) -> String {
        match (self.used_mb, self.total_mb) {
            (Some(used), Some(total)) => format!("{}MB/{}MB", used, total),
            _ => self.error.clone().unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

fn to_mb(bytes: u64) -> u64 {
    (bytes as f64 / 1024.0 / 1024.0).round() as u64
}

/// Logs a memory snapshot every `interval` until stopped or dropped.
pub struct MemoryMonitor {
    handle: Option<JoinHandle<()>>,
}

impl MemoryMonitor {
    pub fn start<P>(page: Arc<P>, interval: Duration) -> Self
    where
        P: Page + ?Sized + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let snapshot = MemorySnapshot::take(page.as_ref()).await;
                info!("🧠 Current memory: {}", snapshot.summary());
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn stop(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for MemoryMonitor {
    fn drop(&mut self) {
        self.cancel();
    }
}

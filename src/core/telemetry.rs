use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Receives a notification for every handled request.
#[async_trait]
pub trait PageViewTracker: Send + Sync {
    async fn track_page_view(&self, path: &str) -> Result<()>;
}

/// Tracker used when analytics is not configured.
pub struct NoopTracker;

#[async_trait]
impl PageViewTracker for NoopTracker {
    async fn track_page_view(&self, path: &str) -> Result<()> {
        debug!(path = %path, "Analytics disabled, skipping page view");
        Ok(())
    }
}

/// Records a page view in the background. Failures are logged and never
/// reach the caller.
pub fn spawn_page_view(tracker: Arc<dyn PageViewTracker>, path: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = tracker.track_page_view(&path).await {
            warn!(error = %e, path = %path, "Failed to record page view");
        }
    })
}

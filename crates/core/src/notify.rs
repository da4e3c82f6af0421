use std::path::Path;

use async_trait::async_trait;

use crate::error::NotifyError;

/// Delivers a rendered report somewhere outside the process.
///
/// A failed delivery is logged by the caller and never interrupts polling.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, report: &Path, caption: &str) -> Result<(), NotifyError>;
}

pub mod reminders;
pub mod subscriptions;
pub mod telegram;
pub mod user;

use async_trait::async_trait;

use crate::app_error::AppResult;
use crate::domain::entities::audit::AuditEntry;

/// Write-only audit sink shared by the use cases.
#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> AppResult<()>;
}

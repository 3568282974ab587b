use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence, app_error::AppResult,
    domain::entities::audit::AuditEntry, use_cases::AuditRepo,
};

#[async_trait]
impl AuditRepo for PostgresPersistence {
    async fn record(&self, entry: &AuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"INSERT INTO audit_log (id, user_id, action, entity, entity_id, meta)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.user_id)
        .bind(entry.action.as_str())
        .bind(&entry.entity)
        .bind(entry.entity_id)
        .bind(&entry.meta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

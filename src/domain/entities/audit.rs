use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    SubscriptionStatusChanged,
    SubscriptionSnoozed,
    SubscriptionsImported,
    TelegramLinkCreated,
    TelegramLinkCompleted,
    NotificationTest,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "login",
            AuditAction::SubscriptionCreated => "subscription_created",
            AuditAction::SubscriptionUpdated => "subscription_updated",
            AuditAction::SubscriptionDeleted => "subscription_deleted",
            AuditAction::SubscriptionStatusChanged => "subscription_status_changed",
            AuditAction::SubscriptionSnoozed => "subscription_snoozed",
            AuditAction::SubscriptionsImported => "subscriptions_imported",
            AuditAction::TelegramLinkCreated => "telegram_link_created",
            AuditAction::TelegramLinkCompleted => "telegram_link_completed",
            AuditAction::NotificationTest => "notification_test",
        }
    }
}

/// Write-only audit record; readers query the table directly.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity: Option<String>,
    pub entity_id: Option<Uuid>,
    pub meta: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(user_id: Uuid, action: AuditAction) -> Self {
        Self {
            user_id: Some(user_id),
            action,
            entity: None,
            entity_id: None,
            meta: None,
        }
    }

    pub fn entity(mut self, entity: &str, entity_id: Uuid) -> Self {
        self.entity = Some(entity.to_string());
        self.entity_id = Some(entity_id);
        self
    }

    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

pub mod audit;
pub mod notification;
pub mod subscription;
pub mod telegram;
pub mod user;

use sqlx::PgPool;

/// All repository traits are implemented on this one pool wrapper; `setup`
/// hands it out as trait objects per concern.
pub struct PostgresPersistence {
    pub pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

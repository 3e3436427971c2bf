//! Push-recipient lookup implementations.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::kernel::traits::{BaseUserLookup, Recipient};

/// Resolves recipients from the `members` table.
pub struct PostgresUserLookup {
    pool: PgPool,
}

impl PostgresUserLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseUserLookup for PostgresUserLookup {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<Recipient>> {
        let row = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT id::text, push_token FROM members WHERE id::text = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, push_token)| Recipient { id, push_token }))
    }
}

/// Lookup that knows nobody. Used when the process runs without a database;
/// the dispatcher then skips every notification.
pub struct NullUserLookup;

#[async_trait]
impl BaseUserLookup for NullUserLookup {
    async fn find_by_id(&self, _user_id: &str) -> Result<Option<Recipient>> {
        Ok(None)
    }
}

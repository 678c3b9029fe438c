//! `users` table operations.

use serde_json::json;
use uuid::Uuid;

use lifeos_models::User;

use crate::client::SupabaseClient;
use crate::error::DbResult;

const TABLE: &str = "users";

impl SupabaseClient {
    /// Look up a user by username, password hash included.
    pub async fn find_user_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let rows: Vec<User> = self
            .select(TABLE, &[("username", username.to_string())], None, Some(1), None)
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Look up a user by id.
    pub async fn find_user_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let rows: Vec<User> = self
            .select(TABLE, &[("id", id.to_string())], None, Some(1), None)
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Create a user row. Uniqueness of `username` is enforced by the table.
    pub async fn insert_user(&self, username: &str, password_hash: &str) -> DbResult<User> {
        let body = json!({
            "username": username,
            "password_hash": password_hash,
        });
        self.insert(TABLE, &body).await
    }
}

use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, User};

impl Database {
    /// Create a user with the given name
    pub async fn insert_user(&self, name: &str) -> Result<User, DatabaseError> {
        let now = chrono::Utc::now().timestamp();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, created_at, updated_at
        "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Look up a user by name, creating it on first use
    pub async fn get_or_create_user(&self, name: &str) -> Result<User, DatabaseError> {
        if let Some(user) = self.find_user_by_name(name).await? {
            return Ok(user);
        }
        self.insert_user(name).await
    }
}

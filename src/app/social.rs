use anyhow::Result;
use sqlx::Row;
use tracing::info;

use crate::domain::social_graph::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Creates the `(follower, author)` edge. Returns `None` when the edge
    /// already exists or when both ids are the same user.
    pub async fn follow(&self, follower_id: i64, author_id: i64) -> Result<Option<Follow>> {
        let row = sqlx::query(
            "INSERT INTO follows (user_id, author_id) \
             SELECT $1, $2 \
             WHERE $1 <> $2 \
             ON CONFLICT DO NOTHING \
             RETURNING user_id, author_id, created_at",
        )
        .bind(follower_id)
        .bind(author_id)
        .fetch_optional(self.db.pool())
        .await?;

        let follow = row.map(|row| Follow {
            user_id: row.get("user_id"),
            author_id: row.get("author_id"),
            created_at: row.get("created_at"),
        });

        if follow.is_some() {
            info!(follower_id, author_id, "follow edge created");
        }
        Ok(follow)
    }

    /// Removes the edge to the author with `username`, if any.
    pub async fn unfollow(&self, follower_id: i64, username: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM follows \
             WHERE user_id = $1 \
               AND author_id = (SELECT id FROM users WHERE username = $2)",
        )
        .bind(follower_id)
        .bind(username)
        .execute(self.db.pool())
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(follower_id, author = %username, "follow edge removed");
        }
        Ok(removed)
    }

    pub async fn edge_exists(&self, follower_id: i64, author_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(follower_id)
        .bind(author_id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(exists)
    }
}

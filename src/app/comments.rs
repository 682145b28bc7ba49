use anyhow::Result;
use sqlx::Row;

use crate::domain::comment::Comment;
use crate::domain::user::Author;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Author and post are fixed at creation and never reassigned.
    pub async fn add_comment(&self, author_id: i64, post_id: i64, text: String) -> Result<Comment> {
        let row = sqlx::query(
            "WITH c AS ( \
                INSERT INTO comments (author_id, post_id, text) VALUES ($1, $2, $3) \
                RETURNING id, post_id, author_id, text, created \
             ) \
             SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created \
             FROM c JOIN users u ON u.id = c.author_id",
        )
        .bind(author_id)
        .bind(post_id)
        .bind(text)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Comment {
            id: row.get("id"),
            post_id: row.get("post_id"),
            author: Author {
                id: row.get("author_id"),
                username: row.get("author_username"),
            },
            text: row.get("text"),
            created: row.get("created"),
        })
    }

    /// Newest first.
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = $1 \
             ORDER BY c.created DESC, c.id DESC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            comments.push(Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author: Author {
                    id: row.get("author_id"),
                    username: row.get("author_username"),
                },
                text: row.get("text"),
                created: row.get("created"),
            });
        }

        Ok(comments)
    }
}

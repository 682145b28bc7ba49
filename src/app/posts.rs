use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::group::GroupRef;
use crate::domain::post::Post;
use crate::domain::user::Author;
use crate::infra::db::Db;

/// Column list shared by every post query; expects `p`, `u` and `g` aliases.
pub(crate) const POST_COLUMNS: &str = "p.id, p.text, p.pub_date, p.image, \
     p.author_id, u.username AS author_username, \
     p.group_id, g.title AS group_title, g.slug AS group_slug";

pub(crate) const POST_JOINS: &str = "JOIN users u ON u.id = p.author_id \
     LEFT JOIN post_groups g ON g.id = p.group_id";

pub(crate) fn post_from_row(row: &PgRow) -> Post {
    let group_id: Option<i64> = row.get("group_id");
    let group = group_id.map(|id| GroupRef {
        id,
        title: row.get("group_title"),
        slug: row.get("group_slug"),
    });

    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author: Author {
            id: row.get("author_id"),
            username: row.get("author_username"),
        },
        group,
        image: row.get("image"),
        image_url: None,
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// The author always comes from the session, never from submitted data.
    pub async fn create_post(
        &self,
        author_id: i64,
        text: String,
        group_id: Option<i64>,
        image: Option<String>,
    ) -> Result<Post> {
        let sql = format!(
            "WITH p AS ( \
                INSERT INTO posts (author_id, text, group_id, image) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, text, pub_date, image, author_id, group_id \
             ) \
             SELECT {POST_COLUMNS} FROM p {POST_JOINS}"
        );
        let row = sqlx::query(&sql)
            .bind(author_id)
            .bind(text)
            .bind(group_id)
            .bind(image)
            .fetch_one(self.db.pool())
            .await?;

        Ok(post_from_row(&row))
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p {POST_JOINS} WHERE p.id = $1");
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Replaces text and group. The image is only replaced when a new one
    /// is given. Returns `None` when the post does not exist or belongs to
    /// someone else.
    pub async fn update_post(
        &self,
        post_id: i64,
        author_id: i64,
        text: String,
        group_id: Option<i64>,
        image: Option<String>,
    ) -> Result<Option<Post>> {
        let sql = format!(
            "WITH p AS ( \
                UPDATE posts \
                SET text = $3, group_id = $4, image = COALESCE($5, image) \
                WHERE id = $1 AND author_id = $2 \
                RETURNING id, text, pub_date, image, author_id, group_id \
             ) \
             SELECT {POST_COLUMNS} FROM p {POST_JOINS}"
        );
        let row = sqlx::query(&sql)
            .bind(post_id)
            .bind(author_id)
            .bind(text)
            .bind(group_id)
            .bind(image)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    pub async fn count_by_author(&self, author_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = $1")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

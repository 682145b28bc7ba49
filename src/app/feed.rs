use anyhow::Result;
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::debug;

use crate::app::pagination::{Page, Paginator, POSTS_PER_PAGE};
use crate::app::posts::{post_from_row, POST_COLUMNS, POST_JOINS};
use crate::domain::post::Post;
use crate::infra::db::Db;

/// Which posts a feed shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFilter {
    All,
    GroupSlug(String),
    Author(i64),
    FollowedBy(i64),
}

impl FeedFilter {
    fn push_where(&self, query: &mut QueryBuilder<'_, Postgres>) {
        match self {
            Self::All => {}
            Self::GroupSlug(slug) => {
                query.push(" WHERE g.slug = ").push_bind(slug.clone());
            }
            Self::Author(author_id) => {
                query.push(" WHERE p.author_id = ").push_bind(*author_id);
            }
            Self::FollowedBy(user_id) => {
                query
                    .push(" WHERE p.author_id IN (SELECT author_id FROM follows WHERE user_id = ")
                    .push_bind(*user_id)
                    .push(")");
            }
        }
    }
}

#[derive(Clone)]
pub struct FeedService {
    db: Db,
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn global(&self, page: Option<&str>) -> Result<Page<Post>> {
        self.page(&FeedFilter::All, page).await
    }

    /// An unknown slug gives an empty page.
    pub async fn by_group(&self, slug: &str, page: Option<&str>) -> Result<Page<Post>> {
        self.page(&FeedFilter::GroupSlug(slug.to_string()), page).await
    }

    pub async fn by_author(&self, author_id: i64, page: Option<&str>) -> Result<Page<Post>> {
        self.page(&FeedFilter::Author(author_id), page).await
    }

    /// Posts by authors the viewer follows.
    pub async fn following(&self, viewer_id: i64, page: Option<&str>) -> Result<Page<Post>> {
        self.page(&FeedFilter::FollowedBy(viewer_id), page).await
    }

    async fn page(&self, filter: &FeedFilter, page: Option<&str>) -> Result<Page<Post>> {
        let total = self.count(filter).await?;
        let window = Paginator::new(total, POSTS_PER_PAGE).window(page);

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {POST_COLUMNS} FROM posts p {POST_JOINS}"
        ));
        filter.push_where(&mut query);
        query
            .push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);

        let rows = query.build().fetch_all(self.db.pool()).await?;
        let posts: Vec<Post> = rows.iter().map(post_from_row).collect();

        debug!(filter = ?filter, page = window.number, total, "assembled feed page");
        Ok(window.into_page(posts))
    }

    async fn count(&self, filter: &FeedFilter) -> Result<i64> {
        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT COUNT(*) FROM posts p {POST_JOINS}"
        ));
        filter.push_where(&mut query);

        let row = query.build().fetch_one(self.db.pool()).await?;
        Ok(row.get::<i64, _>(0))
    }
}

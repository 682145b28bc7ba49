use anyhow::Result;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::warn;

use crate::infra::cache::RedisCache;

const GENERATION_KEY: &str = "page:generation";

/// Rendered-page cache keyed by request URI.
///
/// Every key embeds the current generation number, so bumping the generation
/// drops all cached pages at once. Redis failures never fail a request: reads
/// miss and writes are skipped.
#[derive(Clone)]
pub struct PageCache {
    cache: RedisCache,
    ttl_seconds: u64,
}

impl PageCache {
    pub fn new(cache: RedisCache, ttl_seconds: u64) -> Self {
        Self { cache, ttl_seconds }
    }

    pub async fn get(&self, route: &str) -> Option<String> {
        if self.ttl_seconds == 0 {
            return None;
        }
        let mut conn = self.connection().await?;
        let key = match page_key(&mut conn, route).await {
            Ok(key) => key,
            Err(err) => {
                warn!(error = ?err, route, "failed to read page cache generation");
                return None;
            }
        };
        match conn.get::<_, Option<String>>(&key).await {
            Ok(body) => body,
            Err(err) => {
                warn!(error = ?err, route, "failed to read page cache");
                None
            }
        }
    }

    pub async fn put(&self, route: &str, body: &str) {
        if self.ttl_seconds == 0 {
            return;
        }
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let key = match page_key(&mut conn, route).await {
            Ok(key) => key,
            Err(err) => {
                warn!(error = ?err, route, "failed to read page cache generation");
                return;
            }
        };
        if let Err(err) = conn.set_ex::<_, _, ()>(&key, body, self.ttl_seconds).await {
            warn!(error = ?err, route, "failed to write page cache");
        }
    }

    /// Drops every cached page. Called after each write that changes a feed.
    pub async fn invalidate(&self) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        if let Err(err) = conn.incr::<_, _, i64>(GENERATION_KEY, 1).await {
            warn!(error = ?err, "failed to invalidate page cache");
        }
    }

    async fn connection(&self) -> Option<MultiplexedConnection> {
        match self.cache.connection().await {
            Ok(conn) => Some(conn),
            Err(err) => {
                warn!(error = ?err, "page cache unavailable");
                None
            }
        }
    }
}

async fn page_key(conn: &mut MultiplexedConnection, route: &str) -> Result<String> {
    let generation: Option<i64> = conn.get(GENERATION_KEY).await?;
    Ok(format_key(generation.unwrap_or(0), route))
}

fn format_key(generation: i64, route: &str) -> String {
    format!("page:{}:{}", generation, route)
}

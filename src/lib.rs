pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::page_cache::PageCache;
use crate::infra::{cache::RedisCache, db::Db, storage::ObjectStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub storage: ObjectStorage,
    pub page_cache: PageCache,
    pub session_key: [u8; 32],
    pub session_ttl_hours: u64,
    pub secure_cookies: bool,
    pub upload_max_bytes: usize,
}

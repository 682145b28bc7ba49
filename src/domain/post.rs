use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::group::GroupRef;
use crate::domain::user::Author;

/// Number of characters a post shows when displayed as a title.
pub const TITLE_SYMBOL_VIEW: usize = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author: Author,
    pub group: Option<GroupRef>,
    /// Object key of the attached image.
    pub image: Option<String>,
    /// Public URL for the image (populated at response time)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Post {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author.id == user_id
    }
}

impl std::fmt::Display for Post {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let title: String = self.text.chars().take(TITLE_SYMBOL_VIEW).collect();
        f.write_str(&title)
    }
}

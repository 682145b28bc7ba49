use anyhow::{anyhow, Result};
use bytes::Bytes;
use image::GenericImageView;
use tracing::info;
use uuid::Uuid;

use crate::domain::post::Post;
use crate::infra::storage::ObjectStorage;

/// An image file received with a post form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone)]
pub struct MediaService {
    storage: ObjectStorage,
}

impl MediaService {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }

    /// Decodes the upload to make sure it really is an image.
    pub fn inspect(upload: &UploadedImage) -> Result<ImageInfo> {
        let format = image::guess_format(&upload.bytes)
            .map_err(|err| anyhow!("unrecognised image format: {}", err))?;
        let decoded = image::load_from_memory_with_format(&upload.bytes, format)
            .map_err(|err| anyhow!("failed to decode image: {}", err))?;
        let (width, height) = decoded.dimensions();

        Ok(ImageInfo {
            content_type: format.to_mime_type(),
            width,
            height,
        })
    }

    /// Stores a validated upload and returns its object key.
    pub async fn store_post_image(&self, upload: &UploadedImage, info: &ImageInfo) -> Result<String> {
        let key = format!(
            "posts/{}/{}",
            Uuid::new_v4().simple(),
            sanitize_filename(&upload.filename)
        );
        self.storage
            .put_object(&key, upload.bytes.clone(), info.content_type)
            .await?;

        info!(
            key = %key,
            width = info.width,
            height = info.height,
            bytes = upload.bytes.len(),
            "stored post image"
        );
        Ok(key)
    }

    /// Removes an image that never made it onto a post.
    pub async fn discard_post_image(&self, key: &str) -> Result<()> {
        self.storage.delete_object(key).await?;
        info!(key = %key, "discarded post image");
        Ok(())
    }

    pub fn attach_image_url(&self, post: &mut Post) {
        post.image_url = post.image.as_deref().map(|key| self.storage.public_url(key));
    }

    pub fn attach_image_urls(&self, posts: &mut [Post]) {
        for post in posts {
            self.attach_image_url(post);
        }
    }
}

fn sanitize_filename(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

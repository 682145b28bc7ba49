use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderMap};
use bytes::Bytes;
use url::form_urlencoded;

use crate::app::media::UploadedImage;
use crate::http::AppError;
use crate::AppState;

const IMAGE_FIELD: &str = "image";

/// A submitted HTML form, either url-encoded or multipart.
///
/// Text fields land in `fields`; a non-empty file in the `image` part lands in
/// `image`. Other file parts are ignored.
#[derive(Debug, Default)]
pub struct Submission {
    pub fields: HashMap<String, String>,
    pub image: Option<UploadedImage>,
}

#[axum::async_trait]
impl FromRequest<AppState> for Submission {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        match media_type(req.headers()).as_deref() {
            Some("multipart/form-data") => {}
            Some("application/x-www-form-urlencoded") => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|err| AppError::bad_request(err.to_string()))?;
                return Ok(Self {
                    fields: form_urlencoded::parse(&body).into_owned().collect(),
                    image: None,
                });
            }
            // Anything else carries no form fields.
            other => {
                tracing::debug!(content_type = ?other, "ignoring non-form request body");
                return Ok(Self::default());
            }
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|err| AppError::bad_request(err.to_string()))?;

        let mut submission = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::bad_request(err.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let filename = field.file_name().map(str::to_string);

            match filename {
                Some(filename) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|err| AppError::bad_request(err.to_string()))?;
                    if name == IMAGE_FIELD && !filename.is_empty() && !bytes.is_empty() {
                        submission.image = Some(UploadedImage { filename, bytes });
                    }
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|err| AppError::bad_request(err.to_string()))?;
                    submission.fields.insert(name, value);
                }
            }
        }

        Ok(submission)
    }
}

/// The lower-cased media type of the request, without parameters.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next().unwrap_or_default().trim();
    (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
}

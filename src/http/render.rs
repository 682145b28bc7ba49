use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::http::AppError;

/// A named template plus the context it is rendered with.
///
/// Rendering itself happens outside this service; responses carry
/// `{"template": ..., "context": ...}` as JSON.
#[derive(Debug, Serialize)]
pub struct Template<C> {
    template: &'static str,
    context: C,
}

impl<C: Serialize> Template<C> {
    pub fn new(template: &'static str, context: C) -> Self {
        Self { template, context }
    }

    pub fn to_body(&self) -> Result<String, AppError> {
        serde_json::to_string(self).map_err(|err| {
            tracing::error!(error = ?err, template = self.template, "failed to serialize template context");
            AppError::internal("failed to render page")
        })
    }
}

impl<C: Serialize> IntoResponse for Template<C> {
    fn into_response(self) -> Response {
        match self.to_body() {
            Ok(body) => json_body(body),
            Err(err) => err.into_response(),
        }
    }
}

/// Wraps an already serialized page.
pub fn json_body(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

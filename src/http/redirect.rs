use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

pub const LOGIN_PATH: &str = "/auth/login/";

/// Everything but unreserved path characters is escaped inside `next`.
const NEXT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// 302 to `location`.
pub fn found(location: impl Into<String>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.into())]).into_response()
}

/// 301 to the same path with a trailing slash, keeping the query string.
pub async fn append_slash(uri: Uri) -> Response {
    let mut location = with_trailing_slash(uri.path());
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }
    (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response()
}

/// Login page URL whose `next` is the slash-terminated path plus the
/// original query string.
pub fn login_url(path_and_query: &str) -> String {
    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };
    let mut next = with_trailing_slash(path);
    if let Some(query) = query.filter(|query| !query.is_empty()) {
        next.push('?');
        next.push_str(query);
    }
    format!("{}?next={}", LOGIN_PATH, utf8_percent_encode(&next, NEXT_SET))
}

/// Keeps `next` only when it points back into this site.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(next) if is_local_path(next) => next.to_string(),
        _ => "/".to_string(),
    }
}

/// The `Referer` reduced to path and query, or `fallback` when absent or
/// unusable.
pub fn referer_or(headers: &HeaderMap, fallback: &str) -> String {
    headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(referer_path)
        .unwrap_or_else(|| fallback.to_string())
}

fn referer_path(raw: &str) -> Option<String> {
    if is_local_path(raw) {
        return Some(raw.to_string());
    }
    let url = Url::parse(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let mut path = url.path().to_string();
    if let Some(query) = url.query() {
        path.push('?');
        path.push_str(query);
    }
    Some(path)
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_referer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::REFERER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn login_url_uses_slash_terminated_next() {
        assert_eq!(
            login_url("/posts/7/comment"),
            "/auth/login/?next=/posts/7/comment/"
        );
        assert_eq!(login_url("/create/"), "/auth/login/?next=/create/");
        assert_eq!(
            login_url("/profile/a+b@c/follow/"),
            "/auth/login/?next=/profile/a%2Bb%40c/follow/"
        );
    }

    #[test]
    fn login_url_keeps_the_query_in_next() {
        assert_eq!(
            login_url("/follow/?page=2"),
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );
        assert_eq!(
            login_url("/posts/7/edit?tab=1&x=y"),
            "/auth/login/?next=/posts/7/edit/%3Ftab%3D1%26x%3Dy"
        );
        assert_eq!(login_url("/create/?"), "/auth/login/?next=/create/");
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/follow/")), "/follow/");
        assert_eq!(safe_next(Some("//evil.example/")), "/");
        assert_eq!(safe_next(Some("https://evil.example/")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn referer_is_reduced_to_path_and_query() {
        let headers = headers_with_referer("http://testserver/group/cats/?page=2");
        assert_eq!(referer_or(&headers, "/profile/bob/"), "/group/cats/?page=2");

        let headers = headers_with_referer("https://elsewhere.example/steal");
        assert_eq!(referer_or(&headers, "/profile/bob/"), "/steal");

        let headers = headers_with_referer("/follow/");
        assert_eq!(referer_or(&headers, "/profile/bob/"), "/follow/");
    }

    #[test]
    fn missing_or_odd_referer_falls_back() {
        assert_eq!(referer_or(&HeaderMap::new(), "/profile/bob/"), "/profile/bob/");

        let headers = headers_with_referer("javascript:alert(1)");
        assert_eq!(referer_or(&headers, "/profile/bob/"), "/profile/bob/");

        let headers = headers_with_referer("not a url");
        assert_eq!(referer_or(&headers, "/profile/bob/"), "/profile/bob/");
    }
}

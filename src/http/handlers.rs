use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::feed::FeedService;
use crate::app::forms::{
    add_error, CommentForm, CredentialsForm, FieldErrors, FormContext, PostForm,
    INVALID_CHOICE_MESSAGE, INVALID_IMAGE_MESSAGE, INVALID_LOGIN_MESSAGE, NON_FIELD_ERRORS,
    USERNAME_TAKEN_MESSAGE,
};
use crate::app::groups::GroupService;
use crate::app::media::{ImageInfo, MediaService, UploadedImage};
use crate::app::pagination::Page;
use crate::app::posts::PostService;
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::comment::Comment;
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::domain::user::User;
use crate::http::auth::SESSION_COOKIE;
use crate::http::form::Submission;
use crate::http::redirect::{self, found, referer_or};
use crate::http::render::{json_body, Template};
use crate::http::{AppError, AuthUser};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

fn internal(message: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |err| {
        tracing::error!(error = ?err, "{}", message);
        AppError::internal(message)
    }
}

/// Post ids that do not parse can never match a post.
fn parse_post_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found("post not found"))
}

fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

fn post_url(post_id: i64) -> String {
    format!("/posts/{}/", post_id)
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

pub async fn not_found() -> AppError {
    AppError::not_found("page not found")
}

// ---------------------------------------------------------------------------
// Read views
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct IndexContext {
    pub page_obj: Page<Post>,
}

/// Global feed, served from the page cache when possible.
pub async fn index(
    State(state): State<AppState>,
    uri: Uri,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let route = uri
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    if let Some(body) = state.page_cache.get(&route).await {
        tracing::debug!(route = %route, "page cache hit");
        return Ok(json_body(body));
    }

    let mut page = FeedService::new(state.db.clone())
        .global(query.page.as_deref())
        .await
        .map_err(internal("failed to load posts"))?;
    MediaService::new(state.storage.clone()).attach_image_urls(&mut page.items);

    let body = Template::new("posts/index.html", IndexContext { page_obj: page }).to_body()?;
    state.page_cache.put(&route, &body).await;
    Ok(json_body(body))
}

#[derive(Serialize)]
pub struct GroupContext {
    pub group: Group,
    pub page_obj: Page<Post>,
}

pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Template<GroupContext>, AppError> {
    let group = GroupService::new(state.db.clone())
        .get_by_slug(&slug)
        .await
        .map_err(internal("failed to load group"))?
        .ok_or_else(|| AppError::not_found("group not found"))?;

    let mut page = FeedService::new(state.db.clone())
        .by_group(&group.slug, query.page.as_deref())
        .await
        .map_err(internal("failed to load posts"))?;
    MediaService::new(state.storage.clone()).attach_image_urls(&mut page.items);

    Ok(Template::new(
        "posts/group_list.html",
        GroupContext {
            group,
            page_obj: page,
        },
    ))
}

#[derive(Serialize)]
pub struct ProfileContext {
    pub author: User,
    pub author_posts_count: i64,
    pub following: bool,
    pub page_obj: Page<Post>,
}

pub async fn profile(
    State(state): State<AppState>,
    viewer: Option<AuthUser>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Template<ProfileContext>, AppError> {
    let author = UserService::new(state.db.clone())
        .get_by_username(&username)
        .await
        .map_err(internal("failed to load user"))?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    let mut page = FeedService::new(state.db.clone())
        .by_author(author.id, query.page.as_deref())
        .await
        .map_err(internal("failed to load posts"))?;
    MediaService::new(state.storage.clone()).attach_image_urls(&mut page.items);

    let following = match viewer {
        Some(viewer) => SocialService::new(state.db.clone())
            .edge_exists(viewer.user_id, author.id)
            .await
            .map_err(internal("failed to load follow state"))?,
        None => false,
    };

    Ok(Template::new(
        "posts/profile.html",
        ProfileContext {
            author_posts_count: page.total_count,
            author,
            following,
            page_obj: page,
        },
    ))
}

#[derive(Serialize)]
pub struct PostDetailContext {
    pub post: Post,
    pub author_posts: i64,
    pub comments: Vec<Comment>,
    pub form: FormContext,
}

pub async fn post_detail(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Template<PostDetailContext>, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let service = PostService::new(state.db.clone());
    let mut post = service
        .get_post(post_id)
        .await
        .map_err(internal("failed to load post"))?
        .ok_or_else(|| AppError::not_found("post not found"))?;
    MediaService::new(state.storage.clone()).attach_image_url(&mut post);

    let author_posts = service
        .count_by_author(post.author.id)
        .await
        .map_err(internal("failed to count posts"))?;
    let comments = CommentService::new(state.db.clone())
        .list_for_post(post_id)
        .await
        .map_err(internal("failed to load comments"))?;

    Ok(Template::new(
        "posts/post_detail.html",
        PostDetailContext {
            post,
            author_posts,
            comments,
            form: FormContext::comment(),
        },
    ))
}

#[derive(Serialize)]
pub struct FollowContext {
    pub post_count: i64,
    pub page_obj: Page<Post>,
}

/// Posts by the authors the viewer follows.
pub async fn follow_index(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Template<FollowContext>, AppError> {
    let mut page = FeedService::new(state.db.clone())
        .following(user.user_id, query.page.as_deref())
        .await
        .map_err(internal("failed to load posts"))?;
    MediaService::new(state.storage.clone()).attach_image_urls(&mut page.items);

    Ok(Template::new(
        "posts/follow.html",
        FollowContext {
            post_count: page.total_count,
            page_obj: page,
        },
    ))
}

// ---------------------------------------------------------------------------
// Post forms
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PostFormContext {
    pub form: FormContext,
    pub is_edit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<i64>,
}

/// A post submission that passed every check.
struct PostDraft {
    text: String,
    group_id: Option<i64>,
    image: Option<(UploadedImage, ImageInfo)>,
}

async fn clean_post_submission(
    state: &AppState,
    form: &PostForm,
    image: Option<UploadedImage>,
) -> Result<Result<PostDraft, FieldErrors>, AppError> {
    let (cleaned, mut errors) = match form.clean() {
        Ok(cleaned) => (Some(cleaned), FieldErrors::new()),
        Err(errors) => (None, errors),
    };

    if let Some(group_id) = cleaned.as_ref().and_then(|cleaned| cleaned.group_id) {
        let group = GroupService::new(state.db.clone())
            .get(group_id)
            .await
            .map_err(internal("failed to load group"))?;
        if group.is_none() {
            add_error(&mut errors, "group", INVALID_CHOICE_MESSAGE);
        }
    }

    let image = match image {
        Some(upload) => {
            let inspected = tokio::task::spawn_blocking(move || {
                let info = MediaService::inspect(&upload);
                (upload, info)
            })
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, "image inspection task failed");
                AppError::internal("failed to process image")
            })?;
            match inspected {
                (upload, Ok(info)) => Some((upload, info)),
                (upload, Err(err)) => {
                    tracing::debug!(error = ?err, filename = %upload.filename, "rejected upload");
                    add_error(&mut errors, "image", INVALID_IMAGE_MESSAGE);
                    None
                }
            }
        }
        None => None,
    };

    match cleaned {
        Some(cleaned) if errors.is_empty() => Ok(Ok(PostDraft {
            text: cleaned.text,
            group_id: cleaned.group_id,
            image,
        })),
        _ => Ok(Err(errors)),
    }
}

async fn store_draft_image(state: &AppState, draft: &PostDraft) -> Result<Option<String>, AppError> {
    match &draft.image {
        Some((upload, info)) => {
            let key = MediaService::new(state.storage.clone())
                .store_post_image(upload, info)
                .await
                .map_err(internal("failed to store image"))?;
            Ok(Some(key))
        }
        None => Ok(None),
    }
}

async fn render_post_form(
    state: &AppState,
    form: &PostForm,
    errors: FieldErrors,
    post_id: Option<i64>,
) -> Result<Response, AppError> {
    let groups = GroupService::new(state.db.clone())
        .list()
        .await
        .map_err(internal("failed to load groups"))?;

    Ok(Template::new(
        "posts/create_post.html",
        PostFormContext {
            form: FormContext::post(form, errors, &groups),
            is_edit: post_id.is_some(),
            post_id,
        },
    )
    .into_response())
}

pub async fn post_create_form(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Response, AppError> {
    render_post_form(&state, &PostForm::default(), FieldErrors::new(), None).await
}

pub async fn post_create(
    State(state): State<AppState>,
    user: AuthUser,
    submission: Submission,
) -> Result<Response, AppError> {
    let form = PostForm::from_fields(&submission.fields);
    let draft = match clean_post_submission(&state, &form, submission.image).await? {
        Ok(draft) => draft,
        Err(errors) => return render_post_form(&state, &form, errors, None).await,
    };

    let image = store_draft_image(&state, &draft).await?;
    let post = PostService::new(state.db.clone())
        .create_post(user.user_id, draft.text, draft.group_id, image)
        .await
        .map_err(internal("failed to create post"))?;
    state.page_cache.invalidate().await;

    tracing::info!(post_id = post.id, user_id = user.user_id, "post created");
    Ok(found(profile_url(&user.username)))
}

async fn load_own_post(
    state: &AppState,
    user: &AuthUser,
    post_id: i64,
) -> Result<Result<Post, Response>, AppError> {
    let post = PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(internal("failed to load post"))?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    if !post.is_authored_by(user.user_id) {
        tracing::debug!(post_id, user_id = user.user_id, "edit by non-author redirected");
        return Ok(Err(found(post_url(post_id))));
    }
    Ok(Ok(post))
}

pub async fn post_edit_form(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let post = match load_own_post(&state, &user, post_id).await? {
        Ok(post) => post,
        Err(redirect) => return Ok(redirect),
    };

    render_post_form(&state, &PostForm::from_post(&post), FieldErrors::new(), Some(post_id)).await
}

pub async fn post_edit(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
    submission: Submission,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    if let Err(redirect) = load_own_post(&state, &user, post_id).await? {
        return Ok(redirect);
    }

    let form = PostForm::from_fields(&submission.fields);
    let draft = match clean_post_submission(&state, &form, submission.image).await? {
        Ok(draft) => draft,
        Err(errors) => return render_post_form(&state, &form, errors, Some(post_id)).await,
    };

    let image = store_draft_image(&state, &draft).await?;
    let updated = PostService::new(state.db.clone())
        .update_post(post_id, user.user_id, draft.text, draft.group_id, image.clone())
        .await
        .map_err(internal("failed to update post"))?;
    match (updated, image) {
        (Some(_), _) => {
            state.page_cache.invalidate().await;
            tracing::info!(post_id, user_id = user.user_id, "post updated");
        }
        // The post vanished or changed hands after the authorship check.
        (None, Some(key)) => {
            if let Err(err) = MediaService::new(state.storage.clone())
                .discard_post_image(&key)
                .await
            {
                tracing::warn!(error = ?err, key = %key, "failed to discard orphaned image");
            }
        }
        (None, None) => {}
    }

    Ok(found(post_url(post_id)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<String>,
    submission: Submission,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let post = PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(internal("failed to load post"))?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    match CommentForm::from_fields(&submission.fields).clean() {
        Ok(text) => {
            let comment = CommentService::new(state.db.clone())
                .add_comment(user.user_id, post.id, text)
                .await
                .map_err(internal("failed to add comment"))?;
            tracing::info!(comment_id = comment.id, post_id, user_id = user.user_id, "comment added");
        }
        Err(errors) => {
            tracing::debug!(post_id, errors = ?errors, "blank comment ignored");
        }
    }

    Ok(found(post_url(post_id)))
}

// ---------------------------------------------------------------------------
// Following
// ---------------------------------------------------------------------------

pub async fn profile_follow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let author = UserService::new(state.db.clone())
        .get_by_username(&username)
        .await
        .map_err(internal("failed to load user"))?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    if author.id == user.user_id {
        return Ok(found(referer_or(&headers, &profile_url(&author.username))));
    }

    SocialService::new(state.db.clone())
        .follow(user.user_id, author.id)
        .await
        .map_err(internal("failed to follow user"))?;

    Ok(found(profile_url(&author.username)))
}

pub async fn profile_unfollow(
    State(state): State<AppState>,
    user: AuthUser,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    SocialService::new(state.db.clone())
        .unfollow(user.user_id, &username)
        .await
        .map_err(internal("failed to unfollow user"))?;

    Ok(found(referer_or(&headers, &profile_url(&username))))
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct CredentialsContext {
    pub form: FormContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.session_key, state.session_ttl_hours)
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookies)
        .build()
}

fn credentials_page(
    template: &'static str,
    username: &str,
    errors: FieldErrors,
    next: Option<String>,
) -> Response {
    Template::new(
        template,
        CredentialsContext {
            form: FormContext::credentials(username, errors),
            next,
        },
    )
    .into_response()
}

pub async fn signup_form() -> Response {
    credentials_page("users/signup.html", "", FieldErrors::new(), None)
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    submission: Submission,
) -> Result<Response, AppError> {
    let form = CredentialsForm::from_fields(&submission.fields);
    let (username, password) = match form.clean() {
        Ok(credentials) => credentials,
        Err(errors) => {
            return Ok(credentials_page("users/signup.html", &form.username, errors, None))
        }
    };

    let service = auth_service(&state);
    let user = service
        .signup(&username, &password)
        .await
        .map_err(internal("failed to sign up"))?;
    let Some(user) = user else {
        let mut errors = FieldErrors::new();
        add_error(&mut errors, "username", USERNAME_TAKEN_MESSAGE);
        return Ok(credentials_page("users/signup.html", &username, errors, None));
    };

    let token = service
        .issue_session(user.id, &user.username)
        .map_err(internal("failed to issue session"))?;
    Ok((jar.add(session_cookie(&state, token)), found("/")).into_response())
}

pub async fn login_form(Query(query): Query<NextQuery>) -> Response {
    credentials_page("users/login.html", "", FieldErrors::new(), query.next)
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<NextQuery>,
    submission: Submission,
) -> Result<Response, AppError> {
    let next = submission.fields.get("next").cloned().or(query.next);
    let form = CredentialsForm::from_fields(&submission.fields);
    let (username, password) = match form.clean() {
        Ok(credentials) => credentials,
        Err(errors) => {
            return Ok(credentials_page("users/login.html", &form.username, errors, next))
        }
    };

    let result = auth_service(&state)
        .login(&username, &password)
        .await
        .map_err(internal("failed to login"))?;
    let Some((user, token)) = result else {
        let mut errors = FieldErrors::new();
        add_error(&mut errors, NON_FIELD_ERRORS, INVALID_LOGIN_MESSAGE);
        return Ok(credentials_page("users/login.html", &username, errors, next));
    };

    tracing::info!(user_id = user.id, "user logged in");
    let location = redirect::safe_next(next.as_deref());
    Ok((jar.add(session_cookie(&state, token)), found(location)).into_response())
}

pub async fn logout(jar: CookieJar) -> Response {
    let removal = Cookie::build((SESSION_COOKIE, "")).path("/");
    (jar.remove(removal), found("/")).into_response()
}

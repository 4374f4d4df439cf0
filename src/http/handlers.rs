use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::access::{self, Access};
use crate::app::auth::{NewAccount, PasswordChange, TokenKind, TokenPair};
use crate::app::engagement::EngagementService;
use crate::app::feed::{FeedFilter, FeedService};
use crate::app::posts::PostService;
use crate::app::search::SearchService;
use crate::app::social::SocialService;
use crate::app::users::{ProfileUpdate, UserService};
use crate::domain::calendar;
use crate::domain::engagement::{Comment, CommentView, Like};
use crate::domain::post::{LikedPost, Post, PostView};
use crate::domain::social_graph::{FollowOutcome, SocialUserEdge, UnfollowOutcome};
use crate::domain::user::{PublicUser, SearchUser, User};
use crate::http::error::FieldErrors;
use crate::http::pagination::{ListResponse, PaginationQuery};
use crate::http::validate::{
    normalize_email, Validator, BIO_MAX_CHARS, COMMENT_MAX_CHARS, NAME_MAX_CHARS,
    PASSWORD_MAX_CHARS, POST_MAX_CHARS,
};
use crate::http::{AppError, AuthUser};
use crate::infra::db::is_unique_violation;
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.db.ping().await {
        Ok(()) => "ok",
        Err(err) => {
            tracing::warn!(error = ?err, "database ping failed");
            "degraded"
        }
    };

    Json(HealthResponse { status })
}

/// Maps a unique violation on the users table to the field it collides on.
fn user_conflict(err: &anyhow::Error) -> Option<AppError> {
    if is_unique_violation(err, Some("users_email_key")) {
        return Some(AppError::conflict("email already taken"));
    }
    if is_unique_violation(err, Some("users_username_key")) {
        return Some(AppError::conflict("username already taken"));
    }
    None
}

fn parse_optional_date(
    validator: &mut Validator,
    field: &'static str,
    value: Option<&str>,
) -> Option<time::Date> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;
    let date = calendar::parse_date(value);
    if date.is_none() {
        validator.add(
            field,
            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
        );
    }
    date
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

impl From<TokenPair> for AuthTokenResponse {
    fn from(tokens: TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    let mut validator = Validator::new();
    validator.not_blank("email", &payload.email);
    validator.not_blank("password", &payload.password);
    validator.max_chars("password", &payload.password, PASSWORD_MAX_CHARS);
    validator.finish()?;

    let tokens = state
        .auth_service()
        .login(payload.email.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let tokens = state
        .auth_service()
        .refresh(payload.refresh_token.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to refresh token");
            AppError::internal("failed to refresh token")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(tokens.into())),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub token_type: &'static str,
}

pub async fn verify_token(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, AppError> {
    if payload.token.trim().is_empty() {
        return Err(AppError::bad_request("token is required"));
    }

    let kind = state
        .auth_service()
        .verify_token(payload.token.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to verify token");
            AppError::internal("failed to verify token")
        })?;

    let token_type = match kind {
        Some(TokenKind::Access) => "access",
        Some(TokenKind::Refresh) => "refresh",
        None => return Err(AppError::unauthorized("token is invalid or expired")),
    };

    Ok(Json(VerifyResponse {
        valid: true,
        token_type,
    }))
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

pub async fn logout(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<LogoutRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let revoked = state
        .auth_service()
        .revoke_refresh_token(auth.user_id, payload.refresh_token.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    if revoked {
        Ok(StatusCode::RESET_CONTENT)
    } else {
        Err(AppError::bad_request("invalid refresh token"))
    }
}

pub async fn logout_all(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let revoked = state
        .auth_service()
        .revoke_all(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to revoke sessions");
            AppError::internal("failed to revoke sessions")
        })?;

    tracing::info!(user_id = %auth.user_id, revoked, "revoked all refresh tokens");
    Ok(StatusCode::RESET_CONTENT)
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let mut validator = Validator::new();
    validator.not_blank("old_password", &payload.old_password);
    validator.password("new_password", &payload.new_password);
    validator.finish()?;

    let outcome = state
        .auth_service()
        .change_password(auth.user_id, &payload.old_password, &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to change password");
            AppError::internal("failed to change password")
        })?;

    match outcome {
        PasswordChange::Changed => Ok(Json(MessageResponse {
            message: "Password successfully changed.",
        })),
        PasswordChange::IncorrectPassword => {
            let mut fields = FieldErrors::new();
            fields.insert("old_password", vec!["Incorrect password.".to_string()]);
            Err(AppError::validation(fields))
        }
        PasswordChange::UserNotFound => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_key: Option<String>,
    pub date_of_birth: Option<String>,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let username = payload.username.trim().to_string();
    let email = normalize_email(&payload.email);

    let mut validator = Validator::new();
    validator.username("username", &username);
    validator.email("email", &email);
    validator.password("password", &payload.password);
    if let Some(first_name) = &payload.first_name {
        validator.max_chars("first_name", first_name, NAME_MAX_CHARS);
    }
    if let Some(last_name) = &payload.last_name {
        validator.max_chars("last_name", last_name, NAME_MAX_CHARS);
    }
    if let Some(bio) = &payload.bio {
        validator.max_chars("bio", bio, BIO_MAX_CHARS);
    }
    let date_of_birth =
        parse_optional_date(&mut validator, "date_of_birth", payload.date_of_birth.as_deref());
    validator.finish()?;

    let user = state
        .auth_service()
        .signup(NewAccount {
            username,
            email,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
            bio: payload.bio,
            avatar_key: payload.avatar_key,
            date_of_birth,
        })
        .await
        .map_err(|err| {
            if let Some(conflict) = user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PublicUser>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service.get_profile(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to fetch user");
        AppError::internal("failed to fetch user")
    })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = state
        .auth_service()
        .get_current_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch current user")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`
/// through `#[serde(default)]`, `null` becomes `Some(None)`.
fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub avatar_key: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<String>>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let username = payload.username.map(|value| value.trim().to_string());
    let email = payload.email.as_deref().map(normalize_email);

    let mut validator = Validator::new();
    if let Some(username) = &username {
        validator.username("username", username);
    }
    if let Some(email) = &email {
        validator.email("email", email);
    }
    if let Some(Some(first_name)) = &payload.first_name {
        validator.max_chars("first_name", first_name, NAME_MAX_CHARS);
    }
    if let Some(Some(last_name)) = &payload.last_name {
        validator.max_chars("last_name", last_name, NAME_MAX_CHARS);
    }
    if let Some(Some(bio)) = &payload.bio {
        validator.max_chars("bio", bio, BIO_MAX_CHARS);
    }
    // A blank date clears the field like an explicit null.
    let date_of_birth = payload.date_of_birth.as_ref().map(|value| {
        parse_optional_date(&mut validator, "date_of_birth", value.as_deref())
    });
    validator.finish()?;

    let update = ProfileUpdate {
        username,
        email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        bio: payload.bio,
        avatar_key: payload.avatar_key,
        date_of_birth,
    };

    let service = UserService::new(state.db.clone());
    let user = service
        .update_profile(auth.user_id, update)
        .await
        .map_err(|err| {
            if let Some(conflict) = user_conflict(&err) {
                return conflict;
            }
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match user {
        Some(user) => Ok(Json(user)),
        None => Err(AppError::not_found("user not found")),
    }
}

/// Deletes the requester's account and everything it owns.
pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = UserService::new(state.db.clone());
    let deleted = service
        .delete_account(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to delete account");
            AppError::internal("failed to delete account")
        })?;

    if deleted {
        tracing::info!(user_id = %auth.user_id, "account deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("user not found"))
    }
}

async fn ensure_user_exists(state: &AppState, user_id: Uuid) -> Result<(), AppError> {
    let exists = UserService::new(state.db.clone())
        .exists(user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %user_id, "failed to look up user");
            AppError::internal("failed to look up user")
        })?;

    if exists {
        Ok(())
    } else {
        Err(AppError::not_found("user not found"))
    }
}

pub async fn list_user_posts(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let (limit, cursor) = query.parse()?;
    ensure_user_exists(&state, id).await?;

    let service = PostService::new(state.db.clone());
    let posts = service
        .list_by_user(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list user posts");
            AppError::internal("failed to list user posts")
        })?;

    Ok(Json(ListResponse::from_overfetch(posts, limit, |post| {
        (post.created_at, post.id)
    })))
}

pub async fn list_liked_posts(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<LikedPost>>, AppError> {
    let (limit, cursor) = query.parse()?;

    let service = PostService::new(state.db.clone());
    let posts = service
        .list_liked(auth.user_id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list liked posts");
            AppError::internal("failed to list liked posts")
        })?;

    Ok(Json(ListResponse::from_overfetch(posts, limit, |liked| {
        (liked.liked_at, liked.post.id)
    })))
}

#[derive(Serialize)]
pub struct FollowResponse {
    pub following: bool,
    pub message: &'static str,
}

pub async fn follow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    if auth.user_id == id {
        return Err(AppError::bad_request("cannot follow yourself"));
    }

    let service = SocialService::new(state.db.clone());
    let outcome = service.follow(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, follower_id = %auth.user_id, followee_id = %id, "failed to follow user");
        AppError::internal("failed to follow user")
    })?;

    match outcome {
        FollowOutcome::Followed => Ok(Json(FollowResponse {
            following: true,
            message: "user followed",
        })),
        FollowOutcome::AlreadyFollowing => Err(AppError::conflict("already following")),
        FollowOutcome::UserNotFound => Err(AppError::not_found("user not found")),
    }
}

pub async fn unfollow_user(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if auth.user_id == id {
        return Err(AppError::bad_request("cannot unfollow yourself"));
    }

    let service = SocialService::new(state.db.clone());
    let outcome = service.unfollow(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, follower_id = %auth.user_id, followee_id = %id, "failed to unfollow user");
        AppError::internal("failed to unfollow user")
    })?;

    match outcome {
        UnfollowOutcome::Unfollowed => Ok(StatusCode::NO_CONTENT),
        UnfollowOutcome::NotFollowing => Err(AppError::conflict("not following")),
        UnfollowOutcome::UserNotFound => Err(AppError::not_found("user not found")),
    }
}

pub async fn toggle_follow(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<FollowResponse>, AppError> {
    if auth.user_id == id {
        return Err(AppError::bad_request("cannot follow yourself"));
    }

    let service = SocialService::new(state.db.clone());
    let toggled = service
        .toggle_follow(auth.user_id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, follower_id = %auth.user_id, followee_id = %id, "failed to toggle follow");
            AppError::internal("failed to toggle follow")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(FollowResponse {
        following: toggled.is_following(),
        message: toggled.message(),
    }))
}

#[derive(Serialize)]
pub struct SocialUserResponse {
    pub id: Uuid,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_key: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub followed_at: OffsetDateTime,
}

impl From<SocialUserEdge> for SocialUserResponse {
    fn from(edge: SocialUserEdge) -> Self {
        Self {
            id: edge.user.id,
            username: edge.user.username,
            first_name: edge.user.first_name,
            last_name: edge.user.last_name,
            avatar_key: edge.user.avatar_key,
            followed_at: edge.followed_at,
        }
    }
}

fn edge_page(edges: Vec<SocialUserEdge>, limit: i64) -> ListResponse<SocialUserResponse> {
    let page = ListResponse::from_overfetch(edges, limit, |edge| (edge.followed_at, edge.user.id));
    ListResponse {
        items: page.items.into_iter().map(SocialUserResponse::from).collect(),
        next_cursor: page.next_cursor,
    }
}

pub async fn list_followers(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<SocialUserResponse>>, AppError> {
    let (limit, cursor) = query.parse()?;
    ensure_user_exists(&state, id).await?;

    let service = SocialService::new(state.db.clone());
    let edges = service
        .list_followers(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list followers");
            AppError::internal("failed to list followers")
        })?;

    Ok(Json(edge_page(edges, limit)))
}

pub async fn list_following(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<SocialUserResponse>>, AppError> {
    let (limit, cursor) = query.parse()?;
    ensure_user_exists(&state, id).await?;

    let service = SocialService::new(state.db.clone());
    let edges = service
        .list_following(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %id, "failed to list following");
            AppError::internal("failed to list following")
        })?;

    Ok(Json(edge_page(edges, limit)))
}

#[derive(Deserialize)]
pub struct PostContentRequest {
    pub content: String,
}

fn validate_content(content: &str, max: usize) -> Result<(), AppError> {
    let mut validator = Validator::new();
    validator.not_blank("content", content);
    validator.max_chars("content", content, max);
    validator.finish()
}

async fn fetch_post(state: &AppState, post_id: Uuid) -> Result<Post, AppError> {
    PostService::new(state.db.clone())
        .get_post(post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %post_id, "failed to fetch post");
            AppError::internal("failed to fetch post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))
}

/// Loads the comment list only when the requester will see it.
async fn render_post(state: &AppState, requester: Uuid, post: Post) -> Result<PostView, AppError> {
    let comments = match access::access_for(requester, &post) {
        Access::Owner => EngagementService::new(state.db.clone())
            .all_comments(post.id)
            .await
            .map_err(|err| {
                tracing::error!(error = ?err, post_id = %post.id, "failed to load comments");
                AppError::internal("failed to fetch post")
            })?,
        Access::Reader => Vec::new(),
    };

    Ok(access::post_view(requester, post, comments))
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PostContentRequest>,
) -> Result<(StatusCode, Json<PostView>), AppError> {
    validate_content(&payload.content, POST_MAX_CHARS)?;

    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(auth.user_id, payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(access::post_view(auth.user_id, post, Vec::new())),
    ))
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostView>, AppError> {
    let post = fetch_post(&state, id).await?;
    Ok(Json(render_post(&state, auth.user_id, post).await?))
}

/// Non-authors get the unchanged post back in its reader view.
pub async fn update_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PostContentRequest>,
) -> Result<Json<PostView>, AppError> {
    let post = fetch_post(&state, id).await?;
    if !access::access_for(auth.user_id, &post).is_owner() {
        return Ok(Json(access::post_view(auth.user_id, post, Vec::new())));
    }

    validate_content(&payload.content, POST_MAX_CHARS)?;

    let service = PostService::new(state.db.clone());
    let updated = service
        .update_content(id, auth.user_id, payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    Ok(Json(render_post(&state, auth.user_id, updated).await?))
}

pub async fn delete_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let post = fetch_post(&state, id).await?;
    if !access::access_for(auth.user_id, &post).is_owner() {
        return Err(AppError::forbidden("not the author"));
    }

    let service = PostService::new(state.db.clone());
    let deleted = service.delete_post(id, auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("post not found"))
    }
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub message: &'static str,
}

pub async fn toggle_like(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let toggled = service
        .toggle_like(auth.user_id, id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to toggle like");
            AppError::internal("failed to toggle like")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    Ok(Json(LikeResponse {
        liked: toggled.is_liked(),
        message: toggled.message(),
    }))
}

pub async fn list_post_likes(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Like>>, AppError> {
    let (limit, cursor) = query.parse()?;
    fetch_post(&state, id).await?;

    let service = EngagementService::new(state.db.clone());
    let likes = service
        .list_likes(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to list likes");
            AppError::internal("failed to list likes")
        })?;

    Ok(Json(ListResponse::from_overfetch(likes, limit, |like| {
        (like.created_at, like.id)
    })))
}

pub async fn create_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PostContentRequest>,
) -> Result<(StatusCode, Json<CommentView>), AppError> {
    validate_content(&payload.content, COMMENT_MAX_CHARS)?;

    let service = EngagementService::new(state.db.clone());
    let comment = service
        .create_comment(auth.user_id, id, payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to comment");
            AppError::internal("failed to comment")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    Ok((
        StatusCode::CREATED,
        Json(access::comment_view(auth.user_id, comment)),
    ))
}

pub async fn list_post_comments(
    Path(id): Path<Uuid>,
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<ListResponse<Comment>>, AppError> {
    let (limit, cursor) = query.parse()?;
    fetch_post(&state, id).await?;

    let service = EngagementService::new(state.db.clone());
    let comments = service
        .list_comments(id, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    Ok(Json(ListResponse::from_overfetch(comments, limit, |comment| {
        (comment.created_at, comment.id)
    })))
}

async fn fetch_comment(
    state: &AppState,
    post_id: Uuid,
    comment_id: Uuid,
) -> Result<Comment, AppError> {
    EngagementService::new(state.db.clone())
        .get_comment(post_id, comment_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to fetch comment");
            AppError::internal("failed to fetch comment")
        })?
        .ok_or_else(|| AppError::not_found("comment not found"))
}

pub async fn get_comment(
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<CommentView>, AppError> {
    let comment = fetch_comment(&state, post_id, comment_id).await?;
    Ok(Json(access::comment_view(auth.user_id, comment)))
}

pub async fn update_comment(
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PostContentRequest>,
) -> Result<Json<CommentView>, AppError> {
    let comment = fetch_comment(&state, post_id, comment_id).await?;
    if !access::access_for(auth.user_id, &comment).is_owner() {
        return Ok(Json(access::comment_view(auth.user_id, comment)));
    }

    validate_content(&payload.content, COMMENT_MAX_CHARS)?;

    let service = EngagementService::new(state.db.clone());
    let updated = service
        .update_comment(post_id, comment_id, auth.user_id, payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, "failed to update comment");
            AppError::internal("failed to update comment")
        })?
        .ok_or_else(|| AppError::not_found("comment not found"))?;

    Ok(Json(access::comment_view(auth.user_id, updated)))
}

pub async fn delete_comment(
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let comment = fetch_comment(&state, post_id, comment_id).await?;
    if !access::access_for(auth.user_id, &comment).is_owner() {
        return Err(AppError::forbidden("not the author"));
    }

    let service = EngagementService::new(state.db.clone());
    let deleted = service
        .delete_comment(post_id, comment_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, comment_id = %comment_id, user_id = %auth.user_id, "failed to delete comment");
            AppError::internal("failed to delete comment")
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("comment not found"))
    }
}

#[derive(Deserialize)]
pub struct FeedQuery {
    pub content: Option<String>,
    pub created_at: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub async fn home_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let (limit, cursor) = PaginationQuery {
        limit: query.limit,
        cursor: query.cursor,
    }
    .parse()?;

    let mut validator = Validator::new();
    let created_on = parse_optional_date(&mut validator, "created_at", query.created_at.as_deref());
    validator.finish()?;
    let filter = FeedFilter::new(query.content, created_on);

    let service = FeedService::new(state.db.clone());
    let posts = service
        .get_feed(auth.user_id, &filter, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, mode = ?filter.mode(), "failed to fetch feed");
            AppError::internal("failed to fetch feed")
        })?;

    Ok(Json(ListResponse::from_overfetch(posts, limit, |post| {
        (post.created_at, post.id)
    })))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub async fn search_users(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ListResponse<SearchUser>>, AppError> {
    let term = query.q.as_deref().map(str::trim).unwrap_or_default();
    if term.is_empty() {
        return Err(AppError::bad_request("q is required"));
    }
    let (limit, cursor) = PaginationQuery {
        limit: query.limit,
        cursor: query.cursor,
    }
    .parse()?;

    let service = SearchService::new(state.db.clone());
    let users = service
        .search_users(term, cursor, limit + 1)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to search users");
            AppError::internal("failed to search users")
        })?;

    Ok(Json(ListResponse::from_overfetch(users, limit, |user| {
        (user.created_at, user.id)
    })))
}

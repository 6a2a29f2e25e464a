//! User handlers.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::middleware::{CurrentUser, MaybeUser};
use crate::api::AppState;
use crate::domain::UserResponse;
use crate::errors::{AppError, AppResult};
use crate::types::{Paginated, PaginationParams};

/// Logged-in status fragment for page headers
#[derive(Debug, Serialize, ToSchema)]
pub struct LoggedInWidget {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserResponse>,
}

/// Routes that require authentication
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/me", get(get_current_user))
        .route("/:id", get(get_user))
}

/// Routes that work with or without a session
pub fn widget_routes() -> Router<AppState> {
    Router::new().route("/widget/loggedin", get(logged_in_widget))
}

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<UserResponse>> {
    let user = state.user_service.get_user(current_user.id).await?;
    Ok(Json(user.into()))
}

/// List users, one page at a time
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(
        ("page" = Option<u64>, Query, description = "Page number, starting at 1"),
        ("per_page" = Option<u64>, Query, description = "Items per page, capped at 100")
    ),
    responses(
        (status = 200, description = "Page of users", body = [UserResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<Paginated<UserResponse>>> {
    let (users, total) = state.user_service.list_users(&params).await?;
    let data = users.into_iter().map(UserResponse::from).collect();

    Ok(Json(Paginated::new(data, params.page, params.limit(), total)))
}

/// Get a user's profile by id
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No user with that id")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<UserResponse>> {
    let user = state.user_service.get_user(id).await?;
    Ok(Json(user.into()))
}

/// Report whether the caller is logged in
#[utoipa::path(
    get,
    path = "/users/widget/loggedin",
    tag = "Users",
    responses(
        (status = 200, description = "Login status", body = LoggedInWidget)
    )
)]
pub async fn logged_in_widget(
    State(state): State<AppState>,
    MaybeUser(current_user): MaybeUser,
) -> AppResult<Json<LoggedInWidget>> {
    let user = match current_user {
        Some(current) => match state.user_service.get_user(current.id).await {
            Ok(user) => Some(UserResponse::from(user)),
            // Account removed after the token was issued.
            Err(AppError::NotFound) => None,
            Err(e) => return Err(e),
        },
        None => None,
    };

    Ok(Json(LoggedInWidget {
        logged_in: user.is_some(),
        user,
    }))
}

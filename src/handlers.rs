use crate::{
    errors::AppError,
    models::{LikeDirection, NewInitiative},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing;

/// POST /posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewInitiative>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    tracing::debug!(title = %payload.title, "Creating initiative via handler");
    let initiative = state.service.create(payload).await?;
    Ok(Json(initiative))
}

/// GET /posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let initiatives = state.service.list_all().await?;
    tracing::info!("Handler successfully retrieved {} initiatives", initiatives.len());
    Ok(Json(initiatives))
}

/// GET /posts/user/{username}
pub async fn list_posts_by_user(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(%username, "Listing initiatives for user via handler");
    let initiatives = state.service.list_by_user(&username).await?;
    Ok(Json(initiatives))
}

/// DELETE /posts/{title}
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::debug!(%title, "Deleting initiative via handler");
    state.service.delete_by_title(&title).await?;
    Ok(Json(serde_json::json!({ "message": "post deleted successfully" })))
}

/// PATCH|POST /posts/{title}/like
pub async fn like_post(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let initiative = state.service.adjust_like_count(&title, LikeDirection::Like).await?;
    Ok(Json(initiative))
}

/// PATCH|POST /posts/{title}/unlike
pub async fn unlike_post(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let initiative = state.service.adjust_like_count(&title, LikeDirection::Unlike).await?;
    Ok(Json(initiative))
}

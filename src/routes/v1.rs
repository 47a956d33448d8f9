use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};

use crate::{
    AppState,
    error::ApiResult,
    models::{
        MovieInput, MovieSummary, ReviewInput, ReviewProjection, ReviewUpdate, UserInput,
        UserProjection,
    },
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", get(list_movies).post(create_movie))
        .route("/movies/{id}", get(get_movie).put(update_movie).delete(delete_movie))
        .route("/reviews", get(list_reviews).post(create_review))
        .route("/reviews/{id}", get(get_review).put(update_review).delete(delete_review))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/info/environment", get(environment))
}

async fn list_movies(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<MovieSummary>>> {
    Ok(Json(state.movies.summaries().await?))
}

async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<MovieSummary>> {
    Ok(Json(state.movies.summary(id).await?))
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(input): Json<MovieInput>,
) -> ApiResult<StatusCode> {
    state.movies.create(input).await?;
    Ok(StatusCode::CREATED)
}

async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<MovieInput>,
) -> ApiResult<StatusCode> {
    state.movies.update(id, input).await?;
    Ok(StatusCode::OK)
}

async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.movies.delete(id).await?;
    Ok(StatusCode::OK)
}

async fn list_reviews(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<ReviewProjection>>> {
    Ok(Json(state.reviews.list().await?))
}

async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<ReviewProjection>> {
    Ok(Json(state.reviews.get(id).await?))
}

async fn create_review(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ReviewInput>,
) -> ApiResult<StatusCode> {
    state.reviews.submit(input).await?;
    Ok(StatusCode::CREATED)
}

async fn update_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<ReviewUpdate>,
) -> ApiResult<StatusCode> {
    state.reviews.update(id, input).await?;
    Ok(StatusCode::OK)
}

async fn delete_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.reviews.delete(id).await?;
    Ok(StatusCode::OK)
}

async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<UserProjection>>> {
    Ok(Json(state.users.list().await?))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<UserProjection>> {
    Ok(Json(state.users.get(id).await?))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(input): Json<UserInput>,
) -> ApiResult<StatusCode> {
    state.users.create(input).await?;
    Ok(StatusCode::CREATED)
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(input): Json<UserInput>,
) -> ApiResult<StatusCode> {
    state.users.update(id, input).await?;
    Ok(StatusCode::OK)
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    state.users.delete(id).await?;
    Ok(StatusCode::OK)
}

async fn environment(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "environment": state.config.environment }))
}

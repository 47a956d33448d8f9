use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::{
    AppState,
    error::ApiResult,
    models::{
        ActorInput, ActorProjection, ApiRequest, ApiResponse, BulkDeleteOutcome, BulkMoviesInput,
        MetaRequest, MovieDetails, MovieFilter, MovieInput, MovieSummary, ReviewInput,
        ReviewProjection, ReviewUpdate, UserFilter, UserInput, UserProjection, UserStats,
    },
    reviews::SubmittedReview,
};

type Enveloped<T> = ApiResult<Json<ApiResponse<T>>>;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies/search", get(search_movies))
        .route("/movies/get", post(get_movies))
        .route("/movies/get/{id}", post(get_movie))
        .route("/movies", post(create_movie))
        .route("/movies/bulk-create", post(bulk_create_movies))
        .route("/movies/bulk-delete", post(bulk_delete_movies))
        .route("/movies/{id}", put(update_movie).delete(delete_movie))
        .route("/reviews/get", post(get_reviews))
        .route("/reviews/get/{id}", post(get_review))
        .route("/reviews", post(submit_review))
        .route("/reviews/{id}", put(update_review).delete(delete_review))
        .route("/reviews/like/{review_id}/{user_id}", post(like_review))
        .route("/reviews/unlike/{review_id}/{user_id}", delete(unlike_review))
        .route("/users/search", get(search_users))
        .route("/users/get", post(get_users))
        .route("/users/get/{id}", post(get_user))
        .route("/users", post(create_user))
        .route("/users/stats/{id}", post(user_stats))
        .route("/users/restore/{id}", post(restore_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
        .route("/actors/get", post(get_actors))
        .route("/actors/get/{id}", post(get_actor))
        .route("/actors", post(create_actor))
        .route("/actors/{id}", put(update_actor).delete(delete_actor))
        .route("/info/environment", get(environment))
}

async fn search_movies(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<MovieFilter>,
) -> Enveloped<Vec<MovieSummary>> {
    Ok(Json(ApiResponse::success(state.movies.search(&filter).await?)))
}

async fn get_movies(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<Vec<MovieSummary>> {
    Ok(Json(ApiResponse::success(state.movies.summaries().await?).meta(req.meta)))
}

async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<MovieDetails> {
    Ok(Json(ApiResponse::success(state.movies.details(id).await?).meta(req.meta)))
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiRequest<MovieInput>>,
) -> Enveloped<Value> {
    let id = state.movies.create(req.data).await?;
    Ok(Json(
        ApiResponse::with_message("Movie created", json!({ "movie_id": id })).meta(req.meta),
    ))
}

async fn bulk_create_movies(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiRequest<BulkMoviesInput>>,
) -> Enveloped<Value> {
    let ids = state.movies.bulk_create(req.data.movies).await?;
    Ok(Json(
        ApiResponse::with_message("Movies created", json!({ "movie_ids": ids })).meta(req.meta),
    ))
}

async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<ApiRequest<MovieInput>>,
) -> Enveloped<MovieSummary> {
    let updated = state.movies.update(id, req.data).await?;
    Ok(Json(ApiResponse::with_message("Movie updated", updated).meta(req.meta)))
}

async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Enveloped<Value> {
    state.movies.delete(id).await?;
    Ok(Json(ApiResponse::with_message("Movie deleted", json!({ "movie_id": id }))))
}

async fn bulk_delete_movies(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiRequest<Vec<i32>>>,
) -> Enveloped<BulkDeleteOutcome> {
    let outcome = state.movies.bulk_delete(req.data).await?;
    let message = outcome.summary.clone();
    Ok(Json(ApiResponse::with_message(message, outcome).meta(req.meta)))
}

async fn get_reviews(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<Vec<ReviewProjection>> {
    Ok(Json(ApiResponse::success(state.reviews.list().await?).meta(req.meta)))
}

async fn get_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<ReviewProjection> {
    Ok(Json(ApiResponse::success(state.reviews.get(id).await?).meta(req.meta)))
}

#[derive(Serialize)]
#[serde(untagged)]
enum SubmitBody {
    Created { review_id: i32 },
    Updated(ReviewProjection),
}

async fn submit_review(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiRequest<ReviewInput>>,
) -> Enveloped<SubmitBody> {
    let (message, body) = match state.reviews.submit(req.data).await? {
        SubmittedReview::Created { id } => ("Review created", SubmitBody::Created { review_id: id }),
        SubmittedReview::Updated(projection) => ("Review updated", SubmitBody::Updated(projection)),
    };
    Ok(Json(ApiResponse::with_message(message, body).meta(req.meta)))
}

async fn update_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<ApiRequest<ReviewUpdate>>,
) -> Enveloped<ReviewProjection> {
    let updated = state.reviews.update(id, req.data).await?;
    Ok(Json(ApiResponse::with_message("Review updated", updated).meta(req.meta)))
}

async fn delete_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Enveloped<Value> {
    state.reviews.delete(id).await?;
    Ok(Json(ApiResponse::with_message("Review deleted", json!({ "review_id": id }))))
}

async fn like_review(
    State(state): State<Arc<AppState>>,
    Path((review_id, user_id)): Path<(i32, i32)>,
) -> Enveloped<Value> {
    state.reviews.like(review_id, user_id).await?;
    Ok(Json(ApiResponse::with_message(
        "Review liked",
        json!({ "review_id": review_id, "user_id": user_id }),
    )))
}

async fn unlike_review(
    State(state): State<Arc<AppState>>,
    Path((review_id, user_id)): Path<(i32, i32)>,
) -> Enveloped<Value> {
    state.reviews.unlike(review_id, user_id).await?;
    Ok(Json(ApiResponse::with_message(
        "Review unliked",
        json!({ "review_id": review_id, "user_id": user_id }),
    )))
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<UserFilter>,
) -> Enveloped<Vec<UserProjection>> {
    Ok(Json(ApiResponse::success(state.users.search(&filter).await?)))
}

async fn get_users(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<Vec<UserProjection>> {
    Ok(Json(ApiResponse::success(state.users.list().await?).meta(req.meta)))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<UserProjection> {
    Ok(Json(ApiResponse::success(state.users.get(id).await?).meta(req.meta)))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiRequest<UserInput>>,
) -> Enveloped<Value> {
    let id = state.users.create(req.data).await?;
    Ok(Json(ApiResponse::with_message("User created", json!({ "user_id": id })).meta(req.meta)))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<ApiRequest<UserInput>>,
) -> Enveloped<UserProjection> {
    let updated = state.users.update(id, req.data).await?;
    Ok(Json(ApiResponse::with_message("User updated", updated).meta(req.meta)))
}

async fn delete_user(State(state): State<Arc<AppState>>, Path(id): Path<i32>) -> Enveloped<Value> {
    state.users.delete(id).await?;
    Ok(Json(ApiResponse::with_message("User deleted", json!({ "user_id": id }))))
}

async fn user_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<UserStats> {
    Ok(Json(ApiResponse::success(state.users.stats(id).await?).meta(req.meta)))
}

async fn restore_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<UserProjection> {
    let restored = state.users.restore(id).await?;
    Ok(Json(ApiResponse::with_message("User restored", restored).meta(req.meta)))
}

async fn get_actors(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<Vec<ActorProjection>> {
    Ok(Json(ApiResponse::success(state.actors.list().await?).meta(req.meta)))
}

async fn get_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<MetaRequest>,
) -> Enveloped<ActorProjection> {
    Ok(Json(ApiResponse::success(state.actors.get(id).await?).meta(req.meta)))
}

async fn create_actor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ApiRequest<ActorInput>>,
) -> Enveloped<Value> {
    let id = state.actors.create(req.data).await?;
    Ok(Json(ApiResponse::with_message("Actor created", json!({ "actor_id": id })).meta(req.meta)))
}

async fn update_actor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(req): Json<ApiRequest<ActorInput>>,
) -> Enveloped<ActorProjection> {
    let updated = state.actors.update(id, req.data).await?;
    Ok(Json(ApiResponse::with_message("Actor updated", updated).meta(req.meta)))
}

async fn delete_actor(State(state): State<Arc<AppState>>, Path(id): Path<i32>) -> Enveloped<Value> {
    state.actors.delete(id).await?;
    Ok(Json(ApiResponse::with_message("Actor deleted", json!({ "actor_id": id }))))
}

async fn environment(State(state): State<Arc<AppState>>) -> Enveloped<Value> {
    Ok(Json(ApiResponse::success(json!({
        "environment": state.config.environment,
        "api_version": "2.0",
    }))))
}

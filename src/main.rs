mod actors;
mod config;
mod db;
mod entities;
mod error;
mod models;
mod movies;
mod ratings;
mod reviews;
mod routes;
mod soft_delete;
#[cfg(test)]
mod testutil;
mod users;

use std::sync::Arc;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    actors::ActorService, config::Config, movies::MovieService, reviews::ReviewService,
    users::UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub movies: MovieService,
    pub reviews: ReviewService,
    pub users: UserService,
    pub actors: ActorService,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,cinevault=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(&config.database_url).await?;

    let state = Arc::new(AppState {
        config: config.clone(),
        movies: MovieService::new(db.clone()),
        reviews: ReviewService::new(db.clone()),
        users: UserService::new(db.clone()),
        actors: ActorService::new(db),
    });

    let app = routes::router(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, environment = %config.environment, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

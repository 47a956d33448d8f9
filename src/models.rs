use std::collections::HashMap;

use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize};

use crate::{
    entities::{actor, movie, user},
    ratings::RatingSummary,
};

// Projections for soft-deleted referents fall back to this instead of
// leaking a dangling id lookup to the caller.
pub const UNKNOWN_NAME: &str = "Unknown";

#[derive(Debug, Deserialize)]
pub struct ApiRequest<T> {
    #[serde(default)]
    pub meta: HashMap<String, String>,
    pub data: T,
}

// Body shape for the v2 read endpoints, which carry client context but no
// payload.
#[derive(Debug, Default, Deserialize)]
pub struct MetaRequest {
    #[serde(default)]
    pub meta: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub is_success: bool,
    pub meta: HashMap<String, String>,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_message("Ok", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: 200,
            message: message.into(),
            is_success: true,
            meta: HashMap::new(),
            data: Some(data),
        }
    }

    pub fn meta(mut self, meta: HashMap<String, String>) -> Self {
        self.meta = meta;
        self
    }
}

#[derive(Debug, Serialize)]
pub struct MovieSummary {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub release_date: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub average_rating: f64,
    pub review_count: usize,
}

impl MovieSummary {
    pub fn from_model(movie: movie::Model, ratings: RatingSummary) -> Self {
        Self {
            id: movie.id,
            title: movie.title,
            description: movie.description,
            release_date: movie.release_date,
            genre: movie.genre,
            director: movie.director,
            average_rating: ratings.average_rating,
            review_count: ratings.review_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieDetails {
    #[serde(flatten)]
    pub movie: MovieSummary,
    pub reviews: Vec<ReviewProjection>,
}

#[derive(Debug, Serialize)]
pub struct ReviewProjection {
    pub id: i32,
    pub movie_id: i32,
    pub movie_title: String,
    pub user_id: i32,
    pub username: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: Timestamp,
    pub like_count: u64,
}

#[derive(Debug, Serialize)]
pub struct UserProjection {
    pub id: i32,
    pub username: String,
    pub email: String,
}

impl From<user::Model> for UserProjection {
    fn from(user: user::Model) -> Self {
        Self { id: user.id, username: user.username, email: user.email }
    }
}

#[derive(Debug, Serialize)]
pub struct ActorProjection {
    pub id: i32,
    pub full_name: String,
    pub birth_date: String,
    pub biography: Option<String>,
}

impl From<actor::Model> for ActorProjection {
    fn from(actor: actor::Model) -> Self {
        Self {
            id: actor.id,
            full_name: actor.full_name,
            birth_date: actor.birth_date,
            biography: actor.biography,
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct BulkDeleteOutcome {
    pub deleted: Vec<i32>,
    pub blocked: Vec<i32>,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub user_id: i32,
    pub username: String,
    pub total_reviews: usize,
    pub average_rating: f64,
    pub last_activity: Option<Timestamp>,
    pub genre_stats: Vec<GenreStat>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct GenreStat {
    pub genre: Option<String>,
    pub count: usize,
    pub average_rating: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieInput {
    pub title: String,
    pub description: Option<String>,
    pub release_date: Option<Date>,
    pub genre: Option<String>,
    pub director: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMoviesInput {
    pub movies: Vec<MovieInput>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewInput {
    pub movie_id: i32,
    pub user_id: i32,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewUpdate {
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ActorInput {
    pub full_name: String,
    pub birth_date: Date,
    pub biography: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovieFilter {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub director: Option<String>,
    pub release_from: Option<Date>,
    pub release_to: Option<Date>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserFilter {
    pub username: Option<String>,
    pub email: Option<String>,
    pub created_from: Option<Date>,
    pub created_to: Option<Date>,
}

pub fn now_sec() -> i64 {
    Timestamp::now().as_second()
}

pub fn timestamp_from_sec(sec: i64) -> Timestamp {
    Timestamp::from_second(sec).unwrap_or(Timestamp::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_meta_defaults_to_empty() {
        let req: ApiRequest<i32> = serde_json::from_str(r#"{"data": 7}"#).unwrap();
        assert!(req.meta.is_empty());
        assert_eq!(req.data, 7);

        let req: ApiRequest<i32> =
            serde_json::from_str(r#"{"meta": {"client": "cli"}, "data": 7}"#).unwrap();
        assert_eq!(req.meta.get("client").map(String::as_str), Some("cli"));

        let req: MetaRequest = serde_json::from_str("{}").unwrap();
        assert!(req.meta.is_empty());
    }

    #[test]
    fn response_envelope_serializes_success_shape() {
        let mut meta = HashMap::new();
        meta.insert("request_id".to_string(), "abc".to_string());

        let body = ApiResponse::with_message("Movie created", 3).meta(meta);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["is_success"], true);
        assert_eq!(json["message"], "Movie created");
        assert_eq!(json["meta"]["request_id"], "abc");
        assert_eq!(json["data"], 3);

        let body = ApiResponse::success("payload");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["message"], "Ok");
    }

    #[test]
    fn projection_drops_password() {
        let model = user::Model {
            id: 1,
            username: "sam".to_string(),
            email: "sam@example.com".to_string(),
            password: "hunter2".to_string(),
            created_at: 0,
            is_deleted: false,
        };
        let json = serde_json::to_value(UserProjection::from(model)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "sam");
    }

    #[test]
    fn second_conversion_falls_back_to_epoch() {
        assert_eq!(timestamp_from_sec(0), Timestamp::UNIX_EPOCH);
        assert_eq!(timestamp_from_sec(i64::MAX), Timestamp::UNIX_EPOCH);
    }
}

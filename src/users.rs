use std::collections::{BTreeMap, HashMap, HashSet};

use jiff::civil::Date;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::{
    entities::{movie, review, user},
    error::{ApiError, ApiResult, is_unique_violation},
    models::{self, GenreStat, UserFilter, UserInput, UserProjection, UserStats},
    ratings,
    soft_delete::SoftDelete,
};

#[derive(Clone)]
pub struct UserService {
    db: DatabaseConnection,
}

impl UserService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> ApiResult<Vec<UserProjection>> {
        let users = user::Entity::find_live().all(&self.db).await?;
        Ok(users.into_iter().map(UserProjection::from).collect())
    }

    pub async fn get(&self, id: i32) -> ApiResult<UserProjection> {
        let Some(existing) = user::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("User", id));
        };
        Ok(existing.into())
    }

    pub async fn search(&self, filter: &UserFilter) -> ApiResult<Vec<UserProjection>> {
        let mut query = user::Entity::find_live();
        if let Some(username) = &filter.username {
            query = query.filter(user::Column::Username.contains(username));
        }
        if let Some(email) = &filter.email {
            query = query.filter(user::Column::Email.contains(email));
        }
        if let Some(from) = filter.created_from {
            query = query.filter(user::Column::CreatedAt.gte(day_start(from)));
        }
        if let Some(to) = filter.created_to {
            query = query.filter(user::Column::CreatedAt.lte(day_end(to)));
        }
        let users = query.all(&self.db).await?;
        Ok(users.into_iter().map(UserProjection::from).collect())
    }

    pub async fn create(&self, input: UserInput) -> ApiResult<i32> {
        let model = user::ActiveModel {
            id: Default::default(),
            username: Set(input.username),
            email: Set(input.email),
            password: Set(input.password),
            created_at: Set(models::now_sec()),
            is_deleted: Set(false),
        };
        match user::Entity::insert(model).exec(&self.db).await {
            Ok(res) => {
                tracing::debug!(user_id = res.last_insert_id, "user created");
                Ok(res.last_insert_id)
            }
            Err(err) if is_unique_violation(&err) => {
                Err(ApiError::Conflict("username or email is already taken".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn update(&self, id: i32, input: UserInput) -> ApiResult<UserProjection> {
        let Some(existing) = user::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("User", id));
        };

        let mut active: user::ActiveModel = existing.into();
        active.username = Set(input.username);
        active.email = Set(input.email);
        active.password = Set(input.password);

        match active.update(&self.db).await {
            Ok(updated) => Ok(updated.into()),
            Err(err) if is_unique_violation(&err) => {
                Err(ApiError::Conflict("username or email is already taken".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete(&self, id: i32) -> ApiResult<()> {
        let Some(existing) = user::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("User", id));
        };
        let mut active: user::ActiveModel = existing.into();
        active.is_deleted = Set(true);
        active.update(&self.db).await?;
        tracing::debug!(user_id = id, "user soft deleted");
        Ok(())
    }

    // The only restore path in the system. Looks the row up without the
    // liveness filter: a live user is a precondition failure, a missing row
    // is still not found.
    pub async fn restore(&self, id: i32) -> ApiResult<UserProjection> {
        let Some(existing) = user::Entity::find_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("User", id));
        };
        if !existing.is_deleted {
            return Err(ApiError::FailedPrecondition("user is not deleted".to_string()));
        }

        let mut active: user::ActiveModel = existing.into();
        active.is_deleted = Set(false);
        let restored = active.update(&self.db).await?;
        tracing::debug!(user_id = id, "user restored");
        Ok(restored.into())
    }

    pub async fn stats(&self, id: i32) -> ApiResult<UserStats> {
        let Some(existing) = user::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("User", id));
        };

        let reviews = review::Entity::find_live()
            .filter(review::Column::UserId.eq(id))
            .all(&self.db)
            .await?;

        let overall = ratings::summarize(reviews.iter().map(|r| r.rating));
        let last_activity =
            reviews.iter().map(|r| r.created_at).max().map(models::timestamp_from_sec);

        let movie_ids: HashSet<i32> = reviews.iter().map(|r| r.movie_id).collect();
        let genres: HashMap<i32, Option<String>> = movie::Entity::find_live()
            .filter(movie::Column::Id.is_in(movie_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| (m.id, m.genre))
            .collect();

        // BTreeMap keeps the genre buckets in a stable order so that equal
        // counts tie-break deterministically after the sort below.
        let mut by_genre: BTreeMap<Option<String>, Vec<i32>> = BTreeMap::new();
        for r in &reviews {
            let genre = genres.get(&r.movie_id).cloned().flatten();
            by_genre.entry(genre).or_default().push(r.rating);
        }

        let mut genre_stats: Vec<GenreStat> = by_genre
            .into_iter()
            .map(|(genre, bucket)| {
                let summary = ratings::summarize(bucket);
                GenreStat {
                    genre,
                    count: summary.review_count,
                    average_rating: summary.average_rating,
                }
            })
            .collect();
        genre_stats.sort_by(|a, b| b.count.cmp(&a.count));

        Ok(UserStats {
            user_id: existing.id,
            username: existing.username,
            total_reviews: overall.review_count,
            average_rating: overall.average_rating,
            last_activity,
            genre_stats,
        })
    }
}

// Creation timestamps are unix seconds; date filters cover whole UTC days.
fn day_start(date: Date) -> i64 {
    date.to_zoned(jiff::tz::TimeZone::UTC).map(|z| z.timestamp().as_second()).unwrap_or(0)
}

fn day_end(date: Date) -> i64 {
    day_start(date) + 86_399
}

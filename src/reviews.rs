use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    FromQueryResult, QueryFilter, QuerySelect, Set, TransactionTrait,
};

use crate::{
    entities::{movie, review, review_like, user},
    error::{ApiError, ApiResult, is_unique_violation},
    models::{self, ReviewInput, ReviewProjection, ReviewUpdate},
    ratings,
    soft_delete::SoftDelete,
};

#[derive(Debug)]
pub enum SubmittedReview {
    Created { id: i32 },
    Updated(ReviewProjection),
}

#[derive(Clone)]
pub struct ReviewService {
    db: DatabaseConnection,
}

impl ReviewService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> ApiResult<Vec<ReviewProjection>> {
        let rows = review::Entity::find_live().all(&self.db).await?;
        project(&self.db, rows).await
    }

    pub async fn get(&self, id: i32) -> ApiResult<ReviewProjection> {
        let Some(current) = review::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Review", id));
        };
        let mut projections = project(&self.db, vec![current]).await?;
        Ok(projections.remove(0))
    }

    // One review per (movie, user): a second submission for the same pair
    // overwrites rating and comment in place, keeping the review's id,
    // created_at and accumulated likes.
    pub async fn submit(&self, input: ReviewInput) -> ApiResult<SubmittedReview> {
        let txn = self.db.begin().await?;

        // A missing referent outranks a bad rating.
        if movie::Entity::find_live_by_id(input.movie_id).one(&txn).await?.is_none() {
            return Err(ApiError::not_found("Movie", input.movie_id));
        }
        if user::Entity::find_live_by_id(input.user_id).one(&txn).await?.is_none() {
            return Err(ApiError::not_found("User", input.user_id));
        }
        ratings::validate_rating(input.rating)?;

        let existing = find_pair(&txn, input.movie_id, input.user_id).await?;
        if let Some(current) = existing {
            let projection = overwrite(&txn, current, input.rating, input.comment).await?;
            txn.commit().await?;
            tracing::debug!(review_id = projection.id, "review overwritten");
            return Ok(SubmittedReview::Updated(projection));
        }

        let model = review::ActiveModel {
            id: Default::default(),
            movie_id: Set(input.movie_id),
            user_id: Set(input.user_id),
            rating: Set(input.rating),
            comment: Set(input.comment.clone()),
            created_at: Set(models::now_sec()),
            is_deleted: Set(false),
        };

        match review::Entity::insert(model).exec(&txn).await {
            Ok(res) => {
                txn.commit().await?;
                tracing::debug!(review_id = res.last_insert_id, "review created");
                Ok(SubmittedReview::Created { id: res.last_insert_id })
            }
            Err(err) if is_unique_violation(&err) => {
                // Lost an insert race for the pair; retry once as an update.
                let Some(current) = find_pair(&txn, input.movie_id, input.user_id).await? else {
                    return Err(ApiError::Conflict(
                        "concurrent review submission for this movie and user".to_string(),
                    ));
                };
                let projection = overwrite(&txn, current, input.rating, input.comment).await?;
                txn.commit().await?;
                Ok(SubmittedReview::Updated(projection))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn update(&self, id: i32, input: ReviewUpdate) -> ApiResult<ReviewProjection> {
        let txn = self.db.begin().await?;
        let Some(current) = review::Entity::find_live_by_id(id).one(&txn).await? else {
            return Err(ApiError::not_found("Review", id));
        };
        ratings::validate_rating(input.rating)?;
        let projection = overwrite(&txn, current, input.rating, input.comment).await?;
        txn.commit().await?;
        Ok(projection)
    }

    pub async fn delete(&self, id: i32) -> ApiResult<()> {
        let Some(current) = review::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Review", id));
        };
        let mut active: review::ActiveModel = current.into();
        active.is_deleted = Set(true);
        active.update(&self.db).await?;
        tracing::debug!(review_id = id, "review soft deleted");
        Ok(())
    }

    pub async fn like(&self, review_id: i32, user_id: i32) -> ApiResult<()> {
        let txn = self.db.begin().await?;

        if review::Entity::find_live_by_id(review_id).one(&txn).await?.is_none() {
            return Err(ApiError::not_found("Review", review_id));
        }
        if user::Entity::find_live_by_id(user_id).one(&txn).await?.is_none() {
            return Err(ApiError::not_found("User", user_id));
        }

        let already_liked = review_like::Entity::find_live()
            .filter(review_like::Column::ReviewId.eq(review_id))
            .filter(review_like::Column::UserId.eq(user_id))
            .one(&txn)
            .await?
            .is_some();
        if already_liked {
            return Err(ApiError::Conflict("user has already liked this review".to_string()));
        }

        let model = review_like::ActiveModel {
            id: Default::default(),
            review_id: Set(review_id),
            user_id: Set(user_id),
            created_at: Set(models::now_sec()),
            is_deleted: Set(false),
        };

        match review_like::Entity::insert(model).exec(&txn).await {
            Ok(_) => {
                txn.commit().await?;
                tracing::debug!(review_id, user_id, "review liked");
                Ok(())
            }
            // A racing like slipped in between the check and the insert.
            Err(err) if is_unique_violation(&err) => {
                Err(ApiError::Conflict("user has already liked this review".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn unlike(&self, review_id: i32, user_id: i32) -> ApiResult<()> {
        let result = review_like::Entity::update_many()
            .col_expr(review_like::Column::IsDeleted, sea_orm::sea_query::Expr::value(true))
            .filter(review_like::Column::ReviewId.eq(review_id))
            .filter(review_like::Column::UserId.eq(user_id))
            .filter(review_like::Column::IsDeleted.eq(false))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ApiError::NotFound(
                "like not found for this review and user".to_string(),
            ));
        }
        tracing::debug!(review_id, user_id, "review unliked");
        Ok(())
    }
}

async fn find_pair<C>(conn: &C, movie_id: i32, user_id: i32) -> ApiResult<Option<review::Model>>
where
    C: ConnectionTrait,
{
    let found = review::Entity::find_live()
        .filter(review::Column::MovieId.eq(movie_id))
        .filter(review::Column::UserId.eq(user_id))
        .one(conn)
        .await?;
    Ok(found)
}

async fn overwrite<C>(
    conn: &C,
    current: review::Model,
    rating: i32,
    comment: Option<String>,
) -> ApiResult<ReviewProjection>
where
    C: ConnectionTrait,
{
    let mut active: review::ActiveModel = current.into();
    active.rating = Set(rating);
    active.comment = Set(comment);
    let updated = active.update(conn).await?;
    let mut projections = project(conn, vec![updated]).await?;
    Ok(projections.remove(0))
}

// Resolves movie titles, usernames and live like counts for a batch of
// reviews. Returns one projection per input row, in order. Referents that
// are soft-deleted resolve to the "Unknown" placeholder.
pub async fn project<C>(conn: &C, rows: Vec<review::Model>) -> ApiResult<Vec<ReviewProjection>>
where
    C: ConnectionTrait,
{
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let movie_ids: HashSet<i32> = rows.iter().map(|r| r.movie_id).collect();
    let user_ids: HashSet<i32> = rows.iter().map(|r| r.user_id).collect();
    let review_ids: Vec<i32> = rows.iter().map(|r| r.id).collect();

    let titles: HashMap<i32, String> = movie::Entity::find_live()
        .filter(movie::Column::Id.is_in(movie_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|m| (m.id, m.title))
        .collect();

    let usernames: HashMap<i32, String> = user::Entity::find_live()
        .filter(user::Column::Id.is_in(user_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    let like_counts = live_like_counts(conn, review_ids).await?;

    Ok(rows
        .into_iter()
        .map(|r| ReviewProjection {
            id: r.id,
            movie_id: r.movie_id,
            movie_title: titles
                .get(&r.movie_id)
                .cloned()
                .unwrap_or_else(|| models::UNKNOWN_NAME.to_string()),
            user_id: r.user_id,
            username: usernames
                .get(&r.user_id)
                .cloned()
                .unwrap_or_else(|| models::UNKNOWN_NAME.to_string()),
            rating: r.rating,
            comment: r.comment,
            created_at: models::timestamp_from_sec(r.created_at),
            like_count: like_counts.get(&r.id).copied().unwrap_or(0),
        })
        .collect())
}

#[derive(FromQueryResult)]
struct LikeCount {
    review_id: i32,
    count: i64,
}

async fn live_like_counts<C>(conn: &C, review_ids: Vec<i32>) -> ApiResult<HashMap<i32, u64>>
where
    C: ConnectionTrait,
{
    let counts = review_like::Entity::find_live()
        .select_only()
        .column(review_like::Column::ReviewId)
        .column_as(review_like::Column::Id.count(), "count")
        .filter(review_like::Column::ReviewId.is_in(review_ids))
        .group_by(review_like::Column::ReviewId)
        .into_model::<LikeCount>()
        .all(conn)
        .await?;
    Ok(counts.into_iter().map(|c| (c.review_id, c.count as u64)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{MovieInput, UserInput},
        movies::MovieService,
        testutil::test_db,
        users::UserService,
    };

    struct Fixture {
        movies: MovieService,
        reviews: ReviewService,
        users: UserService,
        movie_id: i32,
        user_id: i32,
    }

    async fn fixture(db: DatabaseConnection) -> Fixture {
        let movies = MovieService::new(db.clone());
        let reviews = ReviewService::new(db.clone());
        let users = UserService::new(db);
        let movie_id = movies
            .create(MovieInput {
                title: "Solaris".to_string(),
                description: None,
                release_date: None,
                genre: None,
                director: None,
            })
            .await
            .unwrap();
        let user_id = users
            .create(UserInput {
                username: "kelvin".to_string(),
                email: "kelvin@example.com".to_string(),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();
        Fixture { movies, reviews, users, movie_id, user_id }
    }

    fn input(movie_id: i32, user_id: i32, rating: i32, comment: Option<&str>) -> ReviewInput {
        ReviewInput { movie_id, user_id, rating, comment: comment.map(str::to_string) }
    }

    async fn second_user(users: &UserService, name: &str) -> i32 {
        users
            .create(UserInput {
                username: name.to_string(),
                email: format!("{name}@example.com"),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn submit_creates_then_overwrites_in_place() {
        let f = fixture(test_db().await).await;

        let first = f.reviews.submit(input(f.movie_id, f.user_id, 6, Some("fine"))).await.unwrap();
        let SubmittedReview::Created { id } = first else {
            panic!("first submission should create");
        };

        let second =
            f.reviews.submit(input(f.movie_id, f.user_id, 9, Some("grew on me"))).await.unwrap();
        let SubmittedReview::Updated(projection) = second else {
            panic!("second submission should overwrite");
        };
        assert_eq!(projection.id, id);
        assert_eq!(projection.rating, 9);
        assert_eq!(projection.comment.as_deref(), Some("grew on me"));

        // Replaying the same submission changes nothing.
        f.reviews.submit(input(f.movie_id, f.user_id, 9, Some("grew on me"))).await.unwrap();
        let all = f.reviews.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].rating, 9);
    }

    #[tokio::test]
    async fn out_of_range_rating_writes_nothing() {
        let f = fixture(test_db().await).await;

        for rating in [0, 11, -3] {
            let err = f.reviews.submit(input(f.movie_id, f.user_id, rating, None)).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidArgument(_)));
        }
        assert!(f.reviews.list().await.unwrap().is_empty());

        // Boundary values are accepted.
        f.reviews.submit(input(f.movie_id, f.user_id, 1, None)).await.unwrap();
        f.reviews.submit(input(f.movie_id, f.user_id, 10, None)).await.unwrap();

        // The update path enforces the same range.
        let review_id = f.reviews.list().await.unwrap()[0].id;
        let err = f
            .reviews
            .update(review_id, ReviewUpdate { rating: 0, comment: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
        assert_eq!(f.reviews.get(review_id).await.unwrap().rating, 10);
    }

    #[tokio::test]
    async fn submit_requires_live_movie_and_user() {
        let f = fixture(test_db().await).await;

        let err = f.reviews.submit(input(9999, f.user_id, 5, None)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        f.users.delete(f.user_id).await.unwrap();
        let err = f.reviews.submit(input(f.movie_id, f.user_id, 5, None)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_referents_outrank_a_bad_rating() {
        let f = fixture(test_db().await).await;

        let err = f.reviews.submit(input(9999, f.user_id, 42, None)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = f
            .reviews
            .update(9999, ReviewUpdate { rating: 42, comment: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(f.reviews.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn double_like_conflicts_and_count_stays_one() {
        let f = fixture(test_db().await).await;
        let fan = second_user(&f.users, "fan").await;

        f.reviews.submit(input(f.movie_id, f.user_id, 8, None)).await.unwrap();
        let review_id = f.reviews.list().await.unwrap()[0].id;

        f.reviews.like(review_id, fan).await.unwrap();
        let err = f.reviews.like(review_id, fan).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        assert_eq!(f.reviews.get(review_id).await.unwrap().like_count, 1);
    }

    #[tokio::test]
    async fn unlike_then_relike_round_trips() {
        let f = fixture(test_db().await).await;
        let fan = second_user(&f.users, "fan").await;

        f.reviews.submit(input(f.movie_id, f.user_id, 8, None)).await.unwrap();
        let review_id = f.reviews.list().await.unwrap()[0].id;

        // Nothing to unlike yet.
        let err = f.reviews.unlike(review_id, fan).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        f.reviews.like(review_id, fan).await.unwrap();
        f.reviews.unlike(review_id, fan).await.unwrap();
        assert_eq!(f.reviews.get(review_id).await.unwrap().like_count, 0);

        let err = f.reviews.unlike(review_id, fan).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        // The unique rule only guards live likes, so liking again works.
        f.reviews.like(review_id, fan).await.unwrap();
        assert_eq!(f.reviews.get(review_id).await.unwrap().like_count, 1);
    }

    #[tokio::test]
    async fn overwrite_preserves_likes_and_created_at() {
        let f = fixture(test_db().await).await;
        let fan = second_user(&f.users, "fan").await;

        f.reviews.submit(input(f.movie_id, f.user_id, 5, None)).await.unwrap();
        let before = f.reviews.list().await.unwrap().remove(0);
        f.reviews.like(before.id, fan).await.unwrap();

        let result = f.reviews.submit(input(f.movie_id, f.user_id, 7, None)).await.unwrap();
        let SubmittedReview::Updated(after) = result else {
            panic!("resubmission should overwrite");
        };
        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.like_count, 1);
    }

    #[tokio::test]
    async fn deleted_referents_project_as_unknown() {
        let f = fixture(test_db().await).await;

        f.reviews.submit(input(f.movie_id, f.user_id, 8, None)).await.unwrap();
        let review_id = f.reviews.list().await.unwrap()[0].id;

        f.movies.delete(f.movie_id).await.unwrap();
        f.users.delete(f.user_id).await.unwrap();

        let projection = f.reviews.get(review_id).await.unwrap();
        assert_eq!(projection.movie_title, models::UNKNOWN_NAME);
        assert_eq!(projection.username, models::UNKNOWN_NAME);
    }

    #[tokio::test]
    async fn update_touches_rating_and_comment_only() {
        let f = fixture(test_db().await).await;

        f.reviews.submit(input(f.movie_id, f.user_id, 5, Some("early take"))).await.unwrap();
        let before = f.reviews.list().await.unwrap().remove(0);

        let after = f
            .reviews
            .update(before.id, ReviewUpdate { rating: 3, comment: None })
            .await
            .unwrap();
        assert_eq!(after.id, before.id);
        assert_eq!(after.movie_id, before.movie_id);
        assert_eq!(after.user_id, before.user_id);
        assert_eq!(after.rating, 3);
        assert_eq!(after.comment, None);

        let err = f
            .reviews
            .update(9999, ReviewUpdate { rating: 5, comment: None })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleted_review_is_invisible_and_unlikeable() {
        let f = fixture(test_db().await).await;
        let fan = second_user(&f.users, "fan").await;

        f.reviews.submit(input(f.movie_id, f.user_id, 8, None)).await.unwrap();
        let review_id = f.reviews.list().await.unwrap()[0].id;
        f.reviews.delete(review_id).await.unwrap();

        assert!(matches!(f.reviews.get(review_id).await, Err(ApiError::NotFound(_))));
        assert!(matches!(f.reviews.like(review_id, fan).await, Err(ApiError::NotFound(_))));
        assert!(matches!(f.reviews.delete(review_id).await, Err(ApiError::NotFound(_))));
        assert!(f.reviews.list().await.unwrap().is_empty());

        // The pair is free again for a fresh review.
        let result = f.reviews.submit(input(f.movie_id, f.user_id, 6, None)).await.unwrap();
        assert!(matches!(result, SubmittedReview::Created { .. }));
    }

    #[tokio::test]
    async fn like_requires_live_user() {
        let f = fixture(test_db().await).await;
        let fan = second_user(&f.users, "fan").await;

        f.reviews.submit(input(f.movie_id, f.user_id, 8, None)).await.unwrap();
        let review_id = f.reviews.list().await.unwrap()[0].id;

        f.users.delete(fan).await.unwrap();
        let err = f.reviews.like(review_id, fan).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}

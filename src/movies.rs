use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use crate::{
    entities::{movie, review},
    error::{ApiError, ApiResult, is_unique_violation},
    models::{BulkDeleteOutcome, MovieDetails, MovieFilter, MovieInput, MovieSummary},
    ratings::{self, RatingSummary},
    reviews,
    soft_delete::SoftDelete,
};

#[derive(Clone)]
pub struct MovieService {
    db: DatabaseConnection,
}

impl MovieService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn summaries(&self) -> ApiResult<Vec<MovieSummary>> {
        let movies = movie::Entity::find_live().all(&self.db).await?;
        self.with_ratings(movies).await
    }

    pub async fn summary(&self, id: i32) -> ApiResult<MovieSummary> {
        let Some(existing) = movie::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Movie", id));
        };
        let ratings = self.ratings_for(id).await?;
        Ok(MovieSummary::from_model(existing, ratings))
    }

    pub async fn details(&self, id: i32) -> ApiResult<MovieDetails> {
        let Some(existing) = movie::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Movie", id));
        };
        let rows = review::Entity::find_live()
            .filter(review::Column::MovieId.eq(id))
            .all(&self.db)
            .await?;
        let reviews = reviews::project(&self.db, rows).await?;
        let ratings = ratings::summarize(reviews.iter().map(|r| r.rating));
        Ok(MovieDetails { movie: MovieSummary::from_model(existing, ratings), reviews })
    }

    pub async fn search(&self, filter: &MovieFilter) -> ApiResult<Vec<MovieSummary>> {
        let mut query = movie::Entity::find_live();
        if let Some(title) = &filter.title {
            query = query.filter(movie::Column::Title.contains(title));
        }
        if let Some(genre) = &filter.genre {
            query = query.filter(movie::Column::Genre.contains(genre));
        }
        if let Some(director) = &filter.director {
            query = query.filter(movie::Column::Director.contains(director));
        }
        // Release dates are stored as ISO-8601 text, so range predicates
        // compare lexicographically.
        if let Some(from) = filter.release_from {
            query = query.filter(movie::Column::ReleaseDate.gte(from.to_string()));
        }
        if let Some(to) = filter.release_to {
            query = query.filter(movie::Column::ReleaseDate.lte(to.to_string()));
        }

        let movies = query.all(&self.db).await?;
        let mut summaries = self.with_ratings(movies).await?;

        // Rating bounds apply to the computed aggregate; movies without
        // reviews have no average to compare and are excluded.
        if filter.min_rating.is_some() || filter.max_rating.is_some() {
            summaries.retain(|s| {
                s.review_count > 0
                    && filter.min_rating.is_none_or(|min| s.average_rating >= min)
                    && filter.max_rating.is_none_or(|max| s.average_rating <= max)
            });
        }
        Ok(summaries)
    }

    pub async fn create(&self, input: MovieInput) -> ApiResult<i32> {
        match movie::Entity::insert(new_movie(input)).exec(&self.db).await {
            Ok(res) => {
                tracing::debug!(movie_id = res.last_insert_id, "movie created");
                Ok(res.last_insert_id)
            }
            Err(err) if is_unique_violation(&err) => {
                Err(ApiError::Conflict("a movie with this title already exists".to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn bulk_create(&self, inputs: Vec<MovieInput>) -> ApiResult<Vec<i32>> {
        let txn = self.db.begin().await?;
        let mut ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            match movie::Entity::insert(new_movie(input)).exec(&txn).await {
                Ok(res) => ids.push(res.last_insert_id),
                Err(err) if is_unique_violation(&err) => {
                    return Err(ApiError::Conflict(
                        "a movie with this title already exists".to_string(),
                    ));
                }
                Err(err) => return Err(err.into()),
            }
        }
        txn.commit().await?;

        tracing::debug!(count = ids.len(), "movies bulk created");
        Ok(ids)
    }

    pub async fn update(&self, id: i32, input: MovieInput) -> ApiResult<MovieSummary> {
        let Some(existing) = movie::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Movie", id));
        };

        let mut active: movie::ActiveModel = existing.into();
        active.title = Set(input.title);
        active.description = Set(input.description);
        active.release_date = Set(input.release_date.map(|d| d.to_string()));
        active.genre = Set(input.genre);
        active.director = Set(input.director);

        let updated = match active.update(&self.db).await {
            Ok(model) => model,
            Err(err) if is_unique_violation(&err) => {
                return Err(ApiError::Conflict("a movie with this title already exists".to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let ratings = self.ratings_for(id).await?;
        Ok(MovieSummary::from_model(updated, ratings))
    }

    pub async fn delete(&self, id: i32) -> ApiResult<()> {
        let Some(existing) = movie::Entity::find_live_by_id(id).one(&self.db).await? else {
            return Err(ApiError::not_found("Movie", id));
        };
        let mut active: movie::ActiveModel = existing.into();
        active.is_deleted = Set(true);
        active.update(&self.db).await?;
        tracing::debug!(movie_id = id, "movie soft deleted");
        Ok(())
    }

    // An empty ids list is a valid no-op batch: both partitions come back
    // empty and nothing is written.
    pub async fn bulk_delete(&self, ids: Vec<i32>) -> ApiResult<BulkDeleteOutcome> {
        let txn = self.db.begin().await?;

        let candidates: Vec<i32> = movie::Entity::find_live()
            .select_only()
            .column(movie::Column::Id)
            .filter(movie::Column::Id.is_in(ids))
            .order_by_asc(movie::Column::Id)
            .into_tuple()
            .all(&txn)
            .await?;

        let reviewed: HashSet<i32> = review::Entity::find_live()
            .select_only()
            .column(review::Column::MovieId)
            .filter(review::Column::MovieId.is_in(candidates.clone()))
            .into_tuple::<i32>()
            .all(&txn)
            .await?
            .into_iter()
            .collect();

        let mut deleted = Vec::new();
        let mut blocked = Vec::new();
        for id in candidates {
            if reviewed.contains(&id) {
                blocked.push(id);
            } else {
                deleted.push(id);
            }
        }

        if !deleted.is_empty() {
            movie::Entity::update_many()
                .col_expr(movie::Column::IsDeleted, sea_orm::sea_query::Expr::value(true))
                .filter(movie::Column::Id.is_in(deleted.clone()))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        let summary = if blocked.is_empty() {
            format!("deleted {} movies", deleted.len())
        } else {
            format!(
                "deleted {} movies, {} blocked by existing reviews",
                deleted.len(),
                blocked.len()
            )
        };
        tracing::info!(deleted = deleted.len(), blocked = blocked.len(), "bulk movie delete");
        Ok(BulkDeleteOutcome { deleted, blocked, summary })
    }

    async fn with_ratings(&self, movies: Vec<movie::Model>) -> ApiResult<Vec<MovieSummary>> {
        if movies.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = movies.iter().map(|m| m.id).collect();
        let pairs: Vec<(i32, i32)> = review::Entity::find_live()
            .select_only()
            .column(review::Column::MovieId)
            .column(review::Column::Rating)
            .filter(review::Column::MovieId.is_in(ids))
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut by_movie: HashMap<i32, Vec<i32>> = HashMap::new();
        for (movie_id, rating) in pairs {
            by_movie.entry(movie_id).or_default().push(rating);
        }

        Ok(movies
            .into_iter()
            .map(|m| {
                let ratings = by_movie.remove(&m.id).unwrap_or_default();
                MovieSummary::from_model(m, ratings::summarize(ratings))
            })
            .collect())
    }

    async fn ratings_for(&self, movie_id: i32) -> ApiResult<RatingSummary> {
        let ratings: Vec<i32> = review::Entity::find_live()
            .select_only()
            .column(review::Column::Rating)
            .filter(review::Column::MovieId.eq(movie_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ratings::summarize(ratings))
    }
}

fn new_movie(input: MovieInput) -> movie::ActiveModel {
    movie::ActiveModel {
        id: Default::default(),
        title: Set(input.title),
        description: Set(input.description),
        release_date: Set(input.release_date.map(|d| d.to_string())),
        genre: Set(input.genre),
        director: Set(input.director),
        is_deleted: Set(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{ReviewInput, UserInput},
        reviews::ReviewService,
        testutil::test_db,
        users::UserService,
    };

    fn movie_input(title: &str) -> MovieInput {
        MovieInput {
            title: title.to_string(),
            description: None,
            release_date: None,
            genre: None,
            director: None,
        }
    }

    fn user_input(name: &str) -> UserInput {
        UserInput {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password: "hunter2".to_string(),
        }
    }

    fn review_input(movie_id: i32, user_id: i32, rating: i32) -> ReviewInput {
        ReviewInput { movie_id, user_id, rating, comment: None }
    }

    #[tokio::test]
    async fn zero_review_movie_aggregates_to_zero() {
        let db = test_db().await;
        let movies = MovieService::new(db);

        let id = movies.create(movie_input("Heat")).await.unwrap();
        let summary = movies.summary(id).await.unwrap();
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.review_count, 0);
    }

    #[tokio::test]
    async fn aggregates_are_exact_mean_over_live_reviews() {
        let db = test_db().await;
        let movies = MovieService::new(db.clone());
        let reviews = ReviewService::new(db.clone());
        let users = UserService::new(db);

        let movie_id = movies.create(movie_input("Alien")).await.unwrap();
        let ripley = users.create(user_input("ripley")).await.unwrap();
        let dallas = users.create(user_input("dallas")).await.unwrap();
        reviews.submit(review_input(movie_id, ripley, 7)).await.unwrap();
        reviews.submit(review_input(movie_id, dallas, 4)).await.unwrap();

        let summary = movies.summary(movie_id).await.unwrap();
        assert_eq!(summary.average_rating, 5.5);
        assert_eq!(summary.review_count, 2);

        // Dropping one review shifts the aggregate on the next read.
        let projections = reviews.list().await.unwrap();
        let dallas_review = projections.iter().find(|r| r.user_id == dallas).unwrap();
        reviews.delete(dallas_review.id).await.unwrap();

        let summary = movies.summary(movie_id).await.unwrap();
        assert_eq!(summary.average_rating, 7.0);
        assert_eq!(summary.review_count, 1);
    }

    #[tokio::test]
    async fn duplicate_title_conflicts_until_deleted() {
        let db = test_db().await;
        let movies = MovieService::new(db);

        let id = movies.create(movie_input("Heat")).await.unwrap();
        let err = movies.create(movie_input("Heat")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));

        // A soft-deleted movie no longer reserves its title.
        movies.delete(id).await.unwrap();
        let again = movies.create(movie_input("Heat")).await.unwrap();
        assert_ne!(id, again);
    }

    #[tokio::test]
    async fn bulk_create_is_all_or_nothing() {
        let db = test_db().await;
        let movies = MovieService::new(db);

        movies.create(movie_input("Existing")).await.unwrap();
        let err = movies
            .bulk_create(vec![movie_input("Fresh"), movie_input("Existing")])
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert!(movies.summaries().await.unwrap().iter().all(|m| m.title != "Fresh"));

        let ids = movies
            .bulk_create(vec![movie_input("Fresh"), movie_input("Another")])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn empty_bulk_requests_succeed_with_nothing_to_do() {
        let db = test_db().await;
        let movies = MovieService::new(db);
        movies.create(movie_input("Bystander")).await.unwrap();

        assert!(movies.bulk_create(Vec::new()).await.unwrap().is_empty());

        let outcome = movies.bulk_delete(Vec::new()).await.unwrap();
        assert!(outcome.deleted.is_empty());
        assert!(outcome.blocked.is_empty());
        assert_eq!(outcome.summary, "deleted 0 movies");

        // The no-op batch touched nothing.
        assert_eq!(movies.summaries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bulk_delete_partitions_reviewed_and_unreviewed() {
        let db = test_db().await;
        let movies = MovieService::new(db.clone());
        let reviews = ReviewService::new(db.clone());
        let users = UserService::new(db);

        let a = movies.create(movie_input("Reviewed")).await.unwrap();
        let b = movies.create(movie_input("Plain One")).await.unwrap();
        let c = movies.create(movie_input("Plain Two")).await.unwrap();
        let critic = users.create(user_input("critic")).await.unwrap();
        reviews.submit(review_input(a, critic, 8)).await.unwrap();

        let outcome = movies.bulk_delete(vec![a, b, c, 9999]).await.unwrap();
        assert_eq!(outcome.blocked, vec![a]);
        assert_eq!(outcome.deleted, vec![b, c]);
        assert!(outcome.summary.contains("blocked"));

        // Blocked movie untouched, the others invisible to normal reads.
        assert!(movies.summary(a).await.is_ok());
        assert!(matches!(movies.summary(b).await, Err(ApiError::NotFound(_))));
        assert!(matches!(movies.summary(c).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn bulk_delete_without_conflicts_reports_clean_summary() {
        let db = test_db().await;
        let movies = MovieService::new(db);

        let a = movies.create(movie_input("One")).await.unwrap();
        let b = movies.create(movie_input("Two")).await.unwrap();

        let outcome = movies.bulk_delete(vec![a, b]).await.unwrap();
        assert_eq!(outcome.deleted, vec![a, b]);
        assert!(outcome.blocked.is_empty());
        assert!(!outcome.summary.contains("blocked"));
    }

    #[tokio::test]
    async fn search_composes_filters() {
        let db = test_db().await;
        let movies = MovieService::new(db.clone());
        let reviews = ReviewService::new(db.clone());
        let users = UserService::new(db);

        let mut scifi = movie_input("Blade Runner");
        scifi.genre = Some("scifi".to_string());
        scifi.director = Some("Ridley Scott".to_string());
        scifi.release_date = Some(jiff::civil::date(1982, 6, 25));
        let scifi_id = movies.create(scifi).await.unwrap();

        let mut horror = movie_input("The Thing");
        horror.genre = Some("horror".to_string());
        horror.release_date = Some(jiff::civil::date(1982, 6, 25));
        movies.create(horror).await.unwrap();

        let mut late = movie_input("Dune");
        late.genre = Some("scifi".to_string());
        late.release_date = Some(jiff::civil::date(2021, 10, 22));
        movies.create(late).await.unwrap();

        let critic = users.create(user_input("critic")).await.unwrap();
        reviews.submit(review_input(scifi_id, critic, 8)).await.unwrap();

        let filter = MovieFilter { genre: Some("scifi".to_string()), ..Default::default() };
        let found = movies.search(&filter).await.unwrap();
        assert_eq!(found.len(), 2);

        // Genre matches substrings the same way title and director do.
        let filter = MovieFilter { genre: Some("sci".to_string()), ..Default::default() };
        assert_eq!(movies.search(&filter).await.unwrap().len(), 2);

        let filter = MovieFilter {
            genre: Some("scifi".to_string()),
            release_to: Some(jiff::civil::date(2000, 1, 1)),
            ..Default::default()
        };
        let found = movies.search(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Blade Runner");

        let filter = MovieFilter { title: Some("thing".to_string()), ..Default::default() };
        assert_eq!(movies.search(&filter).await.unwrap().len(), 1);

        // Rating bounds only ever match movies that have reviews.
        let filter = MovieFilter { min_rating: Some(7.0), ..Default::default() };
        let found = movies.search(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, scifi_id);

        let filter = MovieFilter { max_rating: Some(7.0), ..Default::default() };
        assert!(movies.search(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_movies_are_invisible() {
        let db = test_db().await;
        let movies = MovieService::new(db);

        let id = movies.create(movie_input("Gone")).await.unwrap();
        movies.delete(id).await.unwrap();

        assert!(movies.summaries().await.unwrap().is_empty());
        assert!(matches!(movies.summary(id).await, Err(ApiError::NotFound(_))));
        assert!(matches!(movies.details(id).await, Err(ApiError::NotFound(_))));
        assert!(matches!(movies.delete(id).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn details_embed_review_projections() {
        let db = test_db().await;
        let movies = MovieService::new(db.clone());
        let reviews = ReviewService::new(db.clone());
        let users = UserService::new(db);

        let movie_id = movies.create(movie_input("Stalker")).await.unwrap();
        let viewer = users.create(user_input("viewer")).await.unwrap();
        reviews.submit(review_input(movie_id, viewer, 9)).await.unwrap();

        let details = movies.details(movie_id).await.unwrap();
        assert_eq!(details.movie.review_count, 1);
        assert_eq!(details.reviews.len(), 1);
        assert_eq!(details.reviews[0].movie_title, "Stalker");
        assert_eq!(details.reviews[0].username, "viewer");
    }

    #[tokio::test]
    async fn update_refreshes_fields_and_keeps_aggregates() {
        let db = test_db().await;
        let movies = MovieService::new(db.clone());
        let reviews = ReviewService::new(db.clone());
        let users = UserService::new(db);

        let movie_id = movies.create(movie_input("Working Title")).await.unwrap();
        let viewer = users.create(user_input("viewer")).await.unwrap();
        reviews.submit(review_input(movie_id, viewer, 6)).await.unwrap();

        let mut input = movie_input("Final Title");
        input.director = Some("Someone".to_string());
        let updated = movies.update(movie_id, input).await.unwrap();
        assert_eq!(updated.title, "Final Title");
        assert_eq!(updated.review_count, 1);
        assert_eq!(updated.average_rating, 6.0);

        movies.create(movie_input("Taken")).await.unwrap();
        let err = movies.update(movie_id, movie_input("Taken")).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}

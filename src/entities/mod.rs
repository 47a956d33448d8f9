pub mod actor;
pub mod movie;
pub mod movie_actor;
pub mod review;
pub mod review_like;
pub mod user;

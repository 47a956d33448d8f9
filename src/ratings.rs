use serde::Serialize;

use crate::error::{ApiError, ApiResult};

pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub review_count: usize,
}

pub fn validate_rating(rating: i32) -> ApiResult<()> {
    if !(RATING_MIN..=RATING_MAX).contains(&rating) {
        return Err(ApiError::InvalidArgument(format!(
            "rating must be between {RATING_MIN} and {RATING_MAX}, got {rating}"
        )));
    }
    Ok(())
}

pub fn summarize<I>(ratings: I) -> RatingSummary
where
    I: IntoIterator<Item = i32>,
{
    let mut sum: i64 = 0;
    let mut count: usize = 0;
    for rating in ratings {
        sum += i64::from(rating);
        count += 1;
    }
    let average_rating = if count == 0 { 0.0 } else { sum as f64 / count as f64 };
    RatingSummary { average_rating, review_count: count }
}

//! Review qualification: does a story carry a passing review of the target
//! category?

use crate::tracker::{Review, ReviewStatus, ReviewTypeId};

/// True iff at least one review is of `target` category with status `pass`.
/// An empty slice never qualifies.
pub fn is_qualifying(reviews: &[Review], target: ReviewTypeId) -> bool {
    reviews
        .iter()
        .any(|review| review.review_type_id == target && review.status == ReviewStatus::Pass)
}

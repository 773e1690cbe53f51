pub mod notify;
pub mod rate_limit;
pub mod store;
pub mod submission;
mod submit;

use axum::{routing::post, Router};

use crate::AppState;

pub use notify::{Notifier, NotifyError, ResendNotifier};
pub use rate_limit::{
    MemoryRateLimitStore, RateDecision, RateLimitPolicy, RateLimitStore, RateLimiter,
};
pub use store::SubmissionStore;
pub use submission::{BudgetRange, ContactSubmission, NewSubmission, ProjectType, SubmissionStatus};
pub use submit::{client_address, SubmitResponse};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/submit-contact", post(submit::submit_contact).fallback(submit::method_not_allowed))
}

mod auth;
mod submissions;

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::AppState;

pub use submissions::{SubmissionFilter, SubmissionStats};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/submissions", get(submissions::list))
        .route("/submissions/stats", get(submissions::stats))
        .route(
            "/submissions/{id}",
            get(submissions::show)
                .patch(submissions::update_status)
                .delete(submissions::delete),
        )
        .route_layer(from_fn_with_state(state, auth::require_admin))
}

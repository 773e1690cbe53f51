use axum::{
    debug_handler,
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    contact::{ContactSubmission, SubmissionStatus, SubmissionStore},
    AppError, AppResult, GetField,
};

#[derive(Debug, Default, Deserialize)]
pub struct SubmissionFilter {
    pub status: Option<String>,
    pub project_type: Option<String>,
    pub q: Option<String>,
}

impl SubmissionFilter {
    pub fn matches(&self, submission: &ContactSubmission) -> bool {
        if let Some(status) = wanted(&self.status) {
            if submission.status.as_str() != status {
                return false;
            }
        }

        if let Some(project_type) = wanted(&self.project_type) {
            if submission.project_type.map(|v| v.as_str()) != Some(project_type) {
                return false;
            }
        }

        let query = self.q.as_deref().unwrap_or_default().trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        [
            Some(submission.name.as_str()),
            Some(submission.email.as_str()),
            Some(submission.message.as_str()),
            submission.company.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&query))
    }
}

/// `None`, blank and `"all"` mean no filter.
fn wanted(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().map(str::trim).filter(|v| !v.is_empty() && *v != "all")
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStats {
    pub total: usize,
    pub new: usize,
    pub read: usize,
    pub replied: usize,
    pub archived: usize,
}

impl SubmissionStats {
    pub fn tally<'a>(submissions: impl IntoIterator<Item = &'a ContactSubmission>) -> Self {
        let mut stats = SubmissionStats::default();
        for submission in submissions {
            stats.total += 1;
            match submission.status {
                SubmissionStatus::New => stats.new += 1,
                SubmissionStatus::Read => stats.read += 1,
                SubmissionStatus::Replied => stats.replied += 1,
                SubmissionStatus::Archived => stats.archived += 1,
            }
        }
        stats
    }
}

/// An id that is not a UUID cannot name a stored submission.
fn submission_id(path: Result<Path<Uuid>, PathRejection>) -> AppResult<Uuid> {
    path.map(|Path(id)| id).map_err(|_| AppError::NotFound)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list(
    State(submissions): State<SubmissionStore>,
    Query(filter): Query<SubmissionFilter>,
) -> AppResult<Json<Vec<ContactSubmission>>> {
    let all = submissions
        .list()
        .await
        .map_err(AppError::storage("Failed to load submissions."))?;

    Ok(Json(all.into_iter().filter(|s| filter.matches(s)).collect()))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn stats(
    State(submissions): State<SubmissionStore>,
) -> AppResult<Json<SubmissionStats>> {
    let all = submissions
        .list()
        .await
        .map_err(AppError::storage("Failed to load submissions."))?;

    Ok(Json(SubmissionStats::tally(&all)))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn show(
    State(submissions): State<SubmissionStore>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<Json<ContactSubmission>> {
    let id = submission_id(path)?;
    submissions
        .get(id)
        .await
        .map_err(AppError::storage("Failed to load submission."))?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_status(
    State(submissions): State<SubmissionStore>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<ContactSubmission>> {
    let id = submission_id(path)?;
    let Ok(Json(body)) = body else {
        return Err(AppError::validation("Invalid request body"));
    };
    let status = body
        .str_field("status")
        .and_then(|status| status.parse::<SubmissionStatus>().ok())
        .ok_or_else(|| AppError::validation("Status must be one of new, read, replied, archived"))?;

    let updated = submissions
        .update_status(id, status)
        .await
        .map_err(AppError::storage("Failed to update status."))?
        .ok_or(AppError::NotFound)?;

    tracing::info!(%id, %status, "submission status updated");
    Ok(Json(updated))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete(
    State(submissions): State<SubmissionStore>,
    path: Result<Path<Uuid>, PathRejection>,
) -> AppResult<StatusCode> {
    let id = submission_id(path)?;
    let removed = submissions
        .delete(id)
        .await
        .map_err(AppError::storage("Failed to delete submission."))?;

    if !removed {
        return Err(AppError::NotFound);
    }

    tracing::info!(%id, "submission deleted");
    Ok(StatusCode::NO_CONTENT)
}

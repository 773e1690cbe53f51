use axum::{
    debug_handler,
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::{AppError, AppResult, AppState};

use super::{
    rate_limit::{submission_key, RateDecision},
    submission::NewSubmission,
};

pub const UNKNOWN_ADDRESS: &str = "unknown";

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: &'static str,
    pub remaining: u32,
}

/// First `x-forwarded-for` entry, then `cf-connecting-ip`, then `"unknown"`.
pub fn client_address(headers: &HeaderMap) -> String {
    header(headers, "x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header(headers, "cf-connecting-ip"))
        .unwrap_or(UNKNOWN_ADDRESS)
        .to_owned()
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[debug_handler]
pub(crate) async fn submit_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<SubmitResponse>> {
    let Ok(Json(body)) = body else {
        return Err(AppError::validation("Invalid request body"));
    };

    let submission = NewSubmission::from_json(&body)?;

    let address = client_address(&headers);
    let key = submission_key(&address, &submission.email);
    let remaining = match state.limiter.check(&key).await {
        RateDecision::Allowed { remaining, .. } => remaining,
        RateDecision::Limited { reset_in } => {
            let retry_after_ms = reset_in.as_millis() as u64;
            tracing::info!(%key, retry_after_ms, "contact submission rate limited");
            return Err(AppError::RateLimited { retry_after: reset_in });
        }
    };

    let stored = state.submissions
        .insert(&submission)
        .await
        .map_err(AppError::storage("Failed to submit your message. Please try again."))?;

    tracing::info!(id = %stored.id, email = %stored.email, remaining, "contact submission stored");

    if let Some(notifier) = &state.notifier {
        if let Err(err) = notifier.notify(&stored).await {
            tracing::warn!(id = %stored.id, error = %err, "failed to send contact notification");
        }
    }

    Ok(Json(SubmitResponse {
        success: true,
        message: "Your message has been sent successfully!",
        remaining,
    }))
}

pub(crate) async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn prefers_first_forwarded_entry() {
        let map = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("cf-connecting-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_address(&map), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_platform_header_then_unknown() {
        let map = headers(&[("x-forwarded-for", ""), ("cf-connecting-ip", "198.51.100.2")]);
        assert_eq!(client_address(&map), "198.51.100.2");
        assert_eq!(client_address(&HeaderMap::new()), UNKNOWN_ADDRESS);
    }
}

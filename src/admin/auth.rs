use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

use crate::{AppError, AppResult, AppState};

/// Lets a request through only with `Authorization: Bearer <ADMIN_TOKEN>`.
/// Without a configured token every request is refused.
pub(crate) async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    let Some(expected) = state.config.admin_token.as_deref() else {
        return Err(AppError::Unauthorized);
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if !presented.is_some_and(|presented| tokens_match(presented, expected)) {
        tracing::warn!(uri = %request.uri(), "rejected admin request");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Compares digests rather than the tokens, so the time taken depends on
/// neither the token length nor the position of the first mismatch.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let presented = Sha256::digest(presented.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

use axum::{
    body::Body,
    debug_handler,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{config::ChatRelayConfig, include_res, AppError, AppResult, AppState};

use super::message::{ChatRequest, Role};

#[derive(Serialize)]
struct UpstreamMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct UpstreamRequest<'a> {
    model: &'a str,
    messages: Vec<UpstreamMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

#[debug_handler]
pub(crate) async fn ai_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Some(chat) = state.config.chat.as_ref() else {
        return Err(AppError::Unavailable("Chat is not configured"));
    };

    let Ok(Json(request)) = body else {
        return Err(AppError::validation("Invalid request body"));
    };
    if request.captcha_token.trim().is_empty() {
        return Err(AppError::validation("Captcha verification is required"));
    }
    if request.messages.is_empty() || request.messages.iter().any(|m| m.content.trim().is_empty()) {
        return Err(AppError::validation("Messages must not be empty"));
    }

    verify_captcha(&state.http_client, chat, &request.captcha_token).await?;

    let system_prompt = include_res!(str, "/prompts/assistant.md");
    let messages = std::iter::once(UpstreamMessage { role: "system", content: system_prompt })
        .chain(request.messages.iter().map(|m| UpstreamMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: &m.content,
        }))
        .collect();

    let upstream = state.http_client
        .post(&chat.upstream_url)
        .bearer_auth(&chat.upstream_key)
        .json(&UpstreamRequest { model: &chat.model, messages, stream: true })
        .send()
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "chat upstream unreachable");
            AppError::Upstream { status: StatusCode::BAD_GATEWAY, message: "AI gateway error" }
        })?;

    match upstream.status() {
        StatusCode::TOO_MANY_REQUESTS => {
            return Err(AppError::Upstream {
                status: StatusCode::TOO_MANY_REQUESTS,
                message: "Rate limits exceeded, please try again later.",
            });
        }
        StatusCode::PAYMENT_REQUIRED => {
            return Err(AppError::Upstream {
                status: StatusCode::PAYMENT_REQUIRED,
                message: "AI usage limit reached.",
            });
        }
        status if !status.is_success() => {
            let body = upstream.text().await.unwrap_or_default();
            tracing::error!(%status, %body, "chat upstream error");
            return Err(AppError::Upstream {
                status: StatusCode::BAD_GATEWAY,
                message: "AI gateway error",
            });
        }
        _ => {}
    }

    tracing::info!(turns = request.messages.len(), "relaying chat completion");
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(upstream.bytes_stream()),
    ).into_response())
}

const CAPTCHA_UNAVAILABLE: AppError = AppError::Upstream {
    status: StatusCode::BAD_GATEWAY,
    message: "Captcha verification unavailable",
};

async fn verify_captcha(
    http_client: &reqwest::Client,
    chat: &ChatRelayConfig,
    token: &str,
) -> AppResult<()> {
    let Some(secret) = chat.captcha_secret.as_deref() else {
        return Ok(());
    };

    let verdict: SiteVerifyResponse = http_client
        .post(&chat.captcha_verify_url)
        .form(&[("secret", secret), ("response", token)])
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| {
            tracing::error!(error = %err, "captcha verifier unreachable");
            CAPTCHA_UNAVAILABLE
        })?
        .json()
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "unreadable captcha verdict");
            CAPTCHA_UNAVAILABLE
        })?;

    if !verdict.success {
        tracing::info!(codes = ?verdict.error_codes, "captcha rejected");
        return Err(AppError::CaptchaRejected);
    }

    Ok(())
}

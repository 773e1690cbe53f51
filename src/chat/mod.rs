mod client;
mod message;
mod relay;
mod session;
pub mod sse;

use axum::{routing::post, Router};

use crate::AppState;

pub use client::{ChatClient, ChatError, SendOutcome};
pub use message::{ChatMessage, ChatRequest, Role};
pub use session::{ChatSession, InFlight, SendBlocked, SessionState, APOLOGY};
pub use sse::SseDecoder;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ai-chat", post(relay::ai_chat))
}

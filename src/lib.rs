pub mod admin;
pub mod appresult;
pub mod chat;
pub mod config;
pub mod contact;
pub mod db;
pub mod res;

use std::{sync::Arc, time::Duration};

use axum::{
    extract::FromRef,
    http::{header, HeaderName, Method},
    routing::get,
    Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use appresult::{AppError, AppResult};
pub use config::Config;

use contact::{Notifier, RateLimitPolicy, RateLimiter, ResendNotifier, SubmissionStore};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<Config>,
    pub submissions: SubmissionStore,
    pub limiter: RateLimiter,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Wires the default collaborators: an in-memory rate limiter and, when
    /// configured, the Resend notifier.
    pub fn new(config: Config, db_pool: SqlitePool) -> anyhow::Result<AppState> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(config.http_read_timeout)
            .build()?;

        let notifier = config.notify.clone().map(|notify| {
            Arc::new(ResendNotifier::new(http_client.clone(), notify)) as Arc<dyn Notifier>
        });

        Ok(AppState {
            limiter: RateLimiter::in_memory(RateLimitPolicy::from(&config.contact)),
            submissions: SubmissionStore::new(db_pool),
            notifier,
            http_client,
            config: Arc::new(config),
        })
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(contact::router())
        .merge(chat::router())
        .nest("/admin", admin::router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub trait GetField {
    /// The field's value when it is present and a JSON string.
    fn str_field(&self, field: &str) -> Option<&str>;
}

impl GetField for Value {
    fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field)?.as_str()
    }
}

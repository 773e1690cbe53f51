use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;

pub const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com/emails";
pub const DEFAULT_CHAT_UPSTREAM_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_HCAPTCHA_VERIFY_URL: &str = "https://api.hcaptcha.com/siteverify";

/// Process configuration, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Longest silence tolerated on an outbound connection. Not a cap on the
    /// whole exchange, so long completion streams are relayed in full.
    pub http_read_timeout: Duration,
    pub contact: ContactConfig,
    pub notify: Option<NotifyConfig>,
    pub admin_token: Option<String>,
    pub chat: Option<ChatRelayConfig>,
}

#[derive(Debug, Clone)]
pub struct ContactConfig {
    pub max_per_window: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub api_key: String,
    pub api_url: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct ChatRelayConfig {
    pub upstream_url: String,
    pub upstream_key: String,
    pub model: String,
    pub captcha_secret: Option<String>,
    pub captcha_verify_url: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            max_per_window: 3,
            window: Duration::from_secs(60 * 60),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            http_read_timeout: Duration::from_secs(60),
            contact: ContactConfig::default(),
            notify: None,
            admin_token: None,
            chat: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let bind_addr = parse_var("BIND_ADDR")?.unwrap_or(Config::default().bind_addr);

        let http_read_timeout = parse_var("HTTP_READ_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(Config::default().http_read_timeout);

        let defaults = ContactConfig::default();
        let contact = ContactConfig {
            max_per_window: parse_var("CONTACT_MAX_PER_WINDOW")?.unwrap_or(defaults.max_per_window),
            window: parse_var("CONTACT_WINDOW_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
        };

        let notify = var("RESEND_API_KEY").map(|api_key| NotifyConfig {
            api_key,
            api_url: var("RESEND_API_URL").unwrap_or_else(|| DEFAULT_RESEND_API_URL.to_owned()),
            from: var("NOTIFY_FROM")
                .unwrap_or_else(|| "AP Creation <onboarding@resend.dev>".to_owned()),
            to: var("NOTIFY_TO").unwrap_or_else(|| "hello@apcreation.in".to_owned()),
        });

        let chat = var("CHAT_UPSTREAM_KEY").map(|upstream_key| ChatRelayConfig {
            upstream_url: var("CHAT_UPSTREAM_URL")
                .unwrap_or_else(|| DEFAULT_CHAT_UPSTREAM_URL.to_owned()),
            upstream_key,
            model: var("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_owned()),
            captcha_secret: var("HCAPTCHA_SECRET"),
            captcha_verify_url: var("HCAPTCHA_VERIFY_URL")
                .unwrap_or_else(|| DEFAULT_HCAPTCHA_VERIFY_URL.to_owned()),
        });

        if notify.is_none() {
            tracing::warn!("RESEND_API_KEY not set, contact notifications are disabled");
        }
        if chat.as_ref().is_some_and(|chat| chat.captcha_secret.is_none()) {
            tracing::warn!(
                "HCAPTCHA_SECRET not set, chat tokens are accepted without verification"
            );
        }

        Ok(Config {
            database_url,
            bind_addr,
            http_read_timeout,
            contact,
            notify,
            admin_token: var("ADMIN_TOKEN"),
            chat,
        })
    }
}

fn var(key: &str) -> Option<String> {
    dotenv::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var(key)
        .map(|raw| raw.trim().parse::<T>().with_context(|| format!("invalid {key}: {raw}")))
        .transpose()
}

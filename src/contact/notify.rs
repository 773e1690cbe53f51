use std::sync::LazyLock;

use async_trait::async_trait;
use pulldown_cmark::{CowStr, Event, Parser};
use regex::{Captures, Regex};
use serde::Serialize;
use time::format_description::well_known::Rfc2822;

use crate::{config::NotifyConfig, include_res};

use super::submission::ContactSubmission;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("static placeholder pattern"));

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider answered {status}: {body}")]
    Rejected { status: reqwest::StatusCode, body: String },
}

/// Tells a human about a stored submission.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, submission: &ContactSubmission) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    reply_to: &'a str,
    subject: String,
    html: String,
}

/// Sends notifications through the Resend HTTP API.
pub struct ResendNotifier {
    http_client: reqwest::Client,
    config: NotifyConfig,
}

impl ResendNotifier {
    pub fn new(http_client: reqwest::Client, config: NotifyConfig) -> Self {
        Self { http_client, config }
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn notify(&self, submission: &ContactSubmission) -> Result<(), NotifyError> {
        let response = self.http_client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&ResendEmail {
                from: &self.config.from,
                to: [&self.config.to],
                reply_to: &submission.email,
                subject: format!("New contact submission from {}", submission.name),
                html: submission_to_html(submission),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status, body });
        }

        Ok(())
    }
}

pub(crate) fn submission_to_html(submission: &ContactSubmission) -> String {
    let or_dash = |value: Option<&str>| escape(value.unwrap_or("-"));

    // raw html typed into the form is shown as text, not rendered
    let parser = Parser::new(&submission.message).map(|event| match event {
        Event::Html(html) | Event::InlineHtml(html) => Event::Text(html),
        _ => event,
    });
    let mut message_html = String::new();
    pulldown_cmark::html::push_html(&mut message_html, parser);

    let created_at = submission.created_at
        .format(&Rfc2822)
        .unwrap_or_else(|_| submission.created_at.to_string());

    // one pass, so substituted values are never scanned for placeholders
    let template = include_res!(str, "/emails/contact_notification.html");
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match &caps[1] {
            "name" => escape(&submission.name),
            "email" => escape(&submission.email),
            "phone" => or_dash(submission.phone.as_deref()),
            "company" => or_dash(submission.company.as_deref()),
            "project_type" => or_dash(submission.project_type.map(|v| v.label())),
            "budget_range" => or_dash(submission.budget_range.map(|v| v.label())),
            "created_at" => created_at.clone(),
            "message" => message_html.clone(),
            _ => caps[0].to_owned(),
        })
        .into_owned()
}

fn escape(text: &str) -> String {
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, std::iter::once(Event::Text(CowStr::from(text))));
    // values also land inside attributes
    html.replace('"', "&quot;")
}

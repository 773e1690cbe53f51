use serde_json::Value;

use super::{
    message::ChatRequest,
    session::{ChatSession, InFlight, SendBlocked},
};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The relay answered with an error; carries its `error` text.
    #[error("{0}")]
    Rejected(String),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Completed,
    /// The exchange failed and an apology was appended to the conversation.
    Failed,
}

/// Talks to the chat relay on behalf of a [`ChatSession`].
#[derive(Clone)]
pub struct ChatClient {
    http_client: reqwest::Client,
    relay_url: String,
    publishable_key: String,
}

impl ChatClient {
    pub fn new(
        http_client: reqwest::Client,
        relay_url: impl Into<String>,
        publishable_key: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            relay_url: relay_url.into(),
            publishable_key: publishable_key.into(),
        }
    }

    /// Sends `input` and streams the reply into `session`.
    ///
    /// Returns `Err` without issuing a request when the session cannot send.
    /// Transport and relay failures are reported inside the conversation.
    pub async fn send(
        &self,
        session: &mut ChatSession,
        input: &str,
    ) -> Result<SendOutcome, SendBlocked> {
        let (mut in_flight, request) = session.begin(input)?;

        match self.exchange(&mut in_flight, &request).await {
            Ok(()) => Ok(SendOutcome::Completed),
            Err(err) => {
                tracing::warn!(error = %err, "chat exchange failed");
                in_flight.fail(&err);
                Ok(SendOutcome::Failed)
            }
        }
    }

    async fn exchange(
        &self,
        in_flight: &mut InFlight<'_>,
        request: &ChatRequest,
    ) -> Result<(), ChatError> {
        let response = self.http_client
            .post(&self.relay_url)
            .bearer_auth(&self.publishable_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: Value = response
                .json()
                .await
                .unwrap_or_else(|_| serde_json::json!({ "error": "Something went wrong" }));
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or("Failed to get response");
            tracing::debug!(%status, message, "chat relay refused request");
            return Err(ChatError::Rejected(message.to_owned()));
        }

        in_flight.consume_stream(response.bytes_stream()).await
    }
}

use std::ops::{Deref, DerefMut};

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};

use super::{
    message::{ChatMessage, ChatRequest, Role},
    sse::SseDecoder,
    ChatError,
};

pub const APOLOGY: &str = "Sorry, something went wrong.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No verification token; sending is blocked.
    Unverified,
    /// Token present and idle.
    Verified,
    /// A request is in flight.
    Sending,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendBlocked {
    #[error("message is empty")]
    EmptyMessage,
    #[error("a reply is still streaming")]
    AlreadySending,
    #[error("human verification required")]
    Unverified,
}

/// One visitor's conversation with the assistant.
///
/// Messages are append-only except for the assistant reply currently being
/// streamed, which is always the last element.
#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    captcha_token: Option<String>,
    in_flight: bool,
    /// Bumped by every reset; a reply started under an older value is discarded.
    conversation: u64,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.in_flight {
            SessionState::Sending
        } else if self.captcha_token.is_some() {
            SessionState::Verified
        } else {
            SessionState::Unverified
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn captcha_token(&self) -> Option<&str> {
        self.captcha_token.as_deref()
    }

    /// Widget success callback. An empty token counts as no token.
    pub fn verify(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.captcha_token = (!token.trim().is_empty()).then_some(token);
    }

    /// Widget expiry callback.
    pub fn expire(&mut self) {
        self.captcha_token = None;
    }

    /// Starts a new conversation: history and token are dropped, so the
    /// verification widget has to be solved again. A reply still streaming
    /// for the old conversation is discarded as it arrives.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.captcha_token = None;
        self.conversation += 1;
    }

    /// Checks the send preconditions, appends the user message and marks the
    /// session busy until the returned guard is dropped.
    pub fn begin(&mut self, input: &str) -> Result<(InFlight<'_>, ChatRequest), SendBlocked> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SendBlocked::EmptyMessage);
        }
        if self.in_flight {
            return Err(SendBlocked::AlreadySending);
        }
        let Some(captcha_token) = self.captcha_token.clone() else {
            return Err(SendBlocked::Unverified);
        };

        self.messages.push(ChatMessage::user(input));
        let request = ChatRequest {
            messages: self.messages.clone(),
            captcha_token,
        };

        self.in_flight = true;
        let conversation = self.conversation;
        Ok((InFlight { session: self, conversation }, request))
    }

    /// Replaces the streaming assistant reply with `so_far`, or starts one.
    fn show_reply(&mut self, so_far: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == Role::Assistant => so_far.clone_into(&mut last.content),
            _ => self.messages.push(ChatMessage::assistant(so_far)),
        }
    }

    fn show_error(&mut self, err: &ChatError) {
        let detail = err.to_string();
        let detail = if detail.trim().is_empty() { "Please try again." } else { detail.as_str() };
        self.messages.push(ChatMessage::assistant(format!("{APOLOGY} {detail}")));
    }
}

/// Exclusive access to a session with a request in flight. Dropping it,
/// including by cancelling the future that holds it, clears the busy flag.
pub struct InFlight<'a> {
    session: &'a mut ChatSession,
    conversation: u64,
}

impl InFlight<'_> {
    /// Whether the conversation this request belongs to has been reset.
    pub fn is_abandoned(&self) -> bool {
        self.session.conversation != self.conversation
    }

    /// Reads the reply stream to its end, updating the assistant message as
    /// each fragment arrives.
    pub async fn consume_stream<S, E>(&mut self, stream: S) -> Result<(), ChatError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<ChatError>,
    {
        let mut decoder = SseDecoder::new();
        let mut so_far = String::new();

        let mut stream = std::pin::pin!(stream);
        while let Some(chunk) = stream.next().await {
            if self.is_abandoned() {
                return Ok(());
            }
            let chunk = chunk.map_err(Into::<ChatError>::into)?;
            for fragment in decoder.push(&chunk) {
                so_far.push_str(&fragment);
                self.session.show_reply(&so_far);
            }
        }

        Ok(())
    }

    /// Records a failed exchange as a single apologetic assistant message.
    pub fn fail(&mut self, err: &ChatError) {
        if !self.is_abandoned() {
            self.session.show_error(err);
        }
    }
}

impl Deref for InFlight<'_> {
    type Target = ChatSession;

    fn deref(&self) -> &ChatSession {
        self.session
    }
}

impl DerefMut for InFlight<'_> {
    fn deref_mut(&mut self) -> &mut ChatSession {
        self.session
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.session.in_flight = false;
    }
}

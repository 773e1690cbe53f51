//! Incremental decoder for `data: <json>` completion frames.
//!
//! Bytes arrive in arbitrary chunks. Decoded text accumulates in `buffer`
//! and only newline-terminated lines are interpreted; a trailing multi-byte
//! character cut by a chunk boundary waits in `utf8_tail` until the rest of
//! its bytes arrive.

use serde_json::Value;

const DATA_PREFIX: &str = "data: ";
const DONE: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    utf8_tail: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the text fragments it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.decode(chunk);
        self.drain_lines()
    }

    /// Text received but not yet consumed as a complete line.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    fn decode(&mut self, chunk: &[u8]) {
        let mut bytes = std::mem::take(&mut self.utf8_tail);
        bytes.extend_from_slice(chunk);

        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    self.buffer.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        None => {
                            self.utf8_tail = after.to_vec();
                            return;
                        }
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut fragments = Vec::new();

        while let Some(newline) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }

            if line.starts_with(':') || line.trim().is_empty() {
                continue;
            }
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                continue;
            };

            let payload = payload.trim();
            if payload == DONE {
                // anything after the terminator stays buffered for the next chunk
                break;
            }

            match serde_json::from_str::<Value>(payload) {
                Ok(frame) => {
                    if let Some(text) = delta_content(&frame) {
                        fragments.push(text.to_owned());
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "incomplete frame, waiting for more bytes");
                    self.buffer.insert(0, '\n');
                    self.buffer.insert_str(0, &line);
                    break;
                }
            }
        }

        fragments
    }
}

/// `choices[0].delta.content`, when it is a non-empty string.
fn delta_content(frame: &Value) -> Option<&str> {
    frame
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

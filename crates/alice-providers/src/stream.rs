use std::fmt::Display;

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::{CompletionStream, Dialect};

/// What one decoded line of a streamed reply contributes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LineOutcome {
    pub text: Option<String>,
    pub done: bool,
}

impl LineOutcome {
    pub fn skip() -> Self {
        Self::default()
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            text: None,
            done: true,
        }
    }
}

/// Reassembles lines from network chunks. Multi-byte UTF-8 sequences split
/// across chunks are held back until complete.
#[derive(Debug, Default)]
pub struct LineDecoder {
    bytes: Vec<u8>,
    text: String,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every complete non-blank line it finishes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.bytes.extend_from_slice(chunk);

        match std::str::from_utf8(&self.bytes) {
            Ok(s) => {
                self.text.push_str(s);
                self.bytes.clear();
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if e.error_len().is_some() {
                    // Invalid rather than incomplete; nothing later can fix it.
                    let all = std::mem::take(&mut self.bytes);
                    self.text.push_str(&String::from_utf8_lossy(&all));
                } else if valid_up_to > 0 {
                    let valid: Vec<u8> = self.bytes.drain(..valid_up_to).collect();
                    self.text.push_str(&String::from_utf8_lossy(&valid));
                }
            }
        }

        let mut lines = Vec::new();
        while let Some(line_end) = self.text.find('\n') {
            let line = self.text[..line_end].trim().to_string();
            self.text.drain(..line_end + 1);
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    /// The trailing line of a body that did not end with a newline.
    pub fn finish(&mut self) -> Option<String> {
        if !self.bytes.is_empty() {
            let rest = std::mem::take(&mut self.bytes);
            self.text.push_str(&String::from_utf8_lossy(&rest));
        }
        let line = std::mem::take(&mut self.text).trim().to_string();
        (!line.is_empty()).then_some(line)
    }
}

pub(crate) fn error_fragment(message: impl Display) -> String {
    format!("\n[Error: {}]", message)
}

/// A stream holding exactly one error fragment.
pub(crate) fn error_stream(message: impl Display) -> CompletionStream {
    let (tx, rx) = mpsc::channel(1);
    // Capacity 1 and a fresh receiver: this cannot fail.
    let _ = tx.try_send(error_fragment(message));
    ReceiverStream::new(rx)
}

/// Decode a streamed response body into text fragments on a background task.
///
/// Read errors end the stream with a single `\n[Error: …]` fragment.
pub fn decode_stream<S, E>(dialect: Dialect, body: S) -> CompletionStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(pump(dialect, body, tx));
    ReceiverStream::new(rx)
}

async fn pump<S, E>(dialect: Dialect, body: S, tx: mpsc::Sender<String>)
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut body = Box::pin(body);
    let mut decoder = LineDecoder::new();

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for line in decoder.push(&bytes) {
                    if !forward(dialect, &line, &tx).await {
                        return;
                    }
                }
            }
            Err(e) => {
                error!("Stream error: {}", e);
                let _ = tx.send(error_fragment(e)).await;
                return;
            }
        }
    }

    if let Some(line) = decoder.finish() {
        forward(dialect, &line, &tx).await;
    }
    debug!("Stream completed");
}

/// Returns false once the stream should stop.
async fn forward(dialect: Dialect, line: &str, tx: &mpsc::Sender<String>) -> bool {
    let outcome = dialect.parse_stream_line(line);
    if let Some(text) = outcome.text {
        if tx.send(text).await.is_err() {
            debug!("Receiver dropped, stopping stream");
            return false;
        }
    }
    !outcome.done
}

//! Server-Sent-Events tokenizing.
//!
//! The transport yields raw text lines; each line becomes at most one
//! [`StreamEvent`]. Adapters consume events one at a time and never see the
//! stream as a whole.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::errors::AiResult;

/// One unit of a streamed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Id(String),
    Event(String),
    Data(String),
}

impl StreamEvent {
    pub fn data(&self) -> Option<&str> {
        match self {
            StreamEvent::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// Tokenize a single line.
///
/// Blank lines and `:` comments yield `None`. Lines without a recognised
/// field name are passed through as data, which is how newline-delimited
/// JSON streams arrive.
pub fn parse_sse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with(':') {
        return None;
    }

    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };

    match field {
        "data" => Some(StreamEvent::Data(value.to_string())),
        "event" => Some(StreamEvent::Event(value.to_string())),
        "id" => Some(StreamEvent::Id(value.to_string())),
        "retry" => None,
        _ => Some(StreamEvent::Data(line.to_string())),
    }
}

/// Adapts a stream of lines into a stream of events, skipping lines that
/// carry none.
pub struct SseEvents<S> {
    lines: S,
}

impl<S> SseEvents<S> {
    pub fn new(lines: S) -> Self {
        Self { lines }
    }
}

impl<S> Stream for SseEvents<S>
where
    S: Stream<Item = AiResult<String>> + Unpin,
{
    type Item = AiResult<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.lines).poll_next(cx) {
                Poll::Ready(Some(Ok(line))) => {
                    if let Some(event) = parse_sse_line(&line) {
                        return Poll::Ready(Some(Ok(event)));
                    }
                }
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(e))),
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

//! Loop events and their NDJSON wire encoding.
//!
//! The controller writes [`LoopEvent`]s into a channel in the order they
//! happen; the gateway and the CLI turn them into newline-delimited JSON.
//! Each line on the wire is exactly one of:
//!
//! - `{"chunk": "..."}`                          text fragment
//! - `{"proposal": "..."}`                       command block awaiting approval
//! - `{"limit_reached": true, "iterations": N}`  iteration limit hit
//!
//! `Done` and `ExecutorUnavailable` end the stream without a frame of their
//! own; a caller sees the end of the stream instead.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

/// Events emitted by the loop controller, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Text for the caller: model fragments, markers, announces, results.
    Chunk(String),

    /// Raw text of one command block, emitted when auto-execute is off.
    Proposal(String),

    /// The iteration limit was exhausted. Terminal.
    LimitReached { iterations: u32 },

    /// Commands were extracted but no executor could run them. Terminal.
    ExecutorUnavailable,

    /// The model answered without commands. Terminal.
    Done { completed: bool },
}

impl LoopEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::LimitReached { .. } | Self::ExecutorUnavailable | Self::Done { .. }
        )
    }

    /// The frame this event puts on the wire, if any.
    pub fn wire_frame(&self) -> Option<WireFrame> {
        match self {
            Self::Chunk(text) => Some(WireFrame::Chunk { chunk: text.clone() }),
            Self::Proposal(raw) => Some(WireFrame::Proposal {
                proposal: raw.clone(),
            }),
            Self::LimitReached { iterations } => Some(WireFrame::LimitReached {
                limit_reached: true,
                iterations: *iterations,
            }),
            Self::ExecutorUnavailable | Self::Done { .. } => None,
        }
    }
}

/// One NDJSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireFrame {
    Chunk { chunk: String },
    Proposal { proposal: String },
    LimitReached { limit_reached: bool, iterations: u32 },
}

/// Encode an event as a single `\n`-terminated JSON line.
pub fn to_ndjson_line(event: &LoopEvent) -> Option<String> {
    let frame = event.wire_frame()?;
    match serde_json::to_string(&frame) {
        Ok(mut line) => {
            line.push('\n');
            Some(line)
        }
        Err(e) => {
            warn!(error = %e, "Failed to encode loop event");
            None
        }
    }
}

/// Adapt the controller's receiver into a lazily produced stream of NDJSON lines.
///
/// Dropping the stream drops the receiver, which cancels the invocation.
pub fn ndjson_stream(rx: mpsc::Receiver<LoopEvent>) -> impl Stream<Item = String> + Send + 'static {
    ReceiverStream::new(rx).filter_map(|event| to_ndjson_line(&event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_frame() {
        let line = to_ndjson_line(&LoopEvent::Chunk("Hello\n".into())).unwrap();
        assert_eq!(line, "{\"chunk\":\"Hello\\n\"}\n");
    }

    #[test]
    fn proposal_frame() {
        let line = to_ndjson_line(&LoopEvent::Proposal("ls -la".into())).unwrap();
        assert_eq!(line, "{\"proposal\":\"ls -la\"}\n");
    }

    #[test]
    fn limit_frame() {
        let line = to_ndjson_line(&LoopEvent::LimitReached { iterations: 3 }).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value, serde_json::json!({"limit_reached": true, "iterations": 3}));
    }

    #[test]
    fn silent_terminals_have_no_frame() {
        assert!(to_ndjson_line(&LoopEvent::Done { completed: true }).is_none());
        assert!(to_ndjson_line(&LoopEvent::ExecutorUnavailable).is_none());
        assert!(LoopEvent::ExecutorUnavailable.is_terminal());
        assert!(!LoopEvent::Chunk(String::new()).is_terminal());
    }

    #[test]
    fn frames_parse_back_by_shape() {
        let frame: WireFrame = serde_json::from_str(r#"{"proposal":"id"}"#).unwrap();
        assert_eq!(frame, WireFrame::Proposal { proposal: "id".into() });

        let frame: WireFrame = serde_json::from_str(r#"{"limit_reached":true,"iterations":10}"#).unwrap();
        assert!(matches!(frame, WireFrame::LimitReached { iterations: 10, .. }));
    }

    #[tokio::test]
    async fn stream_preserves_order_and_skips_silent_events() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(LoopEvent::Chunk("a".into())).await.unwrap();
        tx.send(LoopEvent::Proposal("b".into())).await.unwrap();
        tx.send(LoopEvent::Done { completed: false }).await.unwrap();
        drop(tx);

        let lines: Vec<String> = ndjson_stream(rx).collect().await;
        assert_eq!(lines, vec!["{\"chunk\":\"a\"}\n", "{\"proposal\":\"b\"}\n"]);
    }
}

//! Worker output handling
//!
//! Stdout carries the readiness handshake followed by framed log messages;
//! stderr carries framed error messages. Each stream is read line by line on
//! its own task and fed through a [`LogAccumulator`].

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, LinesCodec};

use wh_core::OutputStream;
use wh_protocol::{is_handshake, parse_handshake, Endpoint, LogAccumulator};

/// `tracing` target for messages relayed from the worker
pub const WORKER_LOG_TARGET: &str = "workerhost::worker";

/// Longest line accepted from the worker before the stream is abandoned
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Readiness of one worker generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReadyState {
    /// Spawned, handshake not seen yet
    Starting,
    /// Handshake received
    Ready(Endpoint),
    /// The handshake can no longer arrive
    Lost(String),
}

/// Read worker stdout, publishing the handshake and logging messages at info
pub(crate) async fn relay_stdout(generation: u64, stream: OutputStream, ready: watch::Sender<ReadyState>) {
    let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut accumulator = LogAccumulator::new();

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(generation, "Failed to read worker stdout: {}", e);
                break;
            }
        };

        if is_handshake(&line) && *ready.borrow() == ReadyState::Starting {
            let state = match parse_handshake(&line) {
                Ok(endpoint) => {
                    tracing::info!(generation, %endpoint, "Worker ready");
                    ReadyState::Ready(endpoint)
                }
                Err(e) => {
                    tracing::error!(generation, "Worker sent a malformed handshake: {}", e);
                    ReadyState::Lost(e.to_string())
                }
            };
            ready.send_replace(state);
            continue;
        }

        if let Some(message) = accumulator.push_line(&line) {
            tracing::info!(target: WORKER_LOG_TARGET, generation, "{}", message);
        }
    }

    if let Some(message) = accumulator.flush() {
        tracing::info!(target: WORKER_LOG_TARGET, generation, "{}", message);
    }

    ready.send_if_modified(|state| {
        if *state == ReadyState::Starting {
            *state = ReadyState::Lost("worker output closed before the handshake".to_string());
            true
        } else {
            false
        }
    });
    tracing::debug!(generation, "Worker stdout closed");
}

/// Read worker stderr, logging messages at error
pub(crate) async fn relay_stderr(generation: u64, stream: OutputStream) {
    let mut lines = FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
    let mut accumulator = LogAccumulator::new();

    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                if let Some(message) = accumulator.push_line(&line) {
                    tracing::error!(target: WORKER_LOG_TARGET, generation, "{}", message);
                }
            }
            Err(e) => {
                tracing::warn!(generation, "Failed to read worker stderr: {}", e);
                break;
            }
        }
    }

    if let Some(message) = accumulator.flush() {
        tracing::error!(target: WORKER_LOG_TARGET, generation, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(text: &'static str) -> OutputStream {
        Box::new(text.as_bytes())
    }

    #[tokio::test]
    async fn test_handshake_marks_ready() {
        let (tx, rx) = watch::channel(ReadyState::Starting);
        relay_stdout(
            1,
            stream("booting\0\n[workerhost: Listening on IP - 127.0.0.1 Port - 4100]\nlog\0\n"),
            tx,
        )
        .await;

        let expected: Endpoint = "127.0.0.1:4100".parse::<std::net::SocketAddr>().unwrap().into();
        assert_eq!(*rx.borrow(), ReadyState::Ready(expected));
    }

    #[tokio::test]
    async fn test_closed_without_handshake_is_lost() {
        let (tx, rx) = watch::channel(ReadyState::Starting);
        relay_stdout(1, stream("crashed\0\n"), tx).await;

        assert!(matches!(*rx.borrow(), ReadyState::Lost(_)));
    }

    #[tokio::test]
    async fn test_malformed_handshake_is_lost() {
        let (tx, rx) = watch::channel(ReadyState::Starting);
        relay_stdout(1, stream("[workerhost: Listening on IP - nowhere Port - 1]\n"), tx).await;

        assert!(matches!(*rx.borrow(), ReadyState::Lost(_)));
    }

    #[tokio::test]
    async fn test_second_handshake_is_ignored() {
        let (tx, rx) = watch::channel(ReadyState::Starting);
        relay_stdout(
            1,
            stream(concat!(
                "[workerhost: Listening on IP - 127.0.0.1 Port - 1000]\n",
                "[workerhost: Listening on IP - 127.0.0.1 Port - 2000]\0\n",
            )),
            tx,
        )
        .await;

        match &*rx.borrow() {
            ReadyState::Ready(endpoint) => assert_eq!(endpoint.port(), 1000),
            other => panic!("Expected Ready state, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn test_overlong_line_stops_reading() {
        let (tx, rx) = watch::channel(ReadyState::Starting);
        let mut output = vec![b'x'; MAX_LINE_LENGTH + 1];
        output.extend_from_slice(b"\n[workerhost: Listening on IP - 127.0.0.1 Port - 4100]\n");
        relay_stdout(1, Box::new(std::io::Cursor::new(output)), tx).await;

        assert!(matches!(*rx.borrow(), ReadyState::Lost(_)));
    }

    #[tokio::test]
    async fn test_stderr_drains_to_end() {
        relay_stderr(1, stream("first\nsecond\0\nunterminated")).await;
    }
}

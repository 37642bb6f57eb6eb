//! Native-messaging bridge
//!
//! The browser talks to the host over stdin/stdout with length-prefixed JSON:
//! a native-endian `u32` byte count followed by a UTF-8 JSON payload.

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

mod messages;
pub use messages::{BridgeMessage, BridgeReply};

use crate::constants::bridge::{MAX_INBOUND_FRAME, MAX_OUTBOUND_FRAME};

/// What the reader task forwards to the event loop
#[derive(Debug)]
pub enum Inbound {
    Message(BridgeMessage),
    /// Input ended or became unreadable; no more messages will follow
    Closed,
}

/// Serialize a message into one frame (length prefix included)
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_OUTBOUND_FRAME {
        bail!("Message too large: {} bytes (max: {})", json.len(), MAX_OUTBOUND_FRAME);
    }
    let mut frame = Vec::with_capacity(4 + json.len());
    frame.extend_from_slice(&(json.len() as u32).to_ne_bytes());
    frame.extend_from_slice(&json);
    Ok(frame)
}

/// Outbound half of the bridge
pub struct BridgeWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> BridgeWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write one message; messages the browser would reject are dropped with a warning
    pub async fn send<T: Serialize>(&mut self, msg: &T) -> Result<()> {
        let frame = match encode_frame(msg) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Dropping outbound message");
                return Ok(());
            }
        };
        self.writer
            .write_all(&frame)
            .await
            .context("Failed to write message frame")
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await.context("Failed to flush stream")
    }
}

/// Read one frame payload; `None` on a clean end of stream between frames
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader
            .read(&mut len_buf[filled..])
            .await
            .context("Failed to read message length")?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            bail!("Stream ended inside a length prefix");
        }
        filled += n;
    }
    let len = u32::from_ne_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_INBOUND_FRAME {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_INBOUND_FRAME));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .context("Failed to read message payload")?;
    Ok(Some(payload))
}

/// Forward inbound messages to the event loop until the input ends.
///
/// Malformed payloads are skipped; framing errors end the stream since the
/// next length prefix can no longer be trusted.
pub fn spawn_reader<R>(mut reader: R, sender: mpsc::Sender<Inbound>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        info!("Bridge reader started");
        loop {
            let payload = match read_frame(&mut reader).await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    info!("Bridge input closed");
                    break;
                }
                Err(e) => {
                    error!(error = ?e, "Bridge framing error, closing input");
                    break;
                }
            };
            let message = match serde_json::from_slice::<BridgeMessage>(&payload) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, bytes = payload.len(), "Skipping malformed bridge message");
                    continue;
                }
            };
            debug!(message = message_kind(&message), "Bridge message received");
            if sender.send(Inbound::Message(message)).await.is_err() {
                debug!("Event loop gone, stopping reader");
                return;
            }
        }
        let _ = sender.send(Inbound::Closed).await;
    })
}

fn message_kind(message: &BridgeMessage) -> &'static str {
    match message {
        BridgeMessage::Mutations { .. } => "mutations",
        BridgeMessage::Settings { .. } => "settings",
        BridgeMessage::Viewport(_) => "viewport",
        BridgeMessage::LayoutChanged => "layout_changed",
        BridgeMessage::Ping => "ping",
        BridgeMessage::Shutdown => "shutdown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = (payload.len() as u32).to_ne_bytes().to_vec();
        frame.extend_from_slice(payload);
        frame
    }

    #[tokio::test]
    async fn test_writer_frames_and_skips_oversized() {
        let mut writer = BridgeWriter::new(Vec::new());
        writer.send(&json!({ "type": "ping" })).await.unwrap();
        writer.send(&"x".repeat(MAX_OUTBOUND_FRAME)).await.unwrap();
        writer.send(&json!({ "type": "shutdown" })).await.unwrap();
        writer.flush().await.unwrap();
        let buf = writer.writer;

        let mut reader = buf.as_slice();
        let first = read_frame(&mut reader).await.unwrap().unwrap();
        let second = read_frame(&mut reader).await.unwrap().unwrap();
        assert_eq!(serde_json::from_slice::<BridgeMessage>(&first).unwrap(), BridgeMessage::Ping);
        assert_eq!(serde_json::from_slice::<BridgeMessage>(&second).unwrap(), BridgeMessage::Shutdown);
        assert!(read_frame(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_inbound_rejected() {
        let bytes = ((MAX_INBOUND_FRAME + 1) as u32).to_ne_bytes();
        let mut reader = &bytes[..];
        let err = read_frame(&mut reader).await.unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[tokio::test]
    async fn test_truncated_prefix_is_an_error() {
        let mut reader: &[u8] = &[1, 0];
        assert!(read_frame(&mut reader).await.is_err());
    }

    #[test]
    fn test_oversized_outbound_rejected() {
        let big = "x".repeat(MAX_OUTBOUND_FRAME);
        assert!(encode_frame(&big).is_err());
        let frame = encode_frame(&"ok").unwrap();
        assert_eq!(&frame[..4], &4u32.to_ne_bytes());
        assert_eq!(&frame[4..], b"\"ok\"");
    }

    #[tokio::test]
    async fn test_reader_skips_garbage_and_reports_close() {
        let mut input = raw_frame(b"{not json");
        input.extend(raw_frame(br#"{"type":"unknown"}"#));
        input.extend(raw_frame(br#"{"type":"ping"}"#));

        let (tx, mut rx) = mpsc::channel(8);
        let handle = spawn_reader(std::io::Cursor::new(input), tx);

        assert!(matches!(rx.recv().await, Some(Inbound::Message(BridgeMessage::Ping))));
        assert!(matches!(rx.recv().await, Some(Inbound::Closed)));
        handle.await.unwrap();
    }
}

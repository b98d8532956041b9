//! Incremental decoder for the engine's `data: <json>\n\n` frames
//!
//! Input arrives as raw byte chunks, so a frame (and a multi-byte UTF-8
//! sequence inside it) may straddle any number of reads. Bytes are buffered
//! until a blank-line boundary is seen; only complete frames are decoded.

use crate::engine::events::EngineEvent;
use thiserror::Error;

const FRAME_BOUNDARY: &[u8] = b"\n\n";

/// Error types for a single malformed frame
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Frame is not a valid event ({source}): {frame}")]
    Json {
        frame: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode every complete frame in `buffer + chunk`
///
/// Returns the decoded events in arrival order and the bytes of the trailing
/// partial frame, which should be passed back in with the next chunk. Frames
/// without any `data:` line (comments, keep-alives) yield nothing.
///
/// `buffer` must be empty or a remainder returned by an earlier call; it is
/// assumed to hold no boundary, so only its last byte is searched again.
pub fn decode(mut buffer: Vec<u8>, chunk: &[u8]) -> (Vec<Result<EngineEvent, DecodeError>>, Vec<u8>) {
    let mut search_from = buffer.len().saturating_sub(FRAME_BOUNDARY.len() - 1);
    buffer.extend_from_slice(chunk);

    let mut events = Vec::new();
    let mut start = 0;
    while let Some(pos) = find_boundary(&buffer[search_from..]) {
        let end = search_from + pos;
        let frame = &buffer[start..end];
        start = end + FRAME_BOUNDARY.len();
        search_from = start;
        if let Some(event) = decode_frame(frame) {
            events.push(event);
        }
    }

    buffer.drain(..start);
    (events, buffer)
}

fn find_boundary(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(FRAME_BOUNDARY.len())
        .position(|window| window == FRAME_BOUNDARY)
}

fn decode_frame(frame: &[u8]) -> Option<Result<EngineEvent, DecodeError>> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text,
        Err(e) => return Some(Err(e.into())),
    };

    let data: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();
    if data.is_empty() {
        return None;
    }

    let payload = data.join("\n");
    Some(
        serde_json::from_str(&payload).map_err(|source| DecodeError::Json {
            frame: payload,
            source,
        }),
    )
}

/// Stateful wrapper around [`decode`] holding the partial-frame buffer
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and take the events it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<EngineEvent, DecodeError>> {
        let (events, rest) = decode(std::mem::take(&mut self.buffer), chunk);
        self.buffer = rest;
        events
    }

    /// Bytes of an unfinished frame
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// True when no partial frame is buffered, ignoring whitespace
    pub fn is_idle(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

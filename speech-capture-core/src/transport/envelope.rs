//! Wire messages exchanged with the speech service.
//!
//! Outbound audio is framed as
//! `{"type":"realtime_input","media_chunks":[{"data":"<base64 PCM16LE>"}]}`.
//! The handshake sends `{"type":"authenticate","token":..}` and waits for
//! `{"type":"auth_success",..}`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::error::CaptureError;
use crate::processing::pcm_encoder;

/// Messages sent by the capture side.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage<'a> {
    Authenticate {
        token: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<&'a Value>,
    },
    RealtimeInput {
        media_chunks: [MediaChunk<'a>; 1],
    },
}

#[derive(Debug, Serialize)]
pub struct MediaChunk<'a> {
    pub data: &'a str,
}

/// Messages received from the speech service that this crate understands.
///
/// Only the `type` discriminant is inspected; other fields are ignored and
/// every type other than `auth_success` belongs to the receiving application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AuthSuccess,
    #[serde(other)]
    Other,
}

impl ServerMessage {
    pub fn is_auth_success(&self) -> bool {
        matches!(self, Self::AuthSuccess)
    }
}

pub fn parse_server_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

pub fn authenticate_message(token: &str, context: Option<&Value>) -> Result<String, CaptureError> {
    serde_json::to_string(&ClientMessage::Authenticate { token, context })
        .map_err(|e| CaptureError::TransportError(format!("failed to serialize authenticate: {}", e)))
}

/// Serializes PCM frames into `realtime_input` envelopes.
///
/// Holds its byte, base64 and JSON buffers across calls so that, once sized
/// for the largest frame, encoding a block does not allocate.
#[derive(Debug, Default)]
pub struct FrameEncoder {
    pcm_bytes: Vec<u8>,
    base64: String,
    json: Vec<u8>,
}

impl FrameEncoder {
    /// Pre-size buffers for frames of up to `max_samples` PCM words.
    pub fn with_capacity(max_samples: usize) -> Self {
        let byte_len = max_samples * 2;
        let base64_len = byte_len.div_ceil(3) * 4;
        Self {
            pcm_bytes: Vec::with_capacity(byte_len),
            base64: String::with_capacity(base64_len),
            json: Vec::with_capacity(base64_len + 64),
        }
    }

    /// Encode `frame` and return the envelope text, valid until the next call.
    pub fn encode(&mut self, frame: &[i16]) -> Result<&str, CaptureError> {
        pcm_encoder::frame_to_le_bytes_into(frame, &mut self.pcm_bytes);

        self.base64.clear();
        STANDARD.encode_string(&self.pcm_bytes, &mut self.base64);

        self.json.clear();
        let message = ClientMessage::RealtimeInput {
            media_chunks: [MediaChunk { data: &self.base64 }],
        };
        serde_json::to_writer(&mut self.json, &message)
            .map_err(|e| CaptureError::ProcessingError(format!("failed to serialize frame: {}", e)))?;

        std::str::from_utf8(&self.json)
            .map_err(|e| CaptureError::ProcessingError(format!("envelope is not UTF-8: {}", e)))
    }

    /// Raw PCM byte length of the most recently encoded frame.
    pub fn payload_len(&self) -> usize {
        self.pcm_bytes.len()
    }
}

#[derive(Deserialize)]
struct InboundEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    media_chunks: Vec<InboundChunk>,
}

#[derive(Deserialize)]
struct InboundChunk {
    data: String,
}

/// Parse a `realtime_input` envelope back into PCM words.
///
/// Multiple media chunks are concatenated in order.
pub fn decode_realtime_input(text: &str) -> Result<Vec<i16>, CaptureError> {
    let envelope: InboundEnvelope = serde_json::from_str(text)
        .map_err(|e| CaptureError::TransportError(format!("malformed envelope: {}", e)))?;
    if envelope.kind != "realtime_input" {
        return Err(CaptureError::TransportError(format!(
            "unexpected message type: {}",
            envelope.kind
        )));
    }

    let mut bytes = Vec::new();
    for chunk in &envelope.media_chunks {
        let decoded = STANDARD
            .decode(&chunk.data)
            .map_err(|e| CaptureError::TransportError(format!("invalid base64 payload: {}", e)))?;
        bytes.extend_from_slice(&decoded);
    }
    Ok(pcm_encoder::frame_from_le_bytes(&bytes))
}

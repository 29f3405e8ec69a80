//! # Bridge Wire Messages
//!
//! Typed JSON messages for both sides of a call:
//!
//! - **Telephony side**: the media-stream socket speaks events tagged by an
//!   `event` field (`connected`, `start`, `media`, `stop`, `mark`). Only
//!   `start`, `media` and `stop` carry meaning for the bridge; the rest are
//!   accepted and ignored so they are not mistaken for malformed traffic.
//! - **Model side**: the realtime socket speaks events tagged by a `type`
//!   field. Outbound commands are fully typed; inbound events go through a
//!   tolerant reader because the protocol surface is large and only the
//!   audio deltas (under either of two revision-dependent names) matter.

use serde::{Deserialize, Serialize};

/// Inbound message from the telephony media-stream socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// Socket-level handshake acknowledgement; carries nothing we need.
    Connected,

    /// Stream metadata; carries the opaque call/stream identifier.
    Start { start: StreamStart },

    /// One frame of companded audio.
    Media { media: MediaFrame },

    /// End of call.
    Stop,

    /// Playback checkpoint acknowledgement; unused by the bridge.
    Mark,
}

/// Payload of a telephony `start` event.
#[derive(Debug, Deserialize)]
pub struct StreamStart {
    /// Opaque stream identifier echoed back on outbound media frames.
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
}

/// Base64 companded audio carried by `media` events in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFrame {
    pub payload: String,
}

/// Outbound message to the telephony media-stream socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyCommand {
    Media {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        media: MediaFrame,
    },
}

impl TelephonyCommand {
    pub fn media(stream_sid: Option<String>, payload: String) -> Self {
        TelephonyCommand::Media {
            stream_sid,
            media: MediaFrame { payload },
        }
    }
}

/// Outbound command to the model realtime socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ModelCommand {
    /// Session configuration: behavioral instructions, voice, modalities
    /// and audio formats. Sent once, immediately after the socket opens.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Append one uplink audio buffer (base64 linear PCM).
    #[serde(rename = "input_audio_buffer.append")]
    AppendAudio { audio: String },

    /// Commit the appended audio as one user turn.
    #[serde(rename = "input_audio_buffer.commit")]
    CommitAudio,

    /// Ask the model to generate a response. Also sent once right after
    /// `session.update` to produce the initial greeting.
    #[serde(rename = "response.create")]
    CreateResponse,
}

/// Body of a `session.update` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    pub instructions: String,
    pub voice: String,
    pub modalities: Vec<String>,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ModelCommand {
    /// Build the one-time session configuration message.
    pub fn session_update(instructions: &str, voice: &str) -> Self {
        ModelCommand::SessionUpdate {
            session: SessionConfig {
                instructions: instructions.to_string(),
                voice: voice.to_string(),
                modalities: vec!["text".to_string(), "audio".to_string()],
                input_audio_format: "pcm16".to_string(),
                output_audio_format: "pcm16".to_string(),
                turn_detection: TurnDetection {
                    kind: "server_vad".to_string(),
                },
            },
        }
    }
}

/// Semantically meaningful inbound event from the model realtime socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// One chunk of response audio (base64 linear PCM at the model rate).
    AudioDelta { delta: String },

    /// Protocol-level error reported by the model endpoint.
    Error { message: String },
}

/// Parse one inbound model message.
///
/// Two distinct type names are observed for the audio-delta event across
/// protocol revisions; both map to [`ModelEvent::AudioDelta`]. Events the
/// bridge does not act on, and anything unparseable, return `None` and are
/// dropped by the caller.
pub fn parse_model_event(text: &str) -> Option<ModelEvent> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    match value.get("type").and_then(|t| t.as_str())? {
        "response.audio.delta" | "response.output_audio.delta" => value
            .get("delta")
            .and_then(|d| d.as_str())
            .map(|delta| ModelEvent::AudioDelta {
                delta: delta.to_string(),
            }),
        "error" => {
            let message = value
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unspecified error")
                .to_string();
            Some(ModelEvent::Error { message })
        }
        _ => None,
    }
}

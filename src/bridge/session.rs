//! # Bridge Session State Machine
//!
//! The call-scoped aggregate that sequences traffic between the telephony
//! socket and the model socket. It is a pure, synchronous state machine:
//! events go in, an ordered list of actions comes out, and all socket I/O
//! stays in the transport layer. That keeps the ordering invariants (queue
//! order equals arrival order, a commit never precedes its append) directly
//! unit-testable.
//!
//! ## Lifecycle:
//! `Connecting` (telephony accepted, model dial in flight) → `Ready` (model
//! open, configuration sent, queue flushed) → `Closed` (terminal). Uplink
//! audio arriving while `Connecting` is buffered; either side closing tears
//! the other side down and discards the buffer.

use crate::audio::pipeline::FramePipeline;
use crate::bridge::messages::{ModelCommand, TelephonyCommand};
use std::collections::VecDeque;
use tracing::debug;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Telephony socket accepted; model socket dial in flight.
    Connecting,
    /// Model socket open and configured; traffic flows both ways.
    Ready,
    /// Terminal. Every event is ignored from here on.
    Closed,
}

/// Input event for the session, from either peer.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// Telephony `start`: carries the opaque stream identifier.
    TelephonyStart { stream_sid: String },
    /// Telephony `media`: one base64 companded frame.
    TelephonyMedia { payload: String },
    /// Telephony `stop`: the caller ended the call.
    TelephonyStop,
    /// The telephony socket closed or errored.
    TelephonyClosed,
    /// The model socket finished its handshake.
    ModelOpen,
    /// One model audio delta (base64 linear PCM).
    ModelAudio { delta: String },
    /// The model socket closed or errored.
    ModelClosed,
}

/// Ordered side effect for the transport layer to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    SendToModel(ModelCommand),
    SendToTelephony(TelephonyCommand),
    CloseModel,
    CloseTelephony,
}

/// One uplink frame expands to exactly this message sequence, in this
/// order: append, commit, request a response. The three are queued and
/// flushed as a unit so another frame's messages can never interleave.
type UplinkTriple = [ModelCommand; 3];

/// Per-call session object. Owns all mutable call state; the transport
/// layer holds exactly one of these per accepted telephony connection and
/// never shares it, so no locking is needed.
pub struct BridgeSession {
    pipeline: FramePipeline,
    instructions: String,
    voice: String,
    state: BridgeState,
    stream_sid: Option<String>,
    pending: VecDeque<UplinkTriple>,
}

impl BridgeSession {
    pub fn new(pipeline: FramePipeline, instructions: String, voice: String) -> Self {
        Self {
            pipeline,
            instructions,
            voice,
            state: BridgeState::Connecting,
            stream_sid: None,
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    /// Feed one event through the state machine and return the actions the
    /// transport layer must perform, in order.
    pub fn handle(&mut self, event: BridgeEvent) -> Vec<BridgeAction> {
        if self.state == BridgeState::Closed {
            return Vec::new();
        }

        match event {
            BridgeEvent::TelephonyStart { stream_sid } => {
                debug!(stream_sid = %stream_sid, "telephony stream started");
                self.stream_sid = Some(stream_sid);
                Vec::new()
            }

            BridgeEvent::TelephonyMedia { payload } => self.on_uplink_media(&payload),

            BridgeEvent::TelephonyStop | BridgeEvent::TelephonyClosed => {
                self.close();
                vec![BridgeAction::CloseModel]
            }

            BridgeEvent::ModelOpen => self.on_model_open(),

            BridgeEvent::ModelAudio { delta } => self.on_downlink_audio(&delta),

            BridgeEvent::ModelClosed => {
                self.close();
                vec![BridgeAction::CloseTelephony]
            }
        }
    }

    /// Uplink media: transcode and either send now (`Ready`) or queue the
    /// whole triple (`Connecting`).
    fn on_uplink_media(&mut self, payload: &str) -> Vec<BridgeAction> {
        let audio = match self.pipeline.uplink(payload) {
            Ok(audio) => audio,
            Err(err) => {
                debug!(error = %err, "dropping undecodable uplink frame");
                return Vec::new();
            }
        };

        let triple: UplinkTriple = [
            ModelCommand::AppendAudio { audio },
            ModelCommand::CommitAudio,
            ModelCommand::CreateResponse,
        ];

        match self.state {
            BridgeState::Connecting => {
                self.pending.push_back(triple);
                Vec::new()
            }
            BridgeState::Ready => triple.into_iter().map(BridgeAction::SendToModel).collect(),
            BridgeState::Closed => Vec::new(),
        }
    }

    /// Model socket opened: configure the session, request the greeting,
    /// then flush everything buffered while connecting, in arrival order.
    fn on_model_open(&mut self) -> Vec<BridgeAction> {
        self.state = BridgeState::Ready;

        let mut actions = vec![
            BridgeAction::SendToModel(ModelCommand::session_update(
                &self.instructions,
                &self.voice,
            )),
            BridgeAction::SendToModel(ModelCommand::CreateResponse),
        ];

        for triple in self.pending.drain(..) {
            actions.extend(triple.into_iter().map(BridgeAction::SendToModel));
        }

        actions
    }

    /// Downlink audio: transcode and forward one media frame to telephony.
    fn on_downlink_audio(&mut self, delta: &str) -> Vec<BridgeAction> {
        match self.pipeline.downlink(delta) {
            Ok(payload) => vec![BridgeAction::SendToTelephony(TelephonyCommand::media(
                self.stream_sid.clone(),
                payload,
            ))],
            Err(err) => {
                debug!(error = %err, "dropping undecodable downlink delta");
                Vec::new()
            }
        }
    }

    fn close(&mut self) {
        self.state = BridgeState::Closed;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    fn session() -> BridgeSession {
        let pipeline = FramePipeline::new(&AudioConfig {
            telephony_rate: 8000,
            model_rate: 24000,
            min_frame_bytes: 160,
        });
        BridgeSession::new(pipeline, "Be helpful.".to_string(), "alloy".to_string())
    }

    fn media_frame(fill: u8) -> BridgeEvent {
        BridgeEvent::TelephonyMedia {
            payload: BASE64.encode(vec![fill; 160]),
        }
    }

    fn assert_triple(actions: &[BridgeAction]) {
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            actions[0],
            BridgeAction::SendToModel(ModelCommand::AppendAudio { .. })
        ));
        assert_eq!(
            actions[1],
            BridgeAction::SendToModel(ModelCommand::CommitAudio)
        );
        assert_eq!(
            actions[2],
            BridgeAction::SendToModel(ModelCommand::CreateResponse)
        );
    }

    #[test]
    fn test_media_while_connecting_is_queued_then_flushed_in_order() {
        let mut s = session();
        assert_eq!(s.state(), BridgeState::Connecting);

        assert!(s
            .handle(BridgeEvent::TelephonyStart {
                stream_sid: "MZ1".to_string()
            })
            .is_empty());

        // Three distinct frames arrive before the model is ready; none may
        // produce output yet.
        assert!(s.handle(media_frame(0xFF)).is_empty());
        assert!(s.handle(media_frame(0x00)).is_empty());
        assert!(s.handle(media_frame(0x80)).is_empty());

        // Readiness flushes: configuration, greeting request, then the
        // three triples in arrival order with no interleaving.
        let actions = s.handle(BridgeEvent::ModelOpen);
        assert_eq!(s.state(), BridgeState::Ready);
        assert_eq!(actions.len(), 2 + 3 * 3);

        assert!(matches!(
            actions[0],
            BridgeAction::SendToModel(ModelCommand::SessionUpdate { .. })
        ));
        assert_eq!(
            actions[1],
            BridgeAction::SendToModel(ModelCommand::CreateResponse)
        );

        let mut appended = Vec::new();
        for chunk in actions[2..].chunks(3) {
            assert_triple(chunk);
            if let BridgeAction::SendToModel(ModelCommand::AppendAudio { audio }) = &chunk[0] {
                appended.push(audio.clone());
            }
        }
        // Arrival order: the three frames carry different audio, so their
        // transcoded payloads must come out pairwise distinct and in order.
        assert_eq!(appended.len(), 3);
        assert_ne!(appended[0], appended[1]);
        assert_ne!(appended[1], appended[2]);

        let silence = BASE64.encode(vec![0u8; 480 * 2]);
        assert_eq!(appended[0], silence); // 0xFF frames decode to silence
    }

    #[test]
    fn test_media_while_ready_is_sent_immediately() {
        let mut s = session();
        s.handle(BridgeEvent::ModelOpen);
        let actions = s.handle(media_frame(0xFF));
        assert_triple(&actions);
    }

    #[test]
    fn test_stop_before_ready_discards_queue_and_closes_model() {
        let mut s = session();
        s.handle(BridgeEvent::TelephonyStart {
            stream_sid: "MZ1".to_string(),
        });
        s.handle(media_frame(0xFF));
        s.handle(media_frame(0xFF));

        let actions = s.handle(BridgeEvent::TelephonyStop);
        assert_eq!(actions, vec![BridgeAction::CloseModel]);
        assert_eq!(s.state(), BridgeState::Closed);

        // A model that opens afterwards must never see the stale queue.
        assert!(s.handle(BridgeEvent::ModelOpen).is_empty());
    }

    #[test]
    fn test_telephony_close_while_connecting_closes_model() {
        let mut s = session();
        s.handle(media_frame(0xFF));
        let actions = s.handle(BridgeEvent::TelephonyClosed);
        assert_eq!(actions, vec![BridgeAction::CloseModel]);
        assert_eq!(s.state(), BridgeState::Closed);
    }

    #[test]
    fn test_model_close_closes_telephony() {
        let mut s = session();
        s.handle(BridgeEvent::ModelOpen);
        let actions = s.handle(BridgeEvent::ModelClosed);
        assert_eq!(actions, vec![BridgeAction::CloseTelephony]);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut s = session();
        assert_eq!(
            s.handle(BridgeEvent::TelephonyStop),
            vec![BridgeAction::CloseModel]
        );
        // Everything after the first close is a no-op, including repeated
        // closes from the other side.
        assert!(s.handle(BridgeEvent::ModelClosed).is_empty());
        assert!(s.handle(BridgeEvent::TelephonyStop).is_empty());
        assert!(s.handle(media_frame(0xFF)).is_empty());
        assert!(s
            .handle(BridgeEvent::ModelAudio {
                delta: String::new()
            })
            .is_empty());
    }

    #[test]
    fn test_model_audio_forwards_one_media_frame() {
        let mut s = session();
        s.handle(BridgeEvent::TelephonyStart {
            stream_sid: "MZ42".to_string(),
        });
        s.handle(BridgeEvent::ModelOpen);

        // 480 samples of silence at 24kHz → one padded telephony frame.
        let delta = BASE64.encode(vec![0u8; 480 * 2]);
        let actions = s.handle(BridgeEvent::ModelAudio { delta });
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            BridgeAction::SendToTelephony(TelephonyCommand::Media { stream_sid, media }) => {
                assert_eq!(stream_sid.as_deref(), Some("MZ42"));
                assert_eq!(BASE64.decode(&media.payload).unwrap().len(), 160);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payloads_are_dropped_without_state_change() {
        let mut s = session();
        s.handle(BridgeEvent::ModelOpen);
        assert!(s
            .handle(BridgeEvent::TelephonyMedia {
                payload: "!!!not-base64!!!".to_string()
            })
            .is_empty());
        assert!(s
            .handle(BridgeEvent::ModelAudio {
                delta: "???".to_string()
            })
            .is_empty());
        assert_eq!(s.state(), BridgeState::Ready);
    }
}

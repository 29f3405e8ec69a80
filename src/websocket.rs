//! # Telephony Media-stream Handler
//!
//! One actor per accepted telephony connection. The connection-acceptance
//! layer *is* the session registry: actix creates the actor on upgrade and
//! drops it on close, so exactly one [`BridgeSession`] exists per call and
//! no state is shared between calls.
//!
//! ## Per-call wiring:
//! 1. **Upgrade**: the telephony platform connects to `/media-stream`
//! 2. **Dial**: the actor immediately spawns the model socket task;
//!    telephony media arriving before the model is ready is buffered by
//!    the state machine
//! 3. **Bridge**: events from both sockets feed the state machine; the
//!    actor executes whatever actions come back, in order
//! 4. **Teardown**: either side closing routes through the state machine,
//!    which closes the other side and discards any buffered audio
//!
//! All events for one call are delivered on the actor's single mailbox, so
//! the session state needs no locking.

use crate::audio::pipeline::FramePipeline;
use crate::bridge::messages::{parse_model_event, ModelCommand, ModelEvent, TelephonyEvent};
use crate::bridge::model::{run_model_socket, ModelSinkCommand};
use crate::bridge::session::{BridgeAction, BridgeEvent, BridgeSession};
use crate::config::ModelConfig;
use crate::state::AppState;
use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Model socket finished its handshake.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ModelConnected;

/// One inbound text frame from the model socket.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ModelText(pub String);

/// Model socket task ended (clean close, error, or failed dial).
#[derive(Message)]
#[rtype(result = "()")]
pub struct ModelDisconnected;

/// WebSocket actor owning one call end to end.
pub struct CallWebSocket {
    /// Correlates log lines for this call before the stream id is known.
    connection_id: Uuid,

    /// The per-call state machine.
    session: BridgeSession,

    /// Outbound channel to the model socket task; `None` once closed.
    model_tx: Option<mpsc::UnboundedSender<ModelSinkCommand>>,

    /// Model endpoint settings snapshot for this call.
    model_config: ModelConfig,

    /// Shared state, used only for call counters.
    app_state: web::Data<AppState>,
}

impl CallWebSocket {
    pub fn new(session: BridgeSession, model_config: ModelConfig, app_state: web::Data<AppState>) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            session,
            model_tx: None,
            model_config,
            app_state,
        }
    }

    /// Run one event through the state machine and execute the resulting
    /// actions in order.
    fn dispatch(&mut self, event: BridgeEvent, ctx: &mut ws::WebsocketContext<Self>) {
        for action in self.session.handle(event) {
            match action {
                BridgeAction::SendToModel(command) => {
                    if matches!(command, ModelCommand::AppendAudio { .. }) {
                        self.app_state.record_uplink_frame();
                    }
                    match serde_json::to_string(&command) {
                        Ok(text) => {
                            if let Some(tx) = &self.model_tx {
                                if tx.send(ModelSinkCommand::Send(text)).is_err() {
                                    warn!(connection_id = %self.connection_id,
                                        "model socket task gone, dropping outbound message");
                                }
                            }
                        }
                        Err(err) => {
                            warn!(connection_id = %self.connection_id, error = %err,
                                "failed to serialize model command");
                        }
                    }
                }

                BridgeAction::SendToTelephony(command) => {
                    self.app_state.record_downlink_frame();
                    match serde_json::to_string(&command) {
                        Ok(text) => ctx.text(text),
                        Err(err) => {
                            warn!(connection_id = %self.connection_id, error = %err,
                                "failed to serialize telephony command");
                        }
                    }
                }

                BridgeAction::CloseModel => {
                    // Dropping the sender after the close command ends the
                    // model task even if it is still mid-handshake.
                    if let Some(tx) = self.model_tx.take() {
                        let _ = tx.send(ModelSinkCommand::Close);
                    }
                }

                BridgeAction::CloseTelephony => {
                    ctx.close(Some(ws::CloseCode::Normal.into()));
                    ctx.stop();
                }
            }
        }
    }
}

impl Actor for CallWebSocket {
    type Context = ws::WebsocketContext<Self>;

    /// Telephony connection accepted: dial the model side immediately.
    /// Media may arrive before the dial completes; the state machine
    /// buffers it.
    fn started(&mut self, ctx: &mut Self::Context) {
        info!(connection_id = %self.connection_id, "telephony media stream connected");
        self.app_state.call_started();

        let (tx, rx) = mpsc::unbounded_channel();
        self.model_tx = Some(tx);

        let config = self.model_config.clone();
        let bridge = ctx.address();
        tokio::spawn(async move {
            run_model_socket(config, rx, bridge).await;
        });
    }

    /// Telephony connection gone: close the model side synchronously with
    /// respect to this handler, then release the call slot.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        for action in self.session.handle(BridgeEvent::TelephonyClosed) {
            if action == BridgeAction::CloseModel {
                if let Some(tx) = self.model_tx.take() {
                    let _ = tx.send(ModelSinkCommand::Close);
                }
            }
        }

        self.app_state.call_ended();
        info!(connection_id = %self.connection_id, "call torn down");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for CallWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<TelephonyEvent>(&text) {
                Ok(TelephonyEvent::Start { start }) => {
                    info!(connection_id = %self.connection_id,
                        stream_sid = %start.stream_sid, "call started");
                    self.dispatch(
                        BridgeEvent::TelephonyStart {
                            stream_sid: start.stream_sid,
                        },
                        ctx,
                    );
                }
                Ok(TelephonyEvent::Media { media }) => {
                    self.dispatch(
                        BridgeEvent::TelephonyMedia {
                            payload: media.payload,
                        },
                        ctx,
                    );
                }
                Ok(TelephonyEvent::Stop) => {
                    info!(connection_id = %self.connection_id, "telephony stop event");
                    self.dispatch(BridgeEvent::TelephonyStop, ctx);
                    ctx.stop();
                }
                Ok(TelephonyEvent::Connected) | Ok(TelephonyEvent::Mark) => {
                    debug!(connection_id = %self.connection_id, "ignoring bookkeeping event");
                }
                // Malformed traffic is dropped without touching the session.
                Err(err) => {
                    debug!(connection_id = %self.connection_id, error = %err,
                        "dropping malformed telephony message");
                }
            },
            Ok(ws::Message::Ping(data)) => ctx.pong(&data),
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Binary(_)) => {
                debug!(connection_id = %self.connection_id,
                    "ignoring unexpected binary frame");
            }
            Ok(ws::Message::Close(reason)) => {
                info!(connection_id = %self.connection_id, reason = ?reason,
                    "telephony socket closed");
                self.dispatch(BridgeEvent::TelephonyClosed, ctx);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(err) => {
                warn!(connection_id = %self.connection_id, error = %err,
                    "telephony socket protocol error");
                self.dispatch(BridgeEvent::TelephonyClosed, ctx);
                ctx.stop();
            }
        }
    }
}

impl Handler<ModelConnected> for CallWebSocket {
    type Result = ();

    fn handle(&mut self, _msg: ModelConnected, ctx: &mut Self::Context) {
        info!(connection_id = %self.connection_id, "model session ready");
        self.dispatch(BridgeEvent::ModelOpen, ctx);
    }
}

impl Handler<ModelText> for CallWebSocket {
    type Result = ();

    fn handle(&mut self, msg: ModelText, ctx: &mut Self::Context) {
        match parse_model_event(&msg.0) {
            Some(ModelEvent::AudioDelta { delta }) => {
                self.dispatch(BridgeEvent::ModelAudio { delta }, ctx);
            }
            Some(ModelEvent::Error { message }) => {
                warn!(connection_id = %self.connection_id, error = %message,
                    "model endpoint reported an error");
            }
            // Everything else on the realtime socket is noise to the bridge.
            None => {}
        }
    }
}

impl Handler<ModelDisconnected> for CallWebSocket {
    type Result = ();

    fn handle(&mut self, _msg: ModelDisconnected, ctx: &mut Self::Context) {
        debug!(connection_id = %self.connection_id, "model socket ended");
        self.model_tx = None;
        self.dispatch(BridgeEvent::ModelClosed, ctx);
    }
}

/// WebSocket endpoint handler: upgrades the request and hands the
/// connection to a fresh [`CallWebSocket`] actor with a configuration
/// snapshot taken at accept time.
pub async fn media_stream(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let config = app_state.get_config();

    let session = BridgeSession::new(
        FramePipeline::new(&config.audio),
        config.model.instructions.clone(),
        config.model.voice.clone(),
    );

    let websocket = CallWebSocket::new(session, config.model, app_state);
    ws::start(websocket, &req, stream)
}

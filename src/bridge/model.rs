//! # Model Realtime Socket Client
//!
//! One outbound tokio-tungstenite connection to the model's realtime API
//! per call, driven as a plain async task beside the telephony actor. The
//! task notifies the actor on open, forwards every inbound text frame, and
//! writes outbound commands from an unbounded channel. There is no retry
//! and no reconnection: a dropped model socket ends AI responses for that
//! call and the session tears down.

use crate::config::ModelConfig;
use crate::websocket::{CallWebSocket, ModelConnected, ModelDisconnected, ModelText};
use actix::Addr;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};

/// Command from the session actor to the model socket task.
#[derive(Debug)]
pub enum ModelSinkCommand {
    /// Write one serialized JSON event.
    Send(String),
    /// Close the socket and end the task.
    Close,
}

/// Dial the model endpoint and pump it until either side ends.
///
/// Sends `ModelConnected` once the handshake completes, `ModelText` for
/// every inbound text frame, and `ModelDisconnected` exactly once when the
/// task ends for any reason, dial failure included (the session treats a
/// model that never opens the same as one that closed).
pub async fn run_model_socket(
    config: ModelConfig,
    mut commands: mpsc::UnboundedReceiver<ModelSinkCommand>,
    bridge: Addr<CallWebSocket>,
) {
    let request = match build_request(&config) {
        Ok(request) => request,
        Err(err) => {
            error!(error = %err, "invalid model endpoint configuration");
            bridge.do_send(ModelDisconnected);
            return;
        }
    };

    let socket = match connect_async(request).await {
        Ok((socket, _response)) => socket,
        Err(err) => {
            error!(error = %err, "failed to open model realtime socket");
            bridge.do_send(ModelDisconnected);
            return;
        }
    };

    debug!(url = %config.url, "model realtime socket open");
    bridge.do_send(ModelConnected);

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ModelSinkCommand::Send(text)) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        warn!(error = %err, "model socket write failed");
                        break;
                    }
                }
                // An explicit close, or the actor dropping its sender,
                // both end the call from our side.
                Some(ModelSinkCommand::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    bridge.do_send(ModelText(text));
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("model realtime socket closed by peer");
                    break;
                }
                Some(Ok(_)) => {} // ping/pong handled by the transport
                Some(Err(err)) => {
                    warn!(error = %err, "model socket read failed");
                    break;
                }
            },
        }
    }

    bridge.do_send(ModelDisconnected);
}

fn build_request(config: &ModelConfig) -> anyhow::Result<Request> {
    let mut request = config.url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("Authorization", format!("Bearer {}", config.api_key).parse()?);
    headers.insert("OpenAI-Beta", "realtime=v1".parse()?);
    Ok(request)
}

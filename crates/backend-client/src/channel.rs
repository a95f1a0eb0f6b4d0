use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use futures::{SinkExt, StreamExt};
use graph_model::{Edge, Node};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::wire::{ArchitecturePlannedPayload, PushEnvelope, ResetMessage, ResetPayload};

/// What the push channel delivers back to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    /// The server planned a whole replacement architecture.
    ArchitecturePlanned {
        nodes: Vec<Node>,
        edges: Vec<Edge>,
    },
    /// Channel failure or a discarded malformed frame.
    Error(ClientError),
    /// Graceful close by either side.
    Disconnected { message: String },
}

enum Command {
    Send(String),
    Close,
}

/// One logical push channel per active session.
///
/// `disconnect` is idempotent and stops delivery: events racing with the
/// disconnect are dropped rather than handed to a store that no longer
/// expects them. Dropping the handle disconnects too.
pub struct PushChannel {
    commands: mpsc::UnboundedSender<Command>,
    closed: Arc<AtomicBool>,
    simulation_id: String,
}

impl PushChannel {
    pub(crate) fn open(
        handle: &tokio::runtime::Handle,
        url: String,
        simulation_id: String,
        events: Sender<ChannelEvent>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let task_closed = closed.clone();
        handle.spawn(async move {
            run_channel(url, rx, events, task_closed).await;
        });
        Self {
            commands,
            closed,
            simulation_id,
        }
    }

    /// The session this channel is subscribed to. Hosts compare it
    /// against the current session id and reopen on mismatch, since the
    /// backend may assign a different id than the one requested.
    pub fn simulation_id(&self) -> &str {
        &self.simulation_id
    }

    /// Ask the backend to reset the session before tearing down.
    pub fn send_reset(&self, simulation_id: &str) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("reset requested on a closed channel");
            return;
        }
        let message = ResetMessage {
            kind: "RESET",
            payload: ResetPayload { simulation_id },
        };
        match serde_json::to_string(&message) {
            Ok(text) => {
                let _ = self.commands.send(Command::Send(text));
            }
            Err(err) => warn!(%err, "failed to encode reset message"),
        }
    }

    /// Close the channel. Safe to call repeatedly; after the first call
    /// no further events are delivered.
    pub fn disconnect(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.commands.send(Command::Close);
        }
    }

    pub fn is_disconnected(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn emit(events: &Sender<ChannelEvent>, closed: &AtomicBool, event: ChannelEvent) {
    if !closed.load(Ordering::SeqCst) {
        let _ = events.send(event);
    }
}

async fn run_channel(
    url: String,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: Sender<ChannelEvent>,
    closed: Arc<AtomicBool>,
) {
    let mut ws = match connect_async(url.as_str()).await {
        Ok((ws, _)) => ws,
        Err(err) => {
            // Failing to open at all is the "server unreachable" case.
            emit(
                &events,
                &closed,
                ChannelEvent::Error(ClientError::Channel {
                    unreachable: true,
                    message: err.to_string(),
                }),
            );
            return;
        }
    };
    debug!(%url, "push channel connected");
    emit(&events, &closed, ChannelEvent::Connected);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(text)) => {
                    if let Err(err) = ws.send(Message::Text(text)).await {
                        warn!(%err, "failed to send on push channel");
                    }
                }
                // Deliberate disconnect: close quietly, deliver nothing.
                Some(Command::Close) | None => {
                    let _ = ws.close(None).await;
                    return;
                }
            },
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&text, &events, &closed);
                }
                Some(Ok(Message::Close(close))) => {
                    emit(&events, &closed, ChannelEvent::Disconnected {
                        message: describe_close(close),
                    });
                    return;
                }
                Some(Ok(_)) => {} // ping/pong/binary: nothing to do
                Some(Err(err)) => {
                    emit(
                        &events,
                        &closed,
                        ChannelEvent::Error(ClientError::Channel {
                            unreachable: false,
                            message: err.to_string(),
                        }),
                    );
                    return;
                }
                None => {
                    emit(&events, &closed, ChannelEvent::Disconnected {
                        message: "connection closed".to_string(),
                    });
                    return;
                }
            },
        }
    }
}

/// Decode one inbound frame. Malformed frames are reported and discarded;
/// the channel stays open.
fn handle_frame(text: &str, events: &Sender<ChannelEvent>, closed: &AtomicBool) {
    let envelope: PushEnvelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            emit(
                events,
                closed,
                ChannelEvent::Error(ClientError::Decode(err.to_string())),
            );
            return;
        }
    };
    match envelope.event_type.as_str() {
        "architecture_planned" => {
            match serde_json::from_value::<ArchitecturePlannedPayload>(envelope.payload) {
                Ok(payload) => {
                    let (nodes, edges) = payload.agent_network_architecture.into_graph();
                    emit(
                        events,
                        closed,
                        ChannelEvent::ArchitecturePlanned { nodes, edges },
                    );
                }
                Err(err) => emit(
                    events,
                    closed,
                    ChannelEvent::Error(ClientError::Decode(err.to_string())),
                ),
            }
        }
        other => debug!(event_type = other, "ignoring push event"),
    }
}

fn describe_close(close: Option<CloseFrame>) -> String {
    match close {
        Some(frame) if !frame.reason.is_empty() => {
            format!("closed with code {}: {}", frame.code, frame.reason)
        }
        Some(frame) => format!("closed with code {}", frame.code),
        None => "closed without a status code".to_string(),
    }
}

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tripmate_domain::realtime::{ClientEvent, ServerEvent};
use url::Url;

use crate::api::RealtimeLink;
use crate::error::{ClientError, ClientResult};

/// What the reader task reports back to the session loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    Server(ServerEvent),
    Closed { reason: String },
}

#[derive(Default)]
struct OutboundSlot {
    generation: u64,
    sender: Option<mpsc::UnboundedSender<ClientEvent>>,
}

/// WebSocket realtime link. One connection at a time; `connect` replaces the
/// previous one.
#[derive(Clone)]
pub struct WsLink {
    url: Url,
    token: String,
    outbound: Arc<Mutex<OutboundSlot>>,
}

impl WsLink {
    pub fn new(url: Url, token: impl Into<String>) -> Self {
        Self {
            url,
            token: token.into(),
            outbound: Arc::new(Mutex::new(OutboundSlot::default())),
        }
    }

    fn handshake_url(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("token", &self.token);
        url
    }

    pub async fn connect(&self) -> ClientResult<mpsc::UnboundedReceiver<LinkEvent>> {
        let (stream, _) = connect_async(self.handshake_url().as_str())
            .await
            .map_err(handshake_error)?;
        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let generation = self.attach(Some(outbound_tx));

        tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let payload = match serde_json::to_string(&event) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::warn!(error = %err, event = event.name(), "failed to encode client event");
                        continue;
                    }
                };
                if sink.send(Message::Text(payload)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                if inbound_tx.send(LinkEvent::Server(event)).is_err() {
                                    break "receiver dropped".to_string();
                                }
                            }
                            Err(err) => {
                                tracing::debug!(error = %err, "ignoring undecodable server frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|frame| frame.reason.to_string())
                            .filter(|reason| !reason.is_empty())
                            .unwrap_or_else(|| "server close".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => break err.to_string(),
                    None => break "transport close".to_string(),
                }
            };
            if let Ok(mut slot) = outbound.lock() {
                if slot.generation == generation {
                    slot.sender = None;
                }
            }
            let _ = inbound_tx.send(LinkEvent::Closed { reason });
        });

        Ok(inbound_rx)
    }

    pub fn disconnect(&self) {
        let _ = self.attach(None);
    }

    /// Installs `sender` as the current connection and returns its generation.
    fn attach(&self, sender: Option<mpsc::UnboundedSender<ClientEvent>>) -> u64 {
        match self.outbound.lock() {
            Ok(mut slot) => {
                slot.generation += 1;
                slot.sender = sender;
                slot.generation
            }
            Err(_) => 0,
        }
    }
}

impl RealtimeLink for WsLink {
    fn emit(&self, event: ClientEvent) -> ClientResult<()> {
        let slot = self
            .outbound
            .lock()
            .map_err(|_| ClientError::Transport("realtime link poisoned".into()))?;
        let sender = slot
            .sender
            .as_ref()
            .ok_or_else(|| ClientError::Transport("realtime link is not connected".into()))?;
        sender
            .send(event)
            .map_err(|_| ClientError::Transport("realtime link closed".into()))
    }
}

fn handshake_error(err: WsError) -> ClientError {
    match err {
        WsError::Http(response) if response.status().as_u16() == 401 => {
            ClientError::Unauthenticated
        }
        other => ClientError::Transport(other.to_string()),
    }
}

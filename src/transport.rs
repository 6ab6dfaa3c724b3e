//! WebSocket client for the AIS stream server

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::{config::WebSocketConfig, errors::AisViewerError, models::SubscriptionRequest};

const CHANNEL_CAPACITY: usize = 100;

/// Lifecycle of the connection.
///
/// `Closed` and `Errored` are terminal; there is no automatic reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ChannelState {
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelState::Open)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Errored)
    }
}

pub struct WsClientBuilder {
    url: String,
    state_tx: watch::Sender<ChannelState>,
    inbound_tx: mpsc::Sender<String>,
    inbound_rx: mpsc::Receiver<String>,
    outbound_tx: mpsc::Sender<SubscriptionRequest>,
    outbound_rx: mpsc::Receiver<SubscriptionRequest>,
}

/// Connected client.
///
/// Text frames arrive on the inbound receiver, subscription requests are
/// written to the outbound sender, and the connection state is observable
/// through a watch channel.
pub struct WsClient {
    inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<SubscriptionRequest>,
    state: watch::Receiver<ChannelState>,
    _handle: tokio::task::JoinHandle<Result<(), AisViewerError>>,
}

impl WsClientBuilder {
    pub fn new(config: &WebSocketConfig) -> Result<Self, AisViewerError> {
        config.validate()?;

        let (state_tx, _) = watch::channel(ChannelState::Connecting);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);

        Ok(Self {
            url: config.url.clone(),
            state_tx,
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
        })
    }

    /// Spawn the connection task and return immediately.
    ///
    /// The state starts as `Connecting` and moves to `Open` once the
    /// handshake completes.
    pub fn connect(self) -> WsClient {
        let state = self.state_tx.subscribe();

        let _handle = tokio::spawn(Self::process_events(
            self.url,
            self.state_tx,
            self.inbound_tx,
            self.outbound_rx,
        ));

        WsClient {
            inbound: self.inbound_rx,
            outbound: self.outbound_tx,
            state,
            _handle,
        }
    }

    /// Run the connection until either side closes it.
    ///
    /// The final state is `Closed` for a clean shutdown and `Errored` when the
    /// connection could not be established or failed mid-stream.
    async fn process_events(
        url: String,
        state_tx: watch::Sender<ChannelState>,
        inbound_tx: mpsc::Sender<String>,
        mut outbound_rx: mpsc::Receiver<SubscriptionRequest>,
    ) -> Result<(), AisViewerError> {
        info!("Connecting to {}", url);
        let stream = match connect_async(url.as_str()).await {
            Ok((stream, _response)) => stream,
            Err(e) => {
                error!("WebSocket connection to {} failed: {}", url, e);
                state_tx.send_replace(ChannelState::Errored);
                return Err(e.into());
            }
        };

        info!("WebSocket connection opened: {}", url);
        state_tx.send_replace(ChannelState::Open);

        let (mut sink, mut source) = stream.split();

        let result = loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(text.as_str().to_owned()).await.is_err() {
                            info!("Inbound receiver dropped, closing connection");
                            let _ = sink.close().await;
                            break Ok(());
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("WebSocket closed by server: {:?}", frame);
                        break Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                },
                request = outbound_rx.recv() => match request {
                    Some(request) => {
                        let payload = match serde_json::to_string(&request) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!("Failed to serialize subscription: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::text(payload)).await {
                            break Err(e);
                        }
                    }
                    None => {
                        info!("Outbound sender dropped, closing connection");
                        let _ = sink.close().await;
                        break Ok(());
                    }
                },
            }
        };

        match result {
            Ok(()) => {
                info!("WebSocket connection closed");
                state_tx.send_replace(ChannelState::Closed);
                Ok(())
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                state_tx.send_replace(ChannelState::Errored);
                Err(e.into())
            }
        }
    }
}

impl WsClient {
    /// Split into the inbound receiver, the outbound sender and the state
    /// watch, for handing over to a session.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<String>,
        mpsc::Sender<SubscriptionRequest>,
        watch::Receiver<ChannelState>,
    ) {
        (self.inbound, self.outbound, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataAge;
    use crate::viewport::{BoundingBox, LonLat};
    use tokio::net::TcpListener;

    const REPORT: &str = r#"{"MMSI":"227000001","name":"TEST","lon":2.99,"lat":40.75,
        "cog":90,"trueHeading":90,"sog":5,"timestamp":"2024-06-01T10:00:00Z",
        "timestampReceived":1717236000000}"#;

    fn config(url: String) -> WebSocketConfig {
        WebSocketConfig { url }
    }

    #[test]
    fn reject_non_websocket_url() {
        assert!(WsClientBuilder::new(&config("http://localhost:8088".to_string())).is_err());
    }

    #[tokio::test]
    async fn exchange_messages_with_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::text(REPORT)).await.unwrap();
            let request = ws.next().await.unwrap().unwrap();
            request.to_text().unwrap().to_owned()
        });

        let client = WsClientBuilder::new(&config(format!("ws://{}", addr)))
            .unwrap()
            .connect();
        let (mut inbound, outbound, mut state) = client.into_parts();

        state.wait_for(|s| s.is_open()).await.unwrap();
        assert_eq!(inbound.recv().await.unwrap(), REPORT);

        let bounds = BoundingBox {
            ne: LonLat { lon: 3.1, lat: 40.9 },
            sw: LonLat { lon: 2.8, lat: 40.6 },
        };
        outbound
            .send(SubscriptionRequest::new(&bounds, DataAge::try_from(10).unwrap()))
            .await
            .unwrap();

        let received = server.await.unwrap();
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&received).unwrap(),
            serde_json::json!({"lat1": 40.9, "long1": 3.1, "lat2": 40.6, "long2": 2.8, "age": 10})
        );

        // The server dropped its end, so the channel must reach a terminal state
        let final_state = *state.wait_for(|s| s.is_terminal()).await.unwrap();
        assert!(final_state.is_terminal());
        assert_eq!(inbound.recv().await, None);
    }

    #[tokio::test]
    async fn unreachable_server_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WsClientBuilder::new(&config(format!("ws://{}", addr)))
            .unwrap()
            .connect();
        let (mut inbound, _outbound, mut state) = client.into_parts();

        let final_state = *state.wait_for(|s| s.is_terminal()).await.unwrap();
        assert_eq!(final_state, ChannelState::Errored);
        assert_eq!(inbound.recv().await, None);
    }
}

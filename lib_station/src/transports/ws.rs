//! WebSocket transport.
//!
//! One connection attempt per `connect` call: a spawned task dials the URL,
//! reports `Opened`, forwards text frames, and reports `Closed` exactly once
//! when the socket drops or the dial fails. A handle closed by its owner
//! cancels the task and emits nothing further.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;

use crate::core::transport::{Connector, Frame, TransportEvent, TransportHandle};

/// Production connector speaking the station backends' WebSocket protocol.
#[derive(Debug, Default)]
pub struct WsConnector;

struct WsHandle {
    cancel: CancellationToken,
}

impl TransportHandle for WsHandle {
    fn close(&mut self) {
        self.cancel.cancel();
    }
}

impl Connector for WsConnector {
    fn connect(
        &self,
        url: &str,
        events: mpsc::UnboundedSender<TransportEvent>,
    ) -> Box<dyn TransportHandle> {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let url = url.to_string();

        tokio::spawn(async move {
            log::debug!("dialing {}", url);
            let stream = tokio::select! {
                _ = task_cancel.cancelled() => return,
                connected = connect_async(url.as_str()) => match connected {
                    Ok((stream, _response)) => stream,
                    Err(e) => {
                        log::error!("websocket connect to {} failed: {}", url, e);
                        let _ = events.send(TransportEvent::Closed);
                        return;
                    }
                }
            };
            let _ = events.send(TransportEvent::Opened);

            let (mut write, mut read) = stream.split();
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => {
                        // Closed by the owner: shut the socket quietly.
                        let _ = write.close().await;
                        return;
                    }
                    inbound = read.next() => match inbound {
                        Some(Ok(Message::Text(text))) => {
                            let _ = events.send(TransportEvent::Message(Frame::from(text.as_str())));
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Binary(data))) => {
                            log::debug!("ignoring {}-byte binary frame from {}", data.len(), url);
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            log::warn!("stream from {} closed by remote host", url);
                            let _ = events.send(TransportEvent::Closed);
                            return;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            log::error!("websocket read error from {}: {}", url, e);
                            let _ = events.send(TransportEvent::Closed);
                            return;
                        }
                    }
                }
            }
        });

        Box::new(WsHandle { cancel })
    }
}

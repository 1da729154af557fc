//! WebSocket client transport using `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{
    ProtocolMessage, TransportError, WebSocketConnection, WebSocketConnector,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A [`WebSocketConnector`] backed by `tokio_tungstenite::connect_async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl WebSocketConnector for TungsteniteConnector {
    type Connection = TungsteniteConnection;

    async fn connect(
        &self,
        uri: &str,
    ) -> Result<Self::Connection, TransportError> {
        let (ws, _response) =
            tokio_tungstenite::connect_async(uri).await.map_err(|e| {
                TransportError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;
        tracing::debug!(uri, "WebSocket connection opened");

        let (sink, stream) = ws.split();
        Ok(TungsteniteConnection {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// A single client-side WebSocket connection.
///
/// The write and read halves are locked independently, so a task parked
/// in [`recv`](WebSocketConnection::recv) never holds up a send.
pub struct TungsteniteConnection {
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection for TungsteniteConnection {
    async fn send(
        &self,
        message: ProtocolMessage,
    ) -> Result<(), TransportError> {
        let frame = match message {
            ProtocolMessage::Text(text) => Message::Text(text.into()),
            ProtocolMessage::Bytes(bytes) => Message::Binary(bytes.into()),
        };
        self.sink.lock().await.send(frame).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<ProtocolMessage>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(ProtocolMessage::Text(
                        text.as_str().to_owned(),
                    )));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(ProtocolMessage::Bytes(data.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

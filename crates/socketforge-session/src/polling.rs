//! HTTP long-polling carrier.
//!
//! Every inbound batch is one GET; every outbound batch is one POST (two
//! for a v3 batch with attachments: the text body, then the binary body).

use std::sync::{Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use socketforge_protocol::{EngineIoVersion, ProtocolMessage};
use socketforge_transport::{HttpClient, HttpRequest, TransportError};
use url::Url;

use crate::{TransportKind, TransportSession};

/// Long-polling over a user-supplied [`HttpClient`].
pub struct PollingSession<H: HttpClient> {
    http: H,
    version: EngineIoVersion,
    /// Request URI; gains `&sid=` once the handshake completes.
    uri: Mutex<String>,
}

impl<H: HttpClient> PollingSession<H> {
    pub fn new(http: H, version: EngineIoVersion) -> Self {
        Self {
            http,
            version,
            uri: Mutex::new(String::new()),
        }
    }

    /// The URI the next request goes to.
    pub fn uri(&self) -> String {
        self.uri.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_uri(&self, uri: String) {
        *self.uri.lock().unwrap_or_else(PoisonError::into_inner) = uri;
    }

    /// Splits one response body into messages.
    fn decode_body(&self, body: ProtocolMessage) -> Vec<ProtocolMessage> {
        let codec = self.version.payload_codec();
        match body {
            ProtocolMessage::Text(text) => {
                let messages = codec.decode(&text);
                match self.version {
                    EngineIoVersion::V3 => messages.into_iter().map(decode_v3_base64).collect(),
                    EngineIoVersion::V4 => messages,
                }
            }
            ProtocolMessage::Bytes(bytes) => codec.decode_bytes(&bytes),
        }
    }

    async fn post(&self, body: ProtocolMessage) -> Result<(), TransportError> {
        let request = HttpRequest::post(self.uri(), body);
        tracing::trace!(uri = %request.uri, "polling POST");
        self.http.request(request).await.map(drop)
    }
}

/// v3 servers send attachments inside a text body as `b4<base64>`.
fn decode_v3_base64(message: ProtocolMessage) -> ProtocolMessage {
    let ProtocolMessage::Text(text) = message else {
        return message;
    };
    let Some(encoded) = text.strip_prefix("b4") else {
        return ProtocolMessage::Text(text);
    };
    match BASE64.decode(encoded) {
        Ok(bytes) => ProtocolMessage::Bytes(bytes),
        Err(e) => {
            tracing::debug!(error = %e, "bad base64 attachment in v3 body");
            ProtocolMessage::Text(text)
        }
    }
}

/// Whether `uri` already carries a `sid` query parameter.
fn has_sid(uri: &str) -> bool {
    Url::parse(uri).is_ok_and(|url| url.query_pairs().any(|(key, _)| key == "sid"))
}

impl<H: HttpClient> TransportSession for PollingSession<H> {
    fn kind(&self) -> TransportKind {
        TransportKind::Polling
    }

    fn version(&self) -> EngineIoVersion {
        self.version
    }

    fn server_uri_scheme(&self, secure: bool) -> &'static str {
        if secure { "https" } else { "http" }
    }

    async fn connect_core(
        &self,
        uri: String,
        resume_sid: Option<String>,
    ) -> Result<Vec<ProtocolMessage>, TransportError> {
        self.set_uri(uri.clone());
        tracing::debug!(%uri, resuming = resume_sid.is_some(), "polling handshake");
        let request = HttpRequest::get(uri);
        // A resumed session already has a sid, so its first GET is a plain poll.
        let request = match resume_sid {
            Some(_) => request,
            None => request.as_connect_probe(),
        };
        let body = self.http.request(request).await?;
        Ok(self.decode_body(body))
    }

    fn on_opened(&self, sid: &str) {
        let mut uri = self.uri.lock().unwrap_or_else(PoisonError::into_inner);
        if !has_sid(&uri) {
            uri.push_str("&sid=");
            uri.push_str(sid);
        }
    }

    async fn send(&self, messages: Vec<ProtocolMessage>) -> Result<(), TransportError> {
        let codec = self.version.payload_codec();
        match self.version {
            EngineIoVersion::V4 => {
                self.post(ProtocolMessage::Text(codec.encode(&messages))).await
            }
            EngineIoVersion::V3 => {
                let (attachments, texts): (Vec<_>, Vec<_>) =
                    messages.into_iter().partition(ProtocolMessage::is_bytes);
                if !texts.is_empty() {
                    self.post(ProtocolMessage::Text(codec.encode(&texts))).await?;
                }
                if !attachments.is_empty() {
                    self.post(ProtocolMessage::Bytes(codec.encode_bytes(&attachments)))
                        .await?;
                }
                Ok(())
            }
        }
    }

    async fn receive(&self) -> Result<Option<Vec<ProtocolMessage>>, TransportError> {
        let body = self.http.request(HttpRequest::get(self.uri())).await?;
        Ok(Some(self.decode_body(body)))
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

//! Bidirectional message channels between a session and its client.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{QueryLensError, Result};
use crate::session::protocol::{LensRequest, LensResponse};

/// Transport for one session.
#[async_trait]
pub trait MessageChannel: Send {
    /// The next request, or `None` once the client has gone away.
    async fn recv(&mut self) -> Result<Option<LensRequest>>;

    /// Deliver one response.
    async fn send(&mut self, response: &LensResponse) -> Result<()>;
}

/// Channel over in-process queues, used by the CLI and tests.
///
/// Requests travel as raw text so that malformed input reaches the session
/// exactly as it would over a socket.
#[derive(Debug)]
pub struct MemoryChannel {
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: mpsc::UnboundedSender<String>,
}

/// Client end of a [`MemoryChannel`].
#[derive(Debug)]
pub struct MemoryClient {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl MemoryChannel {
    /// A connected session end and client end.
    pub fn pair() -> (MemoryChannel, MemoryClient) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        (
            MemoryChannel {
                inbound: request_rx,
                outbound: response_tx,
            },
            MemoryClient {
                outbound: Some(request_tx),
                inbound: response_rx,
            },
        )
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn recv(&mut self) -> Result<Option<LensRequest>> {
        match self.inbound.recv().await {
            Some(text) => LensRequest::parse(&text).map(Some),
            None => Ok(None),
        }
    }

    async fn send(&mut self, response: &LensResponse) -> Result<()> {
        self.outbound
            .send(response.to_json()?)
            .map_err(|_| QueryLensError::protocol("client disconnected"))
    }
}

impl MemoryClient {
    pub fn send(&self, request: &LensRequest) -> Result<()> {
        self.send_raw(serde_json::to_string(request)?)
    }

    pub fn send_raw<S: Into<String>>(&self, text: S) -> Result<()> {
        self.outbound
            .as_ref()
            .ok_or_else(|| QueryLensError::protocol("client already closed"))?
            .send(text.into())
            .map_err(|_| QueryLensError::protocol("session closed"))
    }

    /// Stop sending; the session sees end of input after queued requests.
    pub fn close(&mut self) {
        self.outbound = None;
    }

    /// The next response, or `None` once the session has ended.
    pub async fn recv(&mut self) -> Result<Option<LensResponse>> {
        match self.inbound.recv().await {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Every remaining response until the session ends.
    pub async fn drain(&mut self) -> Result<Vec<LensResponse>> {
        let mut responses = Vec::new();
        while let Some(response) = self.recv().await? {
            responses.push(response);
        }
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let (mut channel, mut client) = MemoryChannel::pair();
        client.send(&LensRequest::new("a", None)).unwrap();
        assert_eq!(
            channel.recv().await.unwrap(),
            Some(LensRequest::new("a", None))
        );

        channel.send(&LensResponse::message("hello")).await.unwrap();
        assert_eq!(
            client.recv().await.unwrap(),
            Some(LensResponse::message("hello"))
        );
    }

    #[tokio::test]
    async fn test_malformed_request_is_an_error() {
        let (mut channel, client) = MemoryChannel::pair();
        client.send_raw("not json").unwrap();
        assert!(channel.recv().await.unwrap_err().is_protocol());
    }

    #[tokio::test]
    async fn test_close() {
        let (mut channel, mut client) = MemoryChannel::pair();
        client.close();
        assert!(channel.recv().await.unwrap().is_none());
        assert!(client.send_raw("x").is_err());

        drop(channel);
        assert!(client.recv().await.unwrap().is_none());
    }
}

//! The streaming/drain transport collaborator: the host-owned connection to
//! the chat service that hands this crate raw inbound frames and lets it
//! ACK/NACK them.

use async_trait::async_trait;

/// A single inbound request handed up from the transport, paired with a
/// responder the dispatcher uses to ACK (200), NACK (500), or reject (400)
/// it.
pub struct IncomingRequest {
    pub verb: String,
    pub path: String,
    pub body: Vec<u8>,
    responder: Option<Box<dyn FnOnce(u16) + Send>>,
}

impl IncomingRequest {
    pub fn new(
        verb: impl Into<String>,
        path: impl Into<String>,
        body: Vec<u8>,
        responder: Box<dyn FnOnce(u16) + Send>,
    ) -> Self {
        IncomingRequest {
            verb: verb.into(),
            path: path.into(),
            body,
            responder: Some(responder),
        }
    }

    /// Acknowledge successful (or swallowed-error) processing.
    pub fn ack(mut self) {
        if let Some(r) = self.responder.take() {
            r(200);
        }
    }

    /// Reject a frame this crate could not even decode: the server's fault,
    /// not the caller's, so it isn't ACKed.
    pub fn nack(mut self) {
        if let Some(r) = self.responder.take() {
            r(500);
        }
    }

    /// Reject a request that is malformed at the transport level (wrong verb
    /// or path) — the caller's fault, distinct from a frame-decode failure.
    pub fn reject(mut self) {
        if let Some(r) = self.responder.take() {
            r(400);
        }
    }
}

/// Why a streaming transport closed.
#[derive(Debug, Clone)]
pub struct CloseEvent {
    pub code: Option<u16>,
    pub reason: Option<String>,
}

/// The event surface a connected transport pushes at the receiver.
pub enum TransportEvent {
    Request(IncomingRequest),
    Closed(CloseEvent),
}

/// A streaming (websocket-shaped) or pull-based (drain-shaped) transport.
///
/// Implementations are host-owned; this crate only consumes the trait.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Wait for the next transport event. Returns `None` once the transport
    /// is permanently exhausted (e.g. after `close` is called).
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Send a keepalive/heartbeat frame.
    async fn keepalive(&mut self);

    /// Tear down the connection.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU16, Ordering};
    use std::sync::Arc;

    #[test]
    fn ack_invokes_responder_with_200() {
        let code = Arc::new(AtomicU16::new(0));
        let code2 = code.clone();
        let req = IncomingRequest::new(
            "PUT",
            "/api/v1/message",
            vec![],
            Box::new(move |c| code2.store(c, Ordering::SeqCst)),
        );
        req.ack();
        assert_eq!(code.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn nack_invokes_responder_with_500() {
        let code = Arc::new(AtomicU16::new(0));
        let code2 = code.clone();
        let req = IncomingRequest::new(
            "PUT",
            "/api/v1/message",
            vec![],
            Box::new(move |c| code2.store(c, Ordering::SeqCst)),
        );
        req.nack();
        assert_eq!(code.load(Ordering::SeqCst), 500);
    }

    #[test]
    fn reject_invokes_responder_with_400() {
        let code = Arc::new(AtomicU16::new(0));
        let code2 = code.clone();
        let req = IncomingRequest::new(
            "GET",
            "/api/v1/message",
            vec![],
            Box::new(move |c| code2.store(c, Ordering::SeqCst)),
        );
        req.reject();
        assert_eq!(code.load(Ordering::SeqCst), 400);
    }
}

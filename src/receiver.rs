//! The top-level receiver lifecycle: binds a transport, unwraps frames,
//! serializes per-connection dispatch, and drives the reconnect loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::codec::ProtobufCodec;
use crate::config::ReceiverConfig;
use crate::dispatch::EnvelopeDispatcher;
use crate::envelope_crypto::EnvelopeCrypto;
use crate::error::ReceiverError;
use crate::event_bus::EventBus;
use crate::serial_queue::SerialQueue;
use crate::service::Service;
use crate::session_store::SessionStore;
use crate::state_store::StateStore;
use crate::transport::{CloseEvent, IncomingRequest, MessageTransport, TransportEvent};
use crate::types::{ErrorEvent, Event};

/// Owns the collaborators and serialization state needed to turn inbound
/// transport frames into dispatched events.
pub struct Receiver {
    config: ReceiverConfig,
    codec: Arc<dyn ProtobufCodec>,
    session_store: Arc<dyn SessionStore>,
    state: Arc<dyn StateStore>,
    service: Arc<dyn Service>,
    events: Arc<EventBus<Event>>,
    serial: SerialQueue<(String, u32)>,
    connected: AtomicBool,
}

impl Receiver {
    pub fn new(
        config: ReceiverConfig,
        codec: Arc<dyn ProtobufCodec>,
        session_store: Arc<dyn SessionStore>,
        state: Arc<dyn StateStore>,
        service: Arc<dyn Service>,
        events: Arc<EventBus<Event>>,
    ) -> Self {
        Receiver {
            config,
            codec,
            session_store,
            state,
            service,
            events,
            serial: SerialQueue::new(),
            connected: AtomicBool::new(false),
        }
    }

    pub fn service(&self) -> &Arc<dyn Service> {
        &self.service
    }

    pub fn events(&self) -> &Arc<EventBus<Event>> {
        &self.events
    }

    /// Drive a single connected transport until it closes, dispatching every
    /// inbound request as it arrives. Returns the transport's close reason.
    pub async fn run(&self, transport: &mut dyn MessageTransport) -> CloseEvent {
        let keepalive_interval = Duration::from_secs(self.config.keepalive_interval_seconds);
        let mut ticker = tokio::time::interval(keepalive_interval);
        ticker.tick().await; // first tick fires immediately

        self.connected.store(true, Ordering::SeqCst);
        let close = loop {
            tokio::select! {
                event = transport.next_event() => {
                    match event {
                        Some(TransportEvent::Request(req)) => self.handle_request(req).await,
                        Some(TransportEvent::Closed(close)) => break close,
                        None => {
                            break CloseEvent {
                                code: None,
                                reason: Some("transport exhausted".to_string()),
                            }
                        }
                    }
                }
                _ = ticker.tick() => {
                    transport.keepalive().await;
                }
            }
        };
        self.connected.store(false, Ordering::SeqCst);
        close
    }

    /// Close code that means "do not reconnect" — terminal by convention,
    /// matching the sentinel the historical receiver's transport used.
    const TERMINAL_CLOSE_CODE: u16 = 3000;

    /// Run `connect` in a loop. After each close, a close code of
    /// [`Self::TERMINAL_CLOSE_CODE`] ends the loop outright; any other close
    /// triggers a liveness probe (`Service::get_devices`) before
    /// reconnecting, backing off between failed probes up to
    /// `config.max_reconnect_attempts` (0 means unbounded).
    pub async fn run_with_reconnect<F, Fut>(&self, mut connect: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Box<dyn MessageTransport>>,
    {
        let mut attempt = 0u32;
        loop {
            let mut transport = connect().await;
            let close = self.run(transport.as_mut()).await;
            tracing::debug!(code = ?close.code, reason = ?close.reason, "transport closed");

            if close.code == Some(Self::TERMINAL_CLOSE_CODE) {
                tracing::debug!("received terminal close code, not reconnecting");
                return;
            }

            loop {
                match self.service.get_devices().await {
                    Ok(_) => break,
                    Err(e) => {
                        if self.config.max_reconnect_attempts != 0
                            && attempt >= self.config.max_reconnect_attempts
                        {
                            tracing::error!("exhausted reconnect attempts, giving up");
                            return;
                        }

                        let mut event = Event::Error(ErrorEvent {
                            error: e,
                            envelope_timestamp: None,
                            proto: None,
                        });
                        self.events.dispatch(event.name(), &mut event).await;

                        let delay = Backoff::next(attempt);
                        tracing::debug!(attempt, ?delay, "liveness probe failed, backing off");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }
    }

    /// Verb the message-stream transport request must arrive as.
    const MESSAGE_VERB: &'static str = "PUT";

    /// Handle one inbound transport request: unwrap the frame, decode the
    /// envelope, and dispatch it serialized per `(source, source_device)`.
    ///
    /// Rejects (400) a request whose verb or path doesn't match the expected
    /// message-stream shape — the caller's fault, not the server's. NACKs
    /// (500) only when the frame itself cannot be decoded — a malformed or
    /// unauthenticated frame the host should not redeliver as is. Everything
    /// past that point, including a hard dispatch error, is ACKed (200): a
    /// poison envelope must not wedge the per-owner queue.
    async fn handle_request(&self, req: IncomingRequest) {
        if req.verb != Self::MESSAGE_VERB || req.path != self.config.message_path {
            let error = ReceiverError::BadTransportRequest(format!("{} {}", req.verb, req.path));
            tracing::warn!(error = %error, "rejecting request on unexpected verb/path");
            req.reject();
            return;
        }

        let envelope = match self.decode_frame(&req.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "frame decode failed, nacking");
                req.nack();
                return;
            }
        };

        let owner = (envelope.source.clone(), envelope.source_device);
        let codec = self.codec.clone();
        let session_store = self.session_store.clone();
        let state = self.state.clone();
        let service = self.service.clone();
        let events = self.events.clone();

        self.serial
            .run(owner, move || async move {
                let result = EnvelopeDispatcher::dispatch(
                    envelope,
                    codec.as_ref(),
                    session_store.as_ref(),
                    state.as_ref(),
                    service.as_ref(),
                    events.as_ref(),
                )
                .await;

                if let Err(e) = result {
                    tracing::error!(error = %e, "dispatch failed, acking anyway");
                    let mut event = Event::Error(ErrorEvent {
                        error: e,
                        envelope_timestamp: None,
                        proto: None,
                    });
                    events.dispatch(event.name(), &mut event).await;
                }
            })
            .await;

        req.ack();
    }

    fn decode_frame(&self, body: &[u8]) -> Result<crate::types::Envelope, ReceiverError> {
        let padded = EnvelopeCrypto::decrypt_frame(self.state.signaling_key(), body)?;
        let plaintext = EnvelopeCrypto::unpad(&padded)?;
        self.codec.decode_envelope(&plaintext)
    }

    /// Pull queued envelopes via the drain transport (`Service::request`
    /// against `get_message_stream_url`) instead of a live stream: each page
    /// is decoded, every envelope on it is `handleEnvelope`d strictly in
    /// order, and only once the whole page has been handled are its
    /// deletions (`Service::delete_message`) fired concurrently. The loop
    /// continues while the server reports more queued, stopping early once
    /// `config.drain_page_size` envelopes have been pulled in this call.
    /// Returns the number processed.
    pub async fn drain(&self) -> Result<usize, ReceiverError> {
        if self.connected.load(Ordering::SeqCst) {
            return Err(ReceiverError::DrainWhileConnected);
        }
        let url = self.service.get_message_stream_url();
        let mut total = 0usize;
        loop {
            let body = self.service.request("GET", &url).await?;
            let (envelopes, more) = self.codec.decode_envelope_batch(&body)?;
            if envelopes.is_empty() {
                break;
            }

            for envelope in envelopes.iter().cloned() {
                let owner = (envelope.source.clone(), envelope.source_device);
                let codec = self.codec.clone();
                let session_store = self.session_store.clone();
                let state = self.state.clone();
                let service = self.service.clone();
                let events = self.events.clone();

                self.serial
                    .run(owner, move || async move {
                        let _ = EnvelopeDispatcher::dispatch(
                            envelope,
                            codec.as_ref(),
                            session_store.as_ref(),
                            state.as_ref(),
                            service.as_ref(),
                            events.as_ref(),
                        )
                        .await;
                    })
                    .await;

                total += 1;
            }

            let deletes = envelopes
                .iter()
                .map(|e| self.service.delete_message(&e.source, e.timestamp));
            for result in futures::future::join_all(deletes).await {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "failed to delete drained envelope");
                }
            }

            if !more || total >= self.config.drain_page_size as usize {
                break;
            }
        }
        Ok(total)
    }
}

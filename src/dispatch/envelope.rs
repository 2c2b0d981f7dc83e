//! Stage one of dispatch: decrypts an envelope and hands the plaintext on to
//! `ContentDispatcher`, with bounded re-entry on identity-key changes.

use std::future::Future;
use std::pin::Pin;

use crate::codec::ProtobufCodec;
use crate::dispatch::content::ContentDispatcher;
use crate::error::ReceiverError;
use crate::event_bus::EventBus;
use crate::service::Service;
use crate::session::SessionDecryptor;
use crate::session_store::SessionStore;
use crate::state_store::StateStore;
use crate::types::{EnvelopeType, ErrorEvent, Event, KeyChangeEvent, ReceiptEvent};

pub struct EnvelopeDispatcher;

impl EnvelopeDispatcher {
    /// Decrypt and dispatch `envelope`. On success, or on a swallowed
    /// protocol-layer fault, returns `Ok` so the caller ACKs the frame.
    ///
    /// A `Receipt` envelope carries no ciphertext at all (see `Envelope`'s
    /// invariant), so it is classified and dispatched here before any
    /// decryption is attempted rather than after a decrypt that can never
    /// succeed for it.
    pub async fn dispatch(
        envelope: crate::types::Envelope,
        codec: &dyn ProtobufCodec,
        session_store: &dyn SessionStore,
        state: &dyn StateStore,
        service: &dyn Service,
        events: &EventBus<Event>,
    ) -> Result<(), ReceiverError> {
        if envelope.kind == EnvelopeType::Receipt {
            let mut event = Event::Receipt(ReceiptEvent {
                source: envelope.source.clone(),
                source_device: envelope.source_device,
                timestamp: envelope.timestamp,
            });
            events.dispatch(event.name(), &mut event).await;
            return Ok(());
        }
        Self::dispatch_inner(envelope, codec, session_store, state, service, events, false).await
    }

    /// `reentrant` is true only on the single retry allowed after an
    /// accepted identity-key change — recursion is bounded to depth 1, not
    /// by a counter, so there is no unbounded retry loop even if the host's
    /// session store keeps reporting a key change.
    fn dispatch_inner<'a>(
        mut envelope: crate::types::Envelope,
        codec: &'a dyn ProtobufCodec,
        session_store: &'a dyn SessionStore,
        state: &'a dyn StateStore,
        service: &'a dyn Service,
        events: &'a EventBus<Event>,
        reentrant: bool,
    ) -> Pin<Box<dyn Future<Output = Result<(), ReceiverError>> + 'a>> {
        Box::pin(async move {
            let decryptor = SessionDecryptor::new(session_store);
            match decryptor.decrypt(&envelope).await {
                Ok(plaintext) => {
                    // `content` carries a full Content protobuf (data or sync
                    // message); a legacy envelope with only `legacy_message`
                    // carries a bare DataMessage and routes straight to the
                    // data-message path, skipping the sync-message layer.
                    let content = if envelope.content.is_some() {
                        codec.decode_content(&plaintext)?
                    } else {
                        let data_message = codec.decode_data_message(&plaintext)?;
                        crate::types::Content {
                            data_message: Some(data_message),
                            sync_message: None,
                        }
                    };
                    match ContentDispatcher::process(
                        &envelope,
                        content,
                        state,
                        session_store,
                        service,
                        events,
                    )
                    .await
                    {
                        Ok(()) => Ok(()),
                        Err(e) if e.is_recoverable_protocol_error() => {
                            tracing::warn!(error = %e, "content dispatch failed, swallowing");
                            Self::emit_error(events, e, envelope.timestamp).await;
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                Err(ReceiverError::IncomingIdentityKey {
                    addr,
                    ciphertext,
                    identity_key,
                }) if !reentrant => {
                    let mut event = Event::KeyChange(KeyChangeEvent::new(addr.clone(), identity_key.clone()));
                    events.dispatch(event.name(), &mut event).await;

                    if event.key_change_accepted() {
                        session_store
                            .close_open_session_for_device(&addr, envelope.source_device)
                            .await?;
                        envelope.mark_key_change();
                        Self::dispatch_inner(envelope, codec, session_store, state, service, events, true)
                            .await
                    } else {
                        tracing::warn!(addr = %addr, "identity key change rejected by host");
                        Err(ReceiverError::IncomingIdentityKey {
                            addr,
                            ciphertext,
                            identity_key,
                        })
                    }
                }
                Err(e) if e.is_recoverable_protocol_error() => {
                    tracing::warn!(error = %e, "decrypt failed, swallowing");
                    Self::emit_error(events, e, envelope.timestamp).await;
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
    }

    async fn emit_error(events: &EventBus<Event>, error: ReceiverError, timestamp: u64) {
        let mut event = Event::Error(ErrorEvent {
            error,
            envelope_timestamp: Some(timestamp),
            proto: None,
        });
        events.dispatch(event.name(), &mut event).await;
    }
}

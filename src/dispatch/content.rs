//! Stage two of dispatch: turns a decrypted `Content` into public events.
//!
//! `SyncMessage` fields are checked in a fixed precedence order (sent, read,
//! blocked, contacts, groups, request) even though a well-behaved sender
//! only ever sets one — first-match-wins, matching the historical receiver
//! this crate's wire format descends from.

use crate::attachment::AttachmentFetcher;
use crate::error::ReceiverError;
use crate::event_bus::EventBus;
use crate::service::Service;
use crate::session_store::SessionStore;
use crate::state_store::StateStore;
use crate::types::{
    BlockedEvent, Content, DataFlags, DataMessage, Envelope, Event, MessageEvent, ReadEvent, SentEvent,
};

pub struct ContentDispatcher;

impl ContentDispatcher {
    /// Process a decrypted `Content` for `envelope`, emitting whatever
    /// public events it resolves to. Returns an error for malformed or
    /// out-of-policy content; the caller decides whether to swallow it.
    pub async fn process(
        envelope: &Envelope,
        content: Content,
        state: &dyn StateStore,
        session_store: &dyn SessionStore,
        service: &dyn Service,
        events: &EventBus<Event>,
    ) -> Result<(), ReceiverError> {
        if let Some(mut data_message) = content.data_message {
            if data_message.data_flags().contains(DataFlags::END_SESSION) {
                Self::close_all_sessions(session_store, &envelope.source).await?;
            }
            Self::process_decrypted(&mut data_message, service).await?;
            let mut event = Event::Message(MessageEvent {
                source: envelope.source.clone(),
                source_device: envelope.source_device,
                timestamp: envelope.timestamp,
                message: data_message,
                key_change: envelope.key_change(),
            });
            events.dispatch(event.name(), &mut event).await;
            return Ok(());
        }

        let sync_message = content.sync_message.ok_or(ReceiverError::EmptyContent)?;

        if envelope.source != state.addr() {
            return Err(ReceiverError::ForeignSync(envelope.source.clone()));
        }
        if envelope.source_device == state.device_id() {
            return Err(ReceiverError::SelfSync);
        }

        if let Some(sent) = sync_message.sent {
            let mut message = sent.message;
            if message.data_flags().contains(DataFlags::END_SESSION) {
                if let Some(destination) = &sent.destination {
                    Self::close_all_sessions(session_store, destination).await?;
                }
            }
            Self::process_decrypted(&mut message, service).await?;
            let mut event = Event::Sent(SentEvent {
                destination: sent.destination,
                timestamp: sent.timestamp,
                message,
                expiration_start_timestamp: sent.expiration_start_timestamp,
            });
            events.dispatch(event.name(), &mut event).await;
            return Ok(());
        }

        if !sync_message.read.is_empty() {
            for entry in sync_message.read {
                let mut event = Event::Read(ReadEvent {
                    sender: entry.sender,
                    timestamp: entry.timestamp,
                });
                events.dispatch(event.name(), &mut event).await;
            }
            return Ok(());
        }

        if let Some(blocked) = sync_message.blocked {
            let mut event = Event::Blocked(BlockedEvent {
                numbers: blocked.numbers,
                group_ids: blocked.group_ids,
            });
            events.dispatch(event.name(), &mut event).await;
            return Ok(());
        }

        if sync_message.contacts.is_some() {
            return Err(ReceiverError::DeprecatedSync("contacts"));
        }
        if sync_message.groups.is_some() {
            return Err(ReceiverError::DeprecatedSync("groups"));
        }
        if sync_message.request.is_some() {
            return Err(ReceiverError::DeprecatedSync("request"));
        }

        Err(ReceiverError::EmptySync)
    }

    /// Close every open session this account has with `addr`, not just the
    /// device the current envelope arrived from — `END_SESSION` ends the
    /// whole conversation, wherever the peer's other devices left it.
    async fn close_all_sessions(session_store: &dyn SessionStore, addr: &str) -> Result<(), ReceiverError> {
        for device_id in session_store.get_device_ids(addr).await? {
            session_store.close_open_session_for_device(addr, device_id).await?;
        }
        Ok(())
    }

    /// Normalize `expire_timer` to `Some(0)` when absent, short-circuit on
    /// `END_SESSION` (an end-session message carries no attachments worth
    /// fetching), otherwise fetch and decrypt every attachment concurrently.
    async fn process_decrypted(message: &mut DataMessage, service: &dyn Service) -> Result<(), ReceiverError> {
        message.expire_timer = Some(message.expire_timer.unwrap_or(0));

        if message.data_flags().contains(DataFlags::END_SESSION) {
            return Ok(());
        }

        if message.group.is_some() {
            tracing::debug!("tolerating legacy group field on data message");
        }

        if !message.attachments.is_empty() {
            let fetches = message
                .attachments
                .iter()
                .map(|attachment| AttachmentFetcher::fetch(attachment, service));
            message.attachments = futures::future::try_join_all(fetches).await?;
        }

        Ok(())
    }
}

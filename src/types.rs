//! Wire and data-model types: envelopes, decrypted content, and the event
//! payloads this crate hands back to the host application.

use bitflags::bitflags;

/// The envelope type as carried on the wire, determining which session-cipher
/// operation `SessionDecryptor` must invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeType {
    /// A `SignalMessage` encrypted against an existing session.
    Ciphertext,
    /// A `PreKeySignalMessage` that may establish a new session.
    PreKeyBundle,
    /// A delivery receipt; carries no ciphertext.
    Receipt,
    /// Sealed-sender envelope. Not implemented by this receiver — see
    /// `ReceiverError::Unsupported`.
    UnidentifiedSender,
}

/// A received envelope, prior to decryption.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: EnvelopeType,
    pub source: String,
    pub source_device: u32,
    pub timestamp: u64,
    pub content: Option<Vec<u8>>,
    pub legacy_message: Option<Vec<u8>>,
    key_change: bool,
}

impl Envelope {
    pub fn new(
        kind: EnvelopeType,
        source: impl Into<String>,
        source_device: u32,
        timestamp: u64,
    ) -> Self {
        Envelope {
            kind,
            source: source.into(),
            source_device,
            timestamp,
            content: None,
            legacy_message: None,
            key_change: false,
        }
    }

    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_legacy_message(mut self, legacy_message: Vec<u8>) -> Self {
        self.legacy_message = Some(legacy_message);
        self
    }

    /// Set only by `EnvelopeDispatcher` when the session store reports an
    /// identity-key rotation and the caller approves it.
    pub fn key_change(&self) -> bool {
        self.key_change
    }

    pub(crate) fn mark_key_change(&mut self) {
        self.key_change = true;
    }

    /// The ciphertext bytes to decrypt: `content` when present, else the
    /// legacy single-field message.
    pub fn ciphertext(&self) -> Option<&[u8]> {
        self.content.as_deref().or(self.legacy_message.as_deref())
    }
}

bitflags! {
    /// `DataMessage.flags`, matching the historical Signal wire encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataFlags: u32 {
        const END_SESSION = 0x1;
        const EXPIRATION_TIMER_UPDATE = 0x2;
        const PROFILE_KEY_UPDATE = 0x4;
    }
}

/// A group context attached to a `DataMessage`.
#[derive(Debug, Clone)]
pub struct GroupContext {
    pub id: Vec<u8>,
}

/// An attachment pointer, optionally fetched in by `AttachmentFetcher`.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub id: String,
    pub key: Vec<u8>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub data: Option<Vec<u8>>,
}

/// A decrypted, application-level data message.
#[derive(Debug, Clone, Default)]
pub struct DataMessage {
    pub flags: u32,
    pub expire_timer: Option<u32>,
    pub group: Option<GroupContext>,
    pub attachments: Vec<Attachment>,
    pub body: Option<String>,
}

impl DataMessage {
    pub fn data_flags(&self) -> DataFlags {
        DataFlags::from_bits_truncate(self.flags)
    }
}

/// The `sent` variant of a `SyncMessage`: a copy of a message we sent from
/// another of our own devices.
#[derive(Debug, Clone)]
pub struct Sent {
    pub destination: Option<String>,
    pub timestamp: u64,
    pub message: DataMessage,
    pub expiration_start_timestamp: Option<u64>,
}

/// One entry of a `SyncMessage::read` receipt list.
#[derive(Debug, Clone)]
pub struct Read {
    pub sender: String,
    pub timestamp: u64,
}

/// The `blocked` variant of a `SyncMessage`: a full contact/group block list
/// synced from another of our own devices.
#[derive(Debug, Clone, Default)]
pub struct Blocked {
    pub numbers: Vec<String>,
    pub group_ids: Vec<Vec<u8>>,
}

/// A decrypted sync message, modeled as a struct-of-options rather than an
/// enum: receiving more than one field set is tolerated (first-match-wins,
/// per `ContentDispatcher`), even though a well-behaved sender sets only one.
#[derive(Debug, Clone, Default)]
pub struct SyncMessage {
    pub sent: Option<Sent>,
    pub read: Vec<Read>,
    pub blocked: Option<Blocked>,
    pub contacts: Option<()>,
    pub groups: Option<()>,
    pub request: Option<()>,
}

/// A decrypted `Content` protobuf: the envelope's plaintext, one layer in.
#[derive(Debug, Clone, Default)]
pub struct Content {
    pub data_message: Option<DataMessage>,
    pub sync_message: Option<SyncMessage>,
}

/// Payload of the `message` event: a normal incoming data message.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub source: String,
    pub source_device: u32,
    pub timestamp: u64,
    pub message: DataMessage,
    /// Whether this envelope was re-dispatched after an accepted identity-key
    /// change (`Envelope::key_change`).
    pub key_change: bool,
}

/// Payload of the `sent` event: our own outgoing message, synced back to us.
#[derive(Debug, Clone)]
pub struct SentEvent {
    pub destination: Option<String>,
    pub timestamp: u64,
    pub message: DataMessage,
    pub expiration_start_timestamp: Option<u64>,
}

/// Payload of the `receipt` event: an envelope of kind `Receipt`.
#[derive(Debug, Clone)]
pub struct ReceiptEvent {
    pub source: String,
    pub source_device: u32,
    pub timestamp: u64,
}

/// Payload of the `read` event: a single read-receipt sync entry.
#[derive(Debug, Clone)]
pub struct ReadEvent {
    pub sender: String,
    pub timestamp: u64,
}

/// Payload of the `blocked` event: a synced contact/group block list.
#[derive(Debug, Clone)]
pub struct BlockedEvent {
    pub numbers: Vec<String>,
    pub group_ids: Vec<Vec<u8>>,
}

/// Payload of the `keychange` event: the sender's identity key changed.
#[derive(Debug, Clone)]
pub struct KeyChangeEvent {
    pub addr: String,
    pub identity_key: Vec<u8>,
    /// Written back by a listener to approve re-decryption; read by the
    /// dispatcher after `EventBus::dispatch` returns.
    pub accepted: bool,
}

impl KeyChangeEvent {
    pub fn new(addr: impl Into<String>, identity_key: Vec<u8>) -> Self {
        KeyChangeEvent {
            addr: addr.into(),
            identity_key,
            accepted: false,
        }
    }
}

/// Payload of the `error` event: a fault the dispatcher could not recover
/// from and is surfacing to the host instead of swallowing.
#[derive(Debug)]
pub struct ErrorEvent {
    pub error: crate::error::ReceiverError,
    pub envelope_timestamp: Option<u64>,
    pub proto: Option<Vec<u8>>,
}

/// The single payload type carried by the receiver's `EventBus`. One enum
/// rather than one bus per event name, so the host registers listeners
/// against a single bus and matches on variant.
#[derive(Debug)]
pub enum Event {
    Message(MessageEvent),
    Sent(SentEvent),
    Receipt(ReceiptEvent),
    Read(ReadEvent),
    Blocked(BlockedEvent),
    KeyChange(KeyChangeEvent),
    Error(ErrorEvent),
}

impl Event {
    /// The event name listeners register against, matching the historical
    /// naming of each event.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Message(_) => "message",
            Event::Sent(_) => "sent",
            Event::Receipt(_) => "receipt",
            Event::Read(_) => "read",
            Event::Blocked(_) => "blocked",
            Event::KeyChange(_) => "keychange",
            Event::Error(_) => "error",
        }
    }

    /// Read back the `accepted` flag a `keychange` listener may have set.
    /// Any other variant is never accepted.
    pub fn key_change_accepted(&self) -> bool {
        matches!(self, Event::KeyChange(k) if k.accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_ciphertext_prefers_content_over_legacy_message() {
        let env = Envelope::new(EnvelopeType::Ciphertext, "+1", 1, 0)
            .with_content(vec![1, 2])
            .with_legacy_message(vec![9, 9]);
        assert_eq!(env.ciphertext(), Some(&[1, 2][..]));
    }

    #[test]
    fn envelope_ciphertext_falls_back_to_legacy_message() {
        let env = Envelope::new(EnvelopeType::Ciphertext, "+1", 1, 0).with_legacy_message(vec![9]);
        assert_eq!(env.ciphertext(), Some(&[9][..]));
    }

    #[test]
    fn envelope_key_change_starts_false_and_is_crate_internal() {
        let mut env = Envelope::new(EnvelopeType::Ciphertext, "+1", 1, 0);
        assert!(!env.key_change());
        env.mark_key_change();
        assert!(env.key_change());
    }

    #[test]
    fn data_flags_round_trip_through_bits() {
        let msg = DataMessage {
            flags: DataFlags::END_SESSION.bits(),
            ..Default::default()
        };
        assert!(msg.data_flags().contains(DataFlags::END_SESSION));
        assert!(!msg.data_flags().contains(DataFlags::EXPIRATION_TIMER_UPDATE));
    }

    #[test]
    fn sync_message_default_has_nothing_set() {
        let sync = SyncMessage::default();
        assert!(sync.sent.is_none());
        assert!(sync.read.is_empty());
        assert!(sync.blocked.is_none());
    }

    #[test]
    fn keychange_event_defaults_to_unaccepted() {
        let event = KeyChangeEvent::new("+1", vec![1, 2, 3]);
        assert!(!event.accepted);
        assert_eq!(event.identity_key, vec![1, 2, 3]);
    }

    #[test]
    fn event_name_matches_variant() {
        let event = Event::KeyChange(KeyChangeEvent::new("+1", vec![]));
        assert_eq!(event.name(), "keychange");
        assert!(!event.key_change_accepted());
    }

    #[test]
    fn event_key_change_accepted_reads_back_listener_mutation() {
        let mut event = Event::KeyChange(KeyChangeEvent::new("+1", vec![]));
        if let Event::KeyChange(k) = &mut event {
            k.accepted = true;
        }
        assert!(event.key_change_accepted());
    }

    #[test]
    fn non_keychange_events_are_never_accepted() {
        let event = Event::Receipt(ReceiptEvent {
            source: "+1".into(),
            source_device: 1,
            timestamp: 0,
        });
        assert!(!event.key_change_accepted());
    }
}

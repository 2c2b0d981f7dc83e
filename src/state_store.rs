//! The read-only `StateStore` collaborator: the small slice of account state
//! the receiver needs to validate sync messages and unwrap transport frames.

/// Host-owned read-only account state.
pub trait StateStore: Send + Sync {
    /// Our own account address, used to validate that `SyncMessage`
    /// envelopes actually originated from one of our own devices.
    fn addr(&self) -> &str;

    /// Our own device id, used to reject sync envelopes addressed to
    /// ourselves.
    fn device_id(&self) -> u32;

    /// The 52-byte signalling key used to authenticate and decrypt
    /// transport frames.
    fn signaling_key(&self) -> &[u8];
}

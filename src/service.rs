//! The HTTP `Service` collaborator: REST calls against the chat service that
//! the receiver pipeline needs but does not itself implement (attachment
//! download URLs, device listing, the non-streaming message-stream URL).

use async_trait::async_trait;

use crate::error::ReceiverError;

/// Host-owned HTTP client against the chat service's REST surface.
#[async_trait]
pub trait Service: Send + Sync {
    /// Issue an arbitrary authenticated request, returning the raw response
    /// body. Used by `AttachmentFetcher` and anything else that needs a
    /// one-shot call outside the drain/stream transport.
    async fn request(&self, method: &str, path: &str) -> Result<Vec<u8>, ReceiverError>;

    /// List this account's currently registered device ids.
    async fn get_devices(&self) -> Result<Vec<u32>, ReceiverError>;

    /// Resolve an attachment pointer id to a fetchable CDN URL.
    async fn get_attachment(&self, id: &str) -> Result<String, ReceiverError>;

    /// The URL the drain-mode transport should poll for queued messages.
    fn get_message_stream_url(&self) -> String;

    /// Acknowledge-and-remove one envelope from the drain queue after it has
    /// been handled, keyed the way the server's `DELETE /messages/{source}/{timestamp}`
    /// route expects.
    async fn delete_message(&self, source: &str, timestamp: u64) -> Result<(), ReceiverError>;
}

//! The narrow trait the transfer state machine uses to publish push
//! messages, implemented by `relay-push`'s `Hub`. Keeping this in
//! `relay-core` (rather than depending on `relay-push` directly) avoids a
//! cycle: `relay-push` depends on `relay-core` for [`crate::types::PushMessage`].

use crate::error::Result;
use crate::types::PushMessage;
use async_trait::async_trait;
use relay_crypto::HashedId;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Best-effort delivery with durable-queue fallback, as specified for
    /// the push funnel: local write if connected, else bus publish, else
    /// (if nothing is listening) append to the per-identity pending queue.
    async fn send(&self, identity: &HashedId, message: PushMessage) -> Result<()>;
}

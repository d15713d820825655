//! The connection-side collaborator the writer reports into.

use muxrpc_proto::{ConnectionContext, MessageBundle, MessageId};

/// Supplied by the connection for the duration of one `write` call.
pub trait Sender {
    /// A message finished sending and does not wait for a response; the
    /// bundle is handed back together with its pool-level id.
    fn complete_message(
        &mut self,
        ctx: &mut ConnectionContext,
        bundle: MessageBundle,
        pool_id: MessageId,
    ) -> std::io::Result<()>;

    /// Ownership of the relay buffer returns to the engine. Called at most
    /// once per `write` invocation that was granted relay sending.
    fn release_relay_buffer(&mut self);
}

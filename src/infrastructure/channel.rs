//! Command Channel
//!
//! The transport below the bring-up engine. It hands out buffers, queues
//! commands, and later delivers exactly one completion event per accepted
//! command to the [`CompletionTarget`] named at transmit time.

use crate::domain::models::CompletionTarget;
use crate::error::TransmitError;
use crate::hci::buffer::command_alloc_size;
use crate::hci::{HciBuffer, Opcode};
use tracing::{debug, error};

pub trait CommandChannel {
    /// Allocate a buffer of `size` bytes, header included.
    fn alloc(&mut self, size: usize) -> Option<HciBuffer>;

    /// Release a buffer obtained from [`alloc`](Self::alloc) or a delivered event.
    fn free(&mut self, buffer: HciBuffer);

    /// Queue one command.
    ///
    /// On `Ok` the channel owns `buffer` and will deliver one completion event
    /// for `target`. On `Err` the buffer is handed back and the caller must
    /// [`free`](Self::free) it.
    fn transmit(
        &mut self,
        opcode: Opcode,
        buffer: HciBuffer,
        target: CompletionTarget,
    ) -> Result<(), HciBuffer>;
}

/// Receives the completion events for commands it issued.
pub trait CompletionHandler {
    /// Handle one completion event. The handler owns `event` and must free it.
    fn on_complete(&mut self, channel: &mut dyn CommandChannel, event: HciBuffer);
}

/// Allocate, frame and transmit one command on behalf of `target`.
///
/// Every failure path frees the buffer it allocated.
pub fn send_command(
    channel: &mut dyn CommandChannel,
    opcode: Opcode,
    params: &[u8],
    target: CompletionTarget,
) -> Result<(), TransmitError> {
    let mut buffer = channel
        .alloc(command_alloc_size(params.len()))
        .ok_or(TransmitError::NoBuffer)?;

    if let Err(e) = buffer.write_command(opcode, params) {
        error!("Cannot frame command {}: {}", opcode, e);
        channel.free(buffer);
        return Err(TransmitError::Overflow { opcode: opcode.0 });
    }

    debug!(%opcode, len = params.len(), ?target, "Transmitting command");
    channel.transmit(opcode, buffer, target).map_err(|rejected| {
        channel.free(rejected);
        TransmitError::Rejected { opcode: opcode.0 }
    })
}

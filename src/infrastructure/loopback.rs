//! Loopback controller
//!
//! An in-process [`CommandChannel`] that answers every accepted command with a
//! Command Complete event. It records what was sent and keeps count of the
//! buffers it handed out, so a dry run (or a test) can check the exact command
//! stream and that nothing leaked.

use crate::domain::models::CompletionTarget;
use crate::hci::event::command_complete;
use crate::hci::opcode::HCI_INTEL_RDSW_VERSION;
use crate::hci::{HciBuffer, Opcode};
use crate::infrastructure::channel::CommandChannel;
use crate::infrastructure::upio::Upio;
use crate::vendor::VendorLib;
use std::collections::{HashMap, VecDeque};
use tracing::trace;

/// Status byte returned for commands configured to fail (Command Disallowed).
pub const FAILURE_STATUS: u8 = 0x0C;

/// A command as it reached the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub opcode: Opcode,
    pub params: Vec<u8>,
    pub target: CompletionTarget,
}

#[derive(Debug, Default)]
pub struct LoopbackController {
    /// Return parameters for the read-SW-version command (status excluded).
    version: Vec<u8>,
    /// Return parameters per opcode, overriding `version` when present.
    replies: HashMap<Opcode, Vec<u8>>,
    fail_opcodes: Vec<Opcode>,
    reject_opcodes: Vec<Opcode>,
    alloc_budget: Option<usize>,
    pending: VecDeque<(CompletionTarget, HciBuffer)>,
    sent: Vec<SentCommand>,
    allocated: usize,
    freed: usize,
}

impl LoopbackController {
    pub fn new(version: &[u8]) -> Self {
        Self {
            version: version.to_vec(),
            ..Default::default()
        }
    }

    /// Answer `opcode` with a non-zero status.
    pub fn fail_opcode(mut self, opcode: Opcode) -> Self {
        self.fail_opcodes.push(opcode);
        self
    }

    /// Refuse to accept `opcode` at transmit time.
    pub fn reject_opcode(mut self, opcode: Opcode) -> Self {
        self.reject_opcodes.push(opcode);
        self
    }

    /// Return parameters for a specific opcode's completion.
    pub fn reply(mut self, opcode: Opcode, return_params: &[u8]) -> Self {
        self.replies.insert(opcode, return_params.to_vec());
        self
    }

    /// Allow only `n` more allocations.
    pub fn set_alloc_budget(&mut self, n: Option<usize>) {
        self.alloc_budget = n;
    }

    /// Next completion to deliver, oldest first.
    pub fn poll_completion(&mut self) -> Option<(CompletionTarget, HciBuffer)> {
        self.pending.pop_front()
    }

    /// An event buffer counted as allocated by this channel.
    pub fn event_buffer(&mut self, bytes: &[u8]) -> HciBuffer {
        self.allocated += 1;
        HciBuffer::from_event(bytes)
    }

    pub fn sent(&self) -> &[SentCommand] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<SentCommand> {
        std::mem::take(&mut self.sent)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Buffers handed out and not yet freed, including undelivered events.
    pub fn outstanding(&self) -> usize {
        self.allocated - self.freed
    }

    fn return_params(&self, opcode: Opcode) -> &[u8] {
        if let Some(params) = self.replies.get(&opcode) {
            return params;
        }
        if opcode == HCI_INTEL_RDSW_VERSION {
            return &self.version;
        }
        &[]
    }
}

impl CommandChannel for LoopbackController {
    fn alloc(&mut self, size: usize) -> Option<HciBuffer> {
        if let Some(budget) = self.alloc_budget.as_mut() {
            if *budget == 0 {
                return None;
            }
            *budget -= 1;
        }
        self.allocated += 1;
        Some(HciBuffer::with_size(size))
    }

    fn free(&mut self, _buffer: HciBuffer) {
        self.freed += 1;
    }

    fn transmit(
        &mut self,
        opcode: Opcode,
        buffer: HciBuffer,
        target: CompletionTarget,
    ) -> Result<(), HciBuffer> {
        if self.reject_opcodes.contains(&opcode) {
            return Err(buffer);
        }

        trace!(%opcode, bytes = ?buffer.bytes(), "loopback rx");
        self.sent.push(SentCommand {
            opcode,
            params: buffer.command_params().to_vec(),
            target,
        });
        // The channel owns sent buffers and releases them itself
        self.free(buffer);

        let status = if self.fail_opcodes.contains(&opcode) {
            FAILURE_STATUS
        } else {
            0
        };
        let bytes = command_complete(opcode, status, self.return_params(opcode));
        let event = self.event_buffer(&bytes);
        self.pending.push_back((target, event));
        Ok(())
    }
}

impl<U: Upio> VendorLib<LoopbackController, U> {
    /// Deliver queued completions until the controller goes quiet.
    ///
    /// Returns the number of events delivered.
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Some((target, event)) = self.channel_mut().poll_completion() {
            self.handle_completion(target, event);
            delivered += 1;
        }
        delivered
    }
}

//! HCI framing
//!
//! Just enough of the host-controller interface to frame outgoing commands and
//! read the status of their completion events.
//!
//! - [`opcode`] - command opcodes used by the bring-up sequence
//! - [`buffer`] - channel buffers and command framing
//! - [`event`] - Command Complete / Command Status views

pub mod buffer;
pub mod event;
pub mod opcode;

pub use buffer::HciBuffer;
pub use event::CompletionEvent;
pub use opcode::Opcode;

//! Channel buffers.
//!
//! Every buffer exchanged with the command channel starts with a fixed header
//! followed by raw packet bytes:
//!
//! ```text
//! [0-1] : event           (message type, see MSG_*)
//! [2-3] : len             (bytes of packet data in use)
//! [4-5] : offset          (start of packet data)
//! [6-7] : layer_specific
//! [8..] : packet data
//! ```
//!
//! Outgoing commands are framed as a 2-byte little-endian opcode, a 1-byte
//! parameter length and the parameters themselves.

use crate::error::BufferError;
use crate::hci::Opcode;
use byteorder::{ByteOrder, LittleEndian};

/// Size of the buffer header that precedes the packet bytes.
pub const BT_HC_HDR_SIZE: usize = 8;

/// Opcode (2) plus parameter length (1).
pub const HCI_CMD_PREAMBLE_SIZE: usize = 3;

/// Largest command the bring-up sequence ever frames.
pub const HCI_CMD_MAX_LEN: usize = 258;

/// Message type of a host-to-controller command buffer.
pub const MSG_STACK_TO_HC_HCI_CMD: u16 = 0x2000;

/// Message type of a controller-to-host event buffer.
pub const MSG_HC_TO_STACK_HCI_EVT: u16 = 0x1000;

/// A header plus packet bytes, allocated by and returned to the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciBuffer {
    pub event: u16,
    pub len: u16,
    pub offset: u16,
    pub layer_specific: u16,
    data: Vec<u8>,
}

impl HciBuffer {
    /// A zeroed buffer of `size` total bytes, header included.
    ///
    /// Sizes smaller than the header produce a buffer with no data capacity.
    pub fn with_size(size: usize) -> Self {
        Self {
            event: 0,
            len: 0,
            offset: 0,
            layer_specific: 0,
            data: vec![0; size.saturating_sub(BT_HC_HDR_SIZE)],
        }
    }

    /// Wrap received event bytes.
    pub fn from_event(bytes: &[u8]) -> Self {
        Self {
            event: MSG_HC_TO_STACK_HCI_EVT,
            len: bytes.len() as u16,
            offset: 0,
            layer_specific: 0,
            data: bytes.to_vec(),
        }
    }

    /// Packet capacity, excluding the header.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The bytes currently in use (`offset..offset + len`, clamped to capacity).
    pub fn bytes(&self) -> &[u8] {
        let start = (self.offset as usize).min(self.data.len());
        let end = (start + self.len as usize).min(self.data.len());
        &self.data[start..end]
    }

    /// Frame an HCI command into this buffer, resetting the header.
    pub fn write_command(&mut self, opcode: Opcode, params: &[u8]) -> Result<(), BufferError> {
        let needed = HCI_CMD_PREAMBLE_SIZE + params.len();
        if needed > HCI_CMD_MAX_LEN {
            return Err(BufferError::ParamsTooLong(params.len()));
        }
        if needed > self.data.len() {
            return Err(BufferError::TooSmall {
                needed,
                capacity: self.data.len(),
            });
        }

        LittleEndian::write_u16(&mut self.data[0..2], opcode.0);
        self.data[2] = params.len() as u8;
        self.data[HCI_CMD_PREAMBLE_SIZE..needed].copy_from_slice(params);

        self.event = MSG_STACK_TO_HC_HCI_CMD;
        self.offset = 0;
        self.layer_specific = 0;
        self.len = needed as u16;
        Ok(())
    }

    /// Opcode of a framed command, if the buffer holds one.
    pub fn command_opcode(&self) -> Option<Opcode> {
        let bytes = self.bytes();
        if bytes.len() < HCI_CMD_PREAMBLE_SIZE {
            return None;
        }
        Some(Opcode(LittleEndian::read_u16(bytes)))
    }

    /// Parameters of a framed command.
    pub fn command_params(&self) -> &[u8] {
        let bytes = self.bytes();
        if bytes.len() < HCI_CMD_PREAMBLE_SIZE {
            return &[];
        }
        let end = (HCI_CMD_PREAMBLE_SIZE + bytes[2] as usize).min(bytes.len());
        &bytes[HCI_CMD_PREAMBLE_SIZE..end]
    }
}

/// Total allocation size (header included) for a command with `param_len` parameter bytes.
pub const fn command_alloc_size(param_len: usize) -> usize {
    BT_HC_HDR_SIZE + HCI_CMD_PREAMBLE_SIZE + param_len
}

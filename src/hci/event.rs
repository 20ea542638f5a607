//! Completion events delivered by the command channel.
//!
//! # Layout
//!
//! ```text
//! Command Complete (0x0E)            Command Status (0x0F)
//! [0]   : event code                 [0]   : event code
//! [1]   : parameter length           [1]   : parameter length
//! [2]   : num HCI command packets    [2]   : status
//! [3-4] : opcode (little-endian)     [3]   : num HCI command packets
//! [5]   : status                     [4-5] : opcode (little-endian)
//! [6..] : return parameters
//! ```

use crate::hci::Opcode;
use byteorder::{ByteOrder, LittleEndian};

pub const HCI_EVT_CMD_CMPL_EVT_CODE: u8 = 0x0E;
pub const HCI_EVT_CMD_STAT_EVT_CODE: u8 = 0x0F;

pub const HCI_EVT_CMD_CMPL_STATUS_RET_BYTE: usize = 5;
pub const HCI_EVT_CMD_STAT_STATUS_RET_BYTE: usize = 2;
pub const HCI_EVT_CMD_CMPL_OPCODE: usize = 3;
pub const HCI_EVT_CMD_STAT_OPCODE: usize = 4;
pub const HCI_EVT_CMD_CMPL_RETURN_PARAMS: usize = 6;

/// Borrowed view over the bytes of a completion event.
#[derive(Clone, Copy, Debug)]
pub struct CompletionEvent<'a>(pub &'a [u8]);

impl<'a> CompletionEvent<'a> {
    pub fn code(&self) -> Option<u8> {
        self.0.first().copied()
    }

    /// The command status byte.
    ///
    /// `None` when the event is neither Command Complete nor Command Status, or
    /// is too short to carry a status. Callers treat `None` as a failure.
    pub fn status(&self) -> Option<u8> {
        match self.code()? {
            HCI_EVT_CMD_CMPL_EVT_CODE => self.0.get(HCI_EVT_CMD_CMPL_STATUS_RET_BYTE).copied(),
            HCI_EVT_CMD_STAT_EVT_CODE => self.0.get(HCI_EVT_CMD_STAT_STATUS_RET_BYTE).copied(),
            _ => None,
        }
    }

    /// True only for a present, zero status byte.
    pub fn succeeded(&self) -> bool {
        self.status() == Some(0)
    }

    /// Opcode of the command this event completes.
    pub fn opcode(&self) -> Option<Opcode> {
        let at = match self.code()? {
            HCI_EVT_CMD_CMPL_EVT_CODE => HCI_EVT_CMD_CMPL_OPCODE,
            HCI_EVT_CMD_STAT_EVT_CODE => HCI_EVT_CMD_STAT_OPCODE,
            _ => return None,
        };
        self.0
            .get(at..at + 2)
            .map(|b| Opcode(LittleEndian::read_u16(b)))
    }

    /// Return parameters following the status byte of a Command Complete event.
    pub fn return_params(&self) -> &'a [u8] {
        if self.code() != Some(HCI_EVT_CMD_CMPL_EVT_CODE) {
            return &[];
        }
        self.0.get(HCI_EVT_CMD_CMPL_RETURN_PARAMS..).unwrap_or(&[])
    }
}

/// Build the bytes of a Command Complete event.
pub fn command_complete(opcode: Opcode, status: u8, return_params: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HCI_EVT_CMD_CMPL_RETURN_PARAMS + return_params.len());
    bytes.push(HCI_EVT_CMD_CMPL_EVT_CODE);
    bytes.push((4 + return_params.len()).min(u8::MAX as usize) as u8);
    bytes.push(1);
    bytes.extend_from_slice(&opcode.0.to_le_bytes());
    bytes.push(status);
    bytes.extend_from_slice(return_params);
    bytes
}

/// Build the bytes of a Command Status event.
pub fn command_status(opcode: Opcode, status: u8) -> Vec<u8> {
    let mut bytes = vec![HCI_EVT_CMD_STAT_EVT_CODE, 4, status, 1];
    bytes.extend_from_slice(&opcode.0.to_le_bytes());
    bytes
}

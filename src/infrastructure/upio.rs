//! UPIO - controller wake/sleep lines
//!
//! Pin toggling is platform specific; the engine only needs to name the line
//! and the action.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpioPin {
    /// Host-side LPM mode indication.
    LpmMode,
    /// BT_WAKE line into the controller.
    BtWake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpioAction {
    Assert,
    Deassert,
}

impl UpioAction {
    pub fn from_assert(assert: bool) -> Self {
        if assert {
            UpioAction::Assert
        } else {
            UpioAction::Deassert
        }
    }
}

pub trait Upio {
    /// Drive `pin`. `polarity` is 0 for active low, 1 for active high.
    fn set(&mut self, pin: UpioPin, action: UpioAction, polarity: u8);
}

/// Upio for hosts without wake lines. Only logs.
#[derive(Debug, Default)]
pub struct LoggingUpio;

impl Upio for LoggingUpio {
    fn set(&mut self, pin: UpioPin, action: UpioAction, polarity: u8) {
        debug!(?pin, ?action, polarity, "upio_set");
    }
}

/// Upio that remembers every call, for inspection.
#[derive(Debug, Default)]
pub struct RecordingUpio {
    pub calls: Vec<(UpioPin, UpioAction, u8)>,
}

impl Upio for RecordingUpio {
    fn set(&mut self, pin: UpioPin, action: UpioAction, polarity: u8) {
        self.calls.push((pin, action, polarity));
    }
}

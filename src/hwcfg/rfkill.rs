//! Software RF kill
//!
//! Fire-and-log: the completion status is only logged.

use crate::domain::models::CompletionTarget;
use crate::error::TransmitError;
use crate::hci::opcode::HCI_INTEL_SW_RF_KILL;
use crate::hci::{CompletionEvent, HciBuffer};
use crate::infrastructure::channel::{send_command, CommandChannel, CompletionHandler};
use tracing::info;

#[derive(Debug, Default)]
pub struct RfKill {
    last_status: Option<u8>,
}

impl RfKill {
    pub fn send(&mut self, channel: &mut dyn CommandChannel) -> Result<(), TransmitError> {
        info!("HW_CFG_INTEL_SW_RF_KILL");
        send_command(channel, HCI_INTEL_SW_RF_KILL, &[], CompletionTarget::RfKill)
    }

    /// Status byte of the last completed RF kill, if any.
    pub fn last_status(&self) -> Option<u8> {
        self.last_status
    }
}

impl CompletionHandler for RfKill {
    fn on_complete(&mut self, channel: &mut dyn CommandChannel, event: HciBuffer) {
        let status = CompletionEvent(event.bytes()).status();
        channel.free(event);
        info!("SW RF kill status = {:?}", status);
        self.last_status = status;
    }
}

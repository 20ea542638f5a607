//! SCO audio routing
//!
//! PCM routing takes two commands (interface parameters, then data format);
//! I2S/PCM routing takes one. Both report a single
//! [`VendorEvent::ScoConfigured`].

use crate::domain::models::{CompletionTarget, HciTransport, OpResult, VendorEvent};
use crate::hci::opcode::{
    HCI_VSC_WRITE_I2SPCM_INTERFACE_PARAM, HCI_VSC_WRITE_PCM_DATA_FORMAT_PARAM,
    HCI_VSC_WRITE_SCO_PCM_INT_PARAM,
};
use crate::hci::{CompletionEvent, HciBuffer, Opcode};
use crate::infrastructure::channel::{send_command, CommandChannel, CompletionHandler};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Routing, clock rate, frame type, sync mode, clock mode.
pub const SCO_PCM_PARAMS: [u8; 5] = [0, 4, 0, 0, 0];

/// Shift mode, fill bits, fill method, fill number, justify mode.
pub const PCM_DATA_FORMAT_PARAMS: [u8; 5] = [0, 0, 3, 3, 0];

/// Mode, role, sample rate, clock rate.
pub const SCO_I2SPCM_PARAMS: [u8; 4] = [1, 1, 0, 1];

/// Audio interface the controller routes SCO over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoInterface {
    Pcm,
    I2sPcm,
}

impl ScoInterface {
    /// The interface selected for this build.
    #[cfg(not(feature = "sco-i2s"))]
    pub const BUILD: ScoInterface = ScoInterface::Pcm;
    #[cfg(feature = "sco-i2s")]
    pub const BUILD: ScoInterface = ScoInterface::I2sPcm;

    fn first_command(&self) -> (Opcode, &'static [u8]) {
        match self {
            ScoInterface::Pcm => (HCI_VSC_WRITE_SCO_PCM_INT_PARAM, &SCO_PCM_PARAMS),
            ScoInterface::I2sPcm => (HCI_VSC_WRITE_I2SPCM_INTERFACE_PARAM, &SCO_I2SPCM_PARAMS),
        }
    }
}

pub struct ScoConfigurator {
    interface: ScoInterface,
    transport: HciTransport,
    event_sender: mpsc::UnboundedSender<VendorEvent>,
}

impl ScoConfigurator {
    pub fn new(
        interface: ScoInterface,
        transport: HciTransport,
        event_sender: mpsc::UnboundedSender<VendorEvent>,
    ) -> Self {
        Self {
            interface,
            transport,
            event_sender,
        }
    }

    /// Send the routing parameters for the configured interface.
    pub fn configure(&mut self, channel: &mut dyn CommandChannel) {
        if self.transport == HciTransport::Usb {
            // USB controllers carry SCO over the isochronous endpoint
            self.report(OpResult::Success);
            return;
        }

        let (opcode, params) = self.interface.first_command();
        info!("SCO {:?} configure {:?}", self.interface, params);
        if let Err(e) = send_command(channel, opcode, params, CompletionTarget::Sco) {
            error!("vendor lib scocfg aborted: {}", e);
            self.report(OpResult::Fail);
        }
    }

    fn report(&self, result: OpResult) {
        if self.event_sender.send(VendorEvent::ScoConfigured(result)).is_err() {
            warn!("SCO result {:?} has no listener", result);
        }
    }
}

impl CompletionHandler for ScoConfigurator {
    fn on_complete(&mut self, channel: &mut dyn CommandChannel, event: HciBuffer) {
        let (ok, opcode) = {
            let view = CompletionEvent(event.bytes());
            (view.succeeded(), view.opcode())
        };
        channel.free(event);

        if !ok {
            error!("SCO command {:?} failed", opcode);
            self.report(OpResult::Fail);
            return;
        }

        if self.interface == ScoInterface::Pcm && opcode == Some(HCI_VSC_WRITE_SCO_PCM_INT_PARAM) {
            match send_command(
                channel,
                HCI_VSC_WRITE_PCM_DATA_FORMAT_PARAM,
                &PCM_DATA_FORMAT_PARAMS,
                CompletionTarget::Sco,
            ) {
                Ok(()) => return,
                Err(e) => {
                    error!("vendor lib scocfg aborted: {}", e);
                    self.report(OpResult::Fail);
                    return;
                }
            }
        }

        self.report(OpResult::Success);
    }
}

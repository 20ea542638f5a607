//! Vendor library facade
//!
//! Owns the command channel, the wake lines, and one instance of each
//! sub-machine. Every command carries the [`CompletionTarget`] of the machine
//! that issued it, and [`VendorLib::handle_completion`] routes the event back.

use crate::domain::models::{CompletionTarget, VendorEvent};
use crate::domain::settings::{PatchSettings, Settings};
use crate::error::TransmitError;
use crate::hci::HciBuffer;
use crate::hwcfg::firmware::{FirmwareConfig, HaltReason};
use crate::hwcfg::lpm::{idle_timeout_ms, LpmController, LpmParams};
use crate::hwcfg::rfkill::RfKill;
use crate::hwcfg::sco::{ScoConfigurator, ScoInterface};
use crate::hwcfg::settlement;
use crate::infrastructure::channel::{CommandChannel, CompletionHandler};
use crate::infrastructure::upio::Upio;
use crate::patch::PatchLocator;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

pub struct VendorLib<C: CommandChannel, U: Upio> {
    channel: C,
    upio: U,
    firmware: FirmwareConfig,
    lpm: LpmController,
    sco: ScoConfigurator,
    rf_kill: RfKill,
    patch_settings: PatchSettings,
}

impl<C: CommandChannel, U: Upio> VendorLib<C, U> {
    pub fn new(
        channel: C,
        upio: U,
        settings: &Settings,
        event_sender: mpsc::UnboundedSender<VendorEvent>,
    ) -> Self {
        Self::with_options(
            channel,
            upio,
            settings,
            LpmParams::DEFAULT,
            ScoInterface::BUILD,
            event_sender,
        )
    }

    /// Like [`new`](Self::new) with explicit sleep parameters and SCO interface.
    pub fn with_options(
        channel: C,
        upio: U,
        settings: &Settings,
        lpm_params: LpmParams,
        sco_interface: ScoInterface,
        event_sender: mpsc::UnboundedSender<VendorEvent>,
    ) -> Self {
        info!(
            "vendor lib init: patch dir {}, transport {:?}",
            settings.patch.patch_file_path, settings.transport
        );
        Self {
            channel,
            upio,
            firmware: FirmwareConfig::new(
                PatchLocator::from_settings(&settings.patch),
                event_sender.clone(),
            ),
            lpm: LpmController::new(lpm_params, event_sender.clone()),
            sco: ScoConfigurator::new(sco_interface, settings.transport, event_sender),
            rf_kill: RfKill::default(),
            patch_settings: settings.patch.clone(),
        }
    }

    /// Begin controller bring-up. The outcome arrives as
    /// [`VendorEvent::FirmwareConfigured`].
    pub fn start_firmware_config(&mut self) {
        self.firmware.start(&mut self.channel);
    }

    pub fn set_lpm(&mut self, enable: bool) -> Result<(), TransmitError> {
        self.lpm.set_lpm(&mut self.channel, &mut self.upio, enable)
    }

    /// Idle timeout in milliseconds for the chip found during bring-up.
    pub fn lpm_idle_timeout(&self) -> u32 {
        idle_timeout_ms(self.lpm.params(), self.firmware.chip_name())
    }

    pub fn set_wake_state(&mut self, assert: bool) {
        self.lpm.set_wake_state(&mut self.upio, assert);
    }

    pub fn configure_sco(&mut self) {
        self.sco.configure(&mut self.channel);
    }

    pub fn send_sw_rf_kill(&mut self) -> Result<(), TransmitError> {
        self.rf_kill.send(&mut self.channel)
    }

    /// How long to wait after a successful bring-up.
    pub fn settlement_delay(&self) -> Duration {
        settlement::settlement_delay(
            self.firmware.chip_name(),
            self.patch_settings.settlement_delay_ms,
        )
    }

    /// Deliver one completion event to the machine that issued the command.
    pub fn handle_completion(&mut self, target: CompletionTarget, event: HciBuffer) {
        let channel: &mut dyn CommandChannel = &mut self.channel;
        match target {
            CompletionTarget::FirmwareConfig => self.firmware.on_complete(channel, event),
            CompletionTarget::Lpm => self.lpm.on_complete(channel, event),
            CompletionTarget::Sco => self.sco.on_complete(channel, event),
            CompletionTarget::RfKill => self.rf_kill.on_complete(channel, event),
        }
    }

    /// Why the last bring-up stopped without an outcome, if it did.
    pub fn firmware_halt(&self) -> Option<HaltReason> {
        self.firmware.halt_reason()
    }

    pub fn firmware(&self) -> &FirmwareConfig {
        &self.firmware
    }

    pub fn rf_kill(&self) -> &RfKill {
        &self.rf_kill
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn upio(&self) -> &U {
        &self.upio
    }
}

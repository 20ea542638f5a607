//! Low power mode
//!
//! Enables or disables controller sleep with one write-sleep-mode command and
//! reports a single [`VendorEvent::LpmSet`] per request.

use crate::domain::models::{CompletionTarget, OpResult, VendorEvent};
use crate::error::TransmitError;
use crate::hci::opcode::HCI_VSC_WRITE_SLEEP_MODE;
use crate::hci::{CompletionEvent, HciBuffer};
use crate::infrastructure::channel::{send_command, CommandChannel, CompletionHandler};
use crate::infrastructure::upio::{Upio, UpioAction, UpioPin};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Size of the write-sleep-mode parameter block.
pub const LPM_CMD_PARAM_SIZE: usize = 12;

/// Idle timeout is this many host-stack idle thresholds.
pub const LPM_IDLE_TIMEOUT_MULTIPLE: u32 = 10;

/// Chip family whose idle threshold unit is 25 ms instead of 300 ms.
const SHORT_TICK_CHIP: &str = "BCM4325";

/// Sleep-mode parameters, copied byte for byte into the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpmParams {
    /// 0 disable, 1 UART, 9 H5.
    pub sleep_mode: u8,
    /// In 300 ms (or 25 ms) units.
    pub host_stack_idle_threshold: u8,
    pub host_controller_idle_threshold: u8,
    /// 0 active low, 1 active high.
    pub bt_wake_polarity: u8,
    pub host_wake_polarity: u8,
    pub allow_host_sleep_during_sco: u8,
    pub combine_sleep_mode_and_lpm: u8,
    pub enable_uart_txd_tri_state: u8,
    /// 12.5 ms units.
    pub sleep_guard_time: u8,
    /// 12.5 ms units.
    pub wakeup_guard_time: u8,
    pub txd_config: u8,
    pub pulsed_host_wake: u8,
}

impl LpmParams {
    pub const DEFAULT: LpmParams = LpmParams {
        sleep_mode: 1,
        host_stack_idle_threshold: 1,
        host_controller_idle_threshold: 1,
        bt_wake_polarity: 1,
        host_wake_polarity: 1,
        allow_host_sleep_during_sco: 1,
        combine_sleep_mode_and_lpm: 1,
        enable_uart_txd_tri_state: 0,
        sleep_guard_time: 0,
        wakeup_guard_time: 0,
        txd_config: 0,
        pulsed_host_wake: 0,
    };

    pub fn to_bytes(&self) -> [u8; LPM_CMD_PARAM_SIZE] {
        [
            self.sleep_mode,
            self.host_stack_idle_threshold,
            self.host_controller_idle_threshold,
            self.bt_wake_polarity,
            self.host_wake_polarity,
            self.allow_host_sleep_during_sco,
            self.combine_sleep_mode_and_lpm,
            self.enable_uart_txd_tri_state,
            self.sleep_guard_time,
            self.wakeup_guard_time,
            self.txd_config,
            self.pulsed_host_wake,
        ]
    }
}

impl Default for LpmParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Idle timeout in milliseconds for a chip.
pub fn idle_timeout_ms(params: &LpmParams, chip_name: &str) -> u32 {
    let ticks = params.host_stack_idle_threshold as u32 * LPM_IDLE_TIMEOUT_MULTIPLE;
    if chip_name.contains(SHORT_TICK_CHIP) {
        ticks * 25
    } else {
        ticks * 300
    }
}

pub struct LpmController {
    params: LpmParams,
    event_sender: mpsc::UnboundedSender<VendorEvent>,
}

impl LpmController {
    pub fn new(params: LpmParams, event_sender: mpsc::UnboundedSender<VendorEvent>) -> Self {
        Self {
            params,
            event_sender,
        }
    }

    pub fn params(&self) -> &LpmParams {
        &self.params
    }

    /// Enable or disable sleep mode.
    ///
    /// On `Err` the failure has already been reported; otherwise the outcome
    /// follows with the completion event.
    pub fn set_lpm(
        &mut self,
        channel: &mut dyn CommandChannel,
        upio: &mut dyn Upio,
        enable: bool,
    ) -> Result<(), TransmitError> {
        let params = if enable {
            self.params.to_bytes()
        } else {
            [0u8; LPM_CMD_PARAM_SIZE]
        };
        upio.set(UpioPin::LpmMode, UpioAction::from_assert(enable), 0);

        info!("LPM {}", if enable { "enable" } else { "disable" });
        send_command(channel, HCI_VSC_WRITE_SLEEP_MODE, &params, CompletionTarget::Lpm).map_err(
            |e| {
                error!("LPM request failed: {}", e);
                self.report(OpResult::Fail);
                e
            },
        )
    }

    /// Assert or deassert BT_WAKE with the configured polarity.
    pub fn set_wake_state(&self, upio: &mut dyn Upio, assert: bool) {
        upio.set(
            UpioPin::BtWake,
            UpioAction::from_assert(assert),
            self.params.bt_wake_polarity,
        );
    }

    fn report(&self, result: OpResult) {
        if self.event_sender.send(VendorEvent::LpmSet(result)).is_err() {
            warn!("LPM result {:?} has no listener", result);
        }
    }
}

impl CompletionHandler for LpmController {
    fn on_complete(&mut self, channel: &mut dyn CommandChannel, event: HciBuffer) {
        let ok = CompletionEvent(event.bytes()).succeeded();
        channel.free(event);
        self.report(OpResult::from_status(ok));
    }
}

//! Firmware configuration state machine
//!
//! Brings the controller up by streaming a patch file while it is in
//! manufacture mode. Every arrow below is one command and its completion
//! event, except `OpenPatchFile -> ManufactureOn`, which happens in the same
//! completion as the version read.
//!
//! ```text
//! start ──HCI_RESET──> ReadSwVersion ──RDSW_VERSION──> OpenPatchFile
//!                                                          │ (no patch / unreadable: halt)
//!                                                          ▼
//!                           MemWrite <──MANUFACTURE{1,0}── ManufactureOn
//!                           │  ▲
//!                 record    └──┘ (one command per patch record)
//!                           │ EOF
//!                           ▼
//!                  ManufactureOff ──MANUFACTURE{0,patch}──> next_state
//!                                                          │
//!        RecheckVersion ──RDSW_VERSION──> Success          │ (patch streamed)
//!        Success                                           │ (empty patch file)
//!        Fail                                              │ (read error)
//! ```
//!
//! A non-zero completion status in any state aborts the sequence. Each attempt
//! reports exactly one [`VendorEvent::FirmwareConfigured`], except when it
//! halts (see [`HaltReason`]).

use crate::domain::models::{CompletionTarget, OpResult, VendorEvent};
use crate::hci::opcode::{HCI_INTEL_MANUFACTURE, HCI_INTEL_RDSW_VERSION, HCI_RESET};
use crate::hci::{CompletionEvent, HciBuffer, Opcode};
use crate::infrastructure::channel::{send_command, CommandChannel, CompletionHandler};
use crate::patch::{PatchLocator, PatchReader};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Bytes of firmware version carried by the read-SW-version completion.
pub const VERSION_LEN: usize = 9;

/// Upper bound on the stored chip name.
pub const LOCAL_NAME_BUFFER_LEN: usize = 32;

const MANUFACTURE_ON: [u8; 2] = [0x01, 0x00];

/// Steps of the bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCfgState {
    /// No attempt in progress.
    Idle,
    /// Waiting for HCI_RESET to complete.
    ReadSwVersion,
    /// Waiting for the firmware version.
    OpenPatchFile,
    ManufactureOn,
    /// Streaming patch records.
    MemWrite,
    ManufactureOff,
    RecheckVersion,
    Success,
    Fail,
}

/// Second parameter of "manufacture mode off".
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchActivation {
    /// No patch was streamed; leave without reset.
    NotSent = 0x00,
    /// Reset and deactivate the streamed patch.
    Disabled = 0x01,
    /// Reset and activate the streamed patch.
    Enabled = 0x02,
}

/// Why an attempt stopped without reporting an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// No patch file matches the chip. The controller is presumed to need none.
    NoPatch,
    /// A patch file was selected but could not be opened. Nothing further
    /// happens; a caller waiting for the outcome needs its own timeout.
    PatchUnreadable,
}

/// Opens a located patch file for streaming.
pub type PatchOpener = fn(&Path) -> io::Result<Box<dyn BufRead + Send>>;

fn open_patch(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    Ok(Box::new(BufReader::new(File::open(path)?)))
}

enum Step {
    /// A command is in flight.
    Await,
    /// Enter this state now, without waiting for an event.
    Continue(HwCfgState),
    Finish(OpResult),
    Halt(HaltReason),
    Abort,
}

pub struct FirmwareConfig {
    state: HwCfgState,
    chip_name: String,
    patch: PatchActivation,
    next_state: HwCfgState,
    commands_sent: usize,
    patch_file: Option<PatchReader<Box<dyn BufRead + Send>>>,
    halt: Option<HaltReason>,
    locator: PatchLocator,
    opener: PatchOpener,
    event_sender: mpsc::UnboundedSender<VendorEvent>,
}

impl FirmwareConfig {
    pub fn new(locator: PatchLocator, event_sender: mpsc::UnboundedSender<VendorEvent>) -> Self {
        Self {
            state: HwCfgState::Idle,
            chip_name: String::new(),
            patch: PatchActivation::NotSent,
            next_state: HwCfgState::Success,
            commands_sent: 0,
            patch_file: None,
            halt: None,
            locator,
            opener: open_patch,
            event_sender,
        }
    }

    /// Replace how located patch files are opened.
    pub fn with_opener(mut self, opener: PatchOpener) -> Self {
        self.opener = opener;
        self
    }

    pub fn state(&self) -> HwCfgState {
        self.state
    }

    /// Hex rendering of the version bytes read from the controller.
    pub fn chip_name(&self) -> &str {
        &self.chip_name
    }

    pub fn patch_activation(&self) -> PatchActivation {
        self.patch
    }

    /// Patch records transmitted during the current (or last) attempt.
    pub fn commands_sent(&self) -> usize {
        self.commands_sent
    }

    /// Set when the last attempt stopped without an outcome.
    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt
    }

    pub fn has_open_patch_file(&self) -> bool {
        self.patch_file.is_some()
    }

    /// Kick off a bring-up attempt by resetting the controller.
    ///
    /// A request made while an attempt is running is refused and reported as
    /// `Fail`; the running attempt carries on and reports its own outcome.
    pub fn start(&mut self, channel: &mut dyn CommandChannel) {
        if self.state != HwCfgState::Idle {
            warn!("Firmware configuration already running ({:?})", self.state);
            self.report(OpResult::Fail);
            return;
        }
        self.reset();

        // The first command after power-up may report zero free command slots;
        // HCI_RESET clears that before the real sequence begins.
        match send_command(channel, HCI_RESET, &[], CompletionTarget::FirmwareConfig) {
            Ok(()) => self.state = HwCfgState::ReadSwVersion,
            Err(e) => {
                error!("vendor lib fw conf aborted [{}]", e);
                self.abort();
            }
        }
    }

    fn reset(&mut self) {
        self.state = HwCfgState::Idle;
        self.chip_name.clear();
        self.patch = PatchActivation::NotSent;
        self.next_state = HwCfgState::Success;
        self.commands_sent = 0;
        self.patch_file = None;
        self.halt = None;
    }

    fn abort(&mut self) {
        error!("vendor lib fwcfg aborted!!!");
        self.patch_file = None;
        self.state = HwCfgState::Idle;
        self.report(OpResult::Fail);
    }

    fn report(&self, result: OpResult) {
        if self
            .event_sender
            .send(VendorEvent::FirmwareConfigured(result))
            .is_err()
        {
            warn!("Firmware configuration result {:?} has no listener", result);
        }
    }

    fn step(&mut self, channel: &mut dyn CommandChannel, version: &[u8; VERSION_LEN]) -> Step {
        match self.state {
            HwCfgState::Idle => Step::Await,
            HwCfgState::ReadSwVersion => {
                info!("HW_CFG_INTEL_RDSW_VERSION");
                self.issue(channel, HCI_INTEL_RDSW_VERSION, &[], HwCfgState::OpenPatchFile)
            }
            HwCfgState::OpenPatchFile => self.open_patch_file(version),
            HwCfgState::ManufactureOn => {
                info!("HW_CFG_INTEL_MANUFACTURE_ON");
                self.issue(channel, HCI_INTEL_MANUFACTURE, &MANUFACTURE_ON, HwCfgState::MemWrite)
            }
            HwCfgState::MemWrite => self.mem_write(channel),
            HwCfgState::ManufactureOff => {
                info!("HW_CFG_INTEL_MANUFACTURE_OFF");
                let params = [0x00, self.patch as u8];
                let next = self.next_state;
                self.issue(channel, HCI_INTEL_MANUFACTURE, &params, next)
            }
            HwCfgState::RecheckVersion => {
                info!("HW_CFG_INTEL_RDSW_VERSION_RECHECK");
                self.issue(channel, HCI_INTEL_RDSW_VERSION, &[], HwCfgState::Success)
            }
            HwCfgState::Success => {
                info!("FIRMWARE INIT SUCCESS...");
                if self.next_state == HwCfgState::RecheckVersion {
                    info!("HW/FW Version : {}", hex_string(version));
                }
                Step::Finish(OpResult::Success)
            }
            HwCfgState::Fail => {
                error!("vendor lib fw conf aborted");
                Step::Finish(OpResult::Fail)
            }
        }
    }

    fn issue(
        &mut self,
        channel: &mut dyn CommandChannel,
        opcode: Opcode,
        params: &[u8],
        next: HwCfgState,
    ) -> Step {
        match send_command(channel, opcode, params, CompletionTarget::FirmwareConfig) {
            Ok(()) => {
                self.state = next;
                Step::Await
            }
            Err(e) => {
                error!("Firmware configuration cannot send {}: {}", opcode, e);
                Step::Abort
            }
        }
    }

    fn open_patch_file(&mut self, version: &[u8; VERSION_LEN]) -> Step {
        self.chip_name = hex_string(version);
        self.chip_name.truncate(LOCAL_NAME_BUFFER_LEN);
        let candidate = format!("{}.seq", self.chip_name);
        info!("OPEN_PATCHFILE {}", candidate);

        let Some(path) = self.locator.locate(&candidate) else {
            info!("No patch for {}, controller left as is", self.chip_name);
            return Step::Halt(HaltReason::NoPatch);
        };

        match (self.opener)(&path) {
            Ok(file) => {
                self.patch_file = Some(PatchReader::new(file));
                Step::Continue(HwCfgState::ManufactureOn)
            }
            Err(e) => {
                error!("Can not open patch filename {}: {}", path.display(), e);
                Step::Halt(HaltReason::PatchUnreadable)
            }
        }
    }

    fn mem_write(&mut self, channel: &mut dyn CommandChannel) -> Step {
        let Some(reader) = self.patch_file.as_mut() else {
            error!("HW_CFG_INTEL_MEMWRITE without an open patch file");
            return Step::Abort;
        };

        match reader.next_command() {
            Ok(Some(cmd)) => {
                self.commands_sent += 1;
                debug!(
                    opcode = %cmd.opcode,
                    len = cmd.params.len(),
                    record = self.commands_sent,
                    "HW_CFG_INTEL_MEMWRITE"
                );
                self.issue(channel, cmd.opcode, &cmd.params, HwCfgState::MemWrite)
            }
            Ok(None) => {
                info!("End of file");
                self.patch_file = None;
                if self.commands_sent > 0 {
                    self.patch = PatchActivation::Enabled;
                    self.next_state = HwCfgState::RecheckVersion;
                } else {
                    // Still reported as success once manufacture mode is left
                    error!("Patch file is empty");
                }
                Step::Continue(HwCfgState::ManufactureOff)
            }
            Err(e) => {
                error!("Reading patch file failed: {}", e);
                self.patch_file = None;
                self.patch = PatchActivation::Disabled;
                self.next_state = HwCfgState::Fail;
                Step::Continue(HwCfgState::ManufactureOff)
            }
        }
    }
}

impl CompletionHandler for FirmwareConfig {
    fn on_complete(&mut self, channel: &mut dyn CommandChannel, event: HciBuffer) {
        let (status, opcode, version) = {
            let view = CompletionEvent(event.bytes());
            (view.status(), view.opcode(), version_bytes(&view))
        };
        channel.free(event);

        if self.state == HwCfgState::Idle {
            warn!("Ignoring completion of {:?} with no configuration in progress", opcode);
            return;
        }

        if status != Some(0) {
            error!(
                "FW Patch download aborted as command 0x{:04X} failed (status {:?})",
                opcode.map(|o| o.0).unwrap_or_default(),
                status
            );
            self.abort();
            return;
        }

        let mut step = self.step(channel, &version);
        loop {
            match step {
                Step::Await => return,
                Step::Continue(next) => {
                    self.state = next;
                    step = self.step(channel, &version);
                }
                Step::Finish(result) => {
                    self.state = HwCfgState::Idle;
                    self.report(result);
                    return;
                }
                Step::Halt(reason) => {
                    self.patch_file = None;
                    self.state = HwCfgState::Idle;
                    self.halt = Some(reason);
                    return;
                }
                Step::Abort => {
                    self.abort();
                    return;
                }
            }
        }
    }
}

/// Version bytes from a read-SW-version completion, zero-filled if short.
fn version_bytes(event: &CompletionEvent<'_>) -> [u8; VERSION_LEN] {
    let mut version = [0u8; VERSION_LEN];
    let params = event.return_params();
    let n = params.len().min(VERSION_LEN);
    version[..n].copy_from_slice(&params[..n]);
    version
}

/// Lowercase hex, two characters per byte.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{:02x}", b);
        s
    })
}

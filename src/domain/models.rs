use serde::{Deserialize, Serialize};

/// Terminal result of one vendor operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    Success,
    Fail,
}

impl OpResult {
    pub fn from_status(ok: bool) -> Self {
        if ok {
            OpResult::Success
        } else {
            OpResult::Fail
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OpResult::Success)
    }
}

/// Outcomes reported to the caller, one per operation invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorEvent {
    FirmwareConfigured(OpResult),
    LpmSet(OpResult),
    ScoConfigured(OpResult),
}

/// Which sub-machine a transmitted command's completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionTarget {
    FirmwareConfig,
    Lpm,
    Sco,
    RfKill,
}

/// Physical HCI transport to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HciTransport {
    #[default]
    Uart,
    Usb,
}

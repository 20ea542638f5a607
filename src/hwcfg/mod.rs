//! Hardware configuration
//!
//! Each sub-machine issues commands through the command channel and receives
//! their completions through [`CompletionHandler`](crate::infrastructure::channel::CompletionHandler).
//!
//! - [`firmware`] - reset, version read, patch download, version recheck
//! - [`lpm`] - sleep mode and wake line
//! - [`sco`] - audio routing
//! - [`rfkill`] - software RF kill
//! - [`settlement`] - post bring-up settle time

pub mod firmware;
pub mod lpm;
pub mod rfkill;
pub mod sco;
pub mod settlement;

pub use firmware::{FirmwareConfig, HaltReason, HwCfgState, PatchActivation};
pub use lpm::{LpmController, LpmParams};
pub use rfkill::RfKill;
pub use sco::{ScoConfigurator, ScoInterface};

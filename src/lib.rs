//! Bluetooth controller bring-up
//!
//! Resets the controller, reads its firmware version, streams the matching
//! `.seq` patch file in manufacture mode, and then handles low power mode,
//! SCO routing and RF kill. Everything runs off command completions delivered
//! through [`infrastructure::channel::CommandChannel`].

pub mod domain;
pub mod error;
pub mod hci;
pub mod hwcfg;
pub mod infrastructure;
pub mod patch;
pub mod vendor;

pub use domain::models::{CompletionTarget, OpResult, VendorEvent};
pub use vendor::VendorLib;

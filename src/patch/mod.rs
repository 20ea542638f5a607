//! Patch files
//!
//! - [`locator`] - choose the patch file for a chip
//! - [`record`] - classify and decode patch-file lines

pub mod locator;
pub mod record;

pub use locator::PatchLocator;
pub use record::{parse_line, PatchCommand, PatchReader, RecordKind};

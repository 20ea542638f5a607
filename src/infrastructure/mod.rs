//! Infrastructure
//!
//! - [`channel`] - command channel interface the state machines talk through
//! - [`loopback`] - in-process controller used for dry runs
//! - [`upio`] - wake-line interface
//! - [`conf`] - `bt_vendor.conf` parsing
//! - [`logging`] - tracing subscriber setup

pub mod channel;
pub mod conf;
pub mod logging;
pub mod loopback;
pub mod upio;

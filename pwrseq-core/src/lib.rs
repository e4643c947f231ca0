#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Simple MMC power sequencing shared by the firmware and the host emulator.
//
// The crate stays free of the Rust standard library; boards plug their clock,
// reset GPIOs, regulator and delay source in through the traits in `hal`.

pub mod attr;
pub mod config;
pub mod driver;
pub mod hal;
pub mod registry;
pub mod sequencer;
pub mod telemetry;

pub use driver::{BindError, Binding, PlatformDevice, ResourceError, bind};
pub use registry::{HostPwrseq, NodeId, PwrseqRegistry};
pub use sequencer::{PowerSequence, PwrseqResources, SharedPwrseq, SimplePwrseq};

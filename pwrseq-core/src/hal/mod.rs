//! Hardware capability traits consumed by the power sequencer.
//!
//! The sequencer never talks to a clock tree, GPIO controller, or regulator
//! framework directly. Boards hand it objects implementing the traits below,
//! which keeps the sequencing policy identical between the STM32 firmware,
//! the host emulator, and the mock hardware used by tests.

use core::convert::Infallible;
use core::fmt;
use core::time::Duration;

/// Supply voltage expressed in microvolts.
pub type Microvolts = i32;

/// Logical state requested for the reset line group.
///
/// Levels are logical: an active-low board wiring is resolved by the
/// [`DigitalOutputGroup`] implementation, not by the sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResetLevel {
    /// Logical 1, the device is held inactive.
    Asserted,
    /// Logical 0, the device is released from reset.
    Deasserted,
}

impl ResetLevel {
    /// Returns the logical line value for this level.
    #[must_use]
    pub const fn as_bool(self) -> bool {
        matches!(self, ResetLevel::Asserted)
    }

    /// Builds a level from a raw logical value.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value {
            ResetLevel::Asserted
        } else {
            ResetLevel::Deasserted
        }
    }
}

impl fmt::Display for ResetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetLevel::Asserted => f.write_str("asserted"),
            ResetLevel::Deasserted => f.write_str("deasserted"),
        }
    }
}

/// Gating clock that must run before the attached card is usable.
pub trait ClockControl {
    /// Failure reported by the clock provider.
    type Error: fmt::Debug;

    /// Prepares and enables the clock.
    fn prepare_enable(&mut self) -> Result<(), Self::Error>;

    /// Disables and unprepares the clock.
    fn disable_unprepare(&mut self);
}

/// Group of digital outputs written together in a single call.
pub trait DigitalOutputGroup {
    /// Failure reported by the GPIO provider.
    type Error: fmt::Debug;

    /// Number of lines in the group.
    fn line_count(&self) -> usize;

    /// Drives every line to the matching entry of `values`.
    ///
    /// `values` always holds exactly [`line_count`](Self::line_count) entries.
    fn set_array(&mut self, values: &[bool]) -> Result<(), Self::Error>;
}

/// Controllable reference voltage supply.
pub trait VoltageRegulator {
    /// Failure reported by the regulator framework.
    type Error: fmt::Debug;

    /// Reads the present output voltage.
    fn voltage(&self) -> Result<Microvolts, Self::Error>;

    /// Requests an output voltage inside `[min_uv, max_uv]`.
    fn set_voltage(&mut self, min_uv: Microvolts, max_uv: Microvolts) -> Result<(), Self::Error>;
}

/// Blocking delay provider.
///
/// Implementations must not return before `duration` has elapsed; the
/// controller issues commands to the card as soon as the call returns.
pub trait BlockingDelay {
    fn block_for(&mut self, duration: Duration);
}

impl<T: BlockingDelay + ?Sized> BlockingDelay for &mut T {
    fn block_for(&mut self, duration: Duration) {
        (**self).block_for(duration);
    }
}

/// Clock stand-in for boards that never route a gating clock.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopClock;

impl NoopClock {
    pub const fn new() -> Self {
        Self
    }
}

impl ClockControl for NoopClock {
    type Error = Infallible;

    fn prepare_enable(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn disable_unprepare(&mut self) {}
}

/// Output group stand-in for boards without reset lines.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopOutputGroup;

impl NoopOutputGroup {
    pub const fn new() -> Self {
        Self
    }
}

impl DigitalOutputGroup for NoopOutputGroup {
    type Error = Infallible;

    fn line_count(&self) -> usize {
        0
    }

    fn set_array(&mut self, _: &[bool]) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Regulator stand-in for boards without a controllable reference supply.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopRegulator;

impl NoopRegulator {
    pub const fn new() -> Self {
        Self
    }
}

impl VoltageRegulator for NoopRegulator {
    type Error = Infallible;

    fn voltage(&self) -> Result<Microvolts, Self::Error> {
        Ok(0)
    }

    fn set_voltage(&mut self, _: Microvolts, _: Microvolts) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Delay that returns immediately. Only suitable for dry runs.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDelay;

impl NoopDelay {
    pub const fn new() -> Self {
        Self
    }
}

impl BlockingDelay for NoopDelay {
    fn block_for(&mut self, _: Duration) {}
}

//! STM32G0 implementations of the sequencer's hardware traits.
//!
//! The card's reset inputs are active-low and pulled up on the card, so a
//! logically asserted line is driven low through an open-drain output and a
//! released line is left floating high. The card clock comes from an external
//! oscillator gated by a push-pull enable pin.

#![cfg(target_os = "none")]

use core::convert::Infallible;

use embassy_stm32::gpio::{Output, OutputOpenDrain};
use pwrseq_core::attr::Attribute;
use pwrseq_core::config::PropertySource;
use pwrseq_core::driver::{self, PlatformDevice, ResourceError};
use pwrseq_core::hal::{
    BlockingDelay, ClockControl, DigitalOutputGroup, NoopRegulator, ResetLevel,
};
use pwrseq_core::registry::NodeId;

use crate::board::{self, BoardProperties};

/// Reset lines routed to the card slot.
pub const RESET_LINE_COUNT: usize = 2;

/// Oscillator gated by an enable pin.
pub struct OscillatorEnable<'d> {
    enable: Output<'d>,
}

impl<'d> OscillatorEnable<'d> {
    pub fn new(enable: Output<'d>) -> Self {
        Self { enable }
    }
}

impl ClockControl for OscillatorEnable<'_> {
    type Error = Infallible;

    fn prepare_enable(&mut self) -> Result<(), Self::Error> {
        self.enable.set_high();
        Ok(())
    }

    fn disable_unprepare(&mut self) {
        self.enable.set_low();
    }
}

/// Reset lines written together.
pub struct OpenDrainResetLines<'d> {
    lines: [OutputOpenDrain<'d>; RESET_LINE_COUNT],
}

impl<'d> OpenDrainResetLines<'d> {
    pub fn new(lines: [OutputOpenDrain<'d>; RESET_LINE_COUNT]) -> Self {
        Self { lines }
    }

    fn drive_all(&mut self, level: ResetLevel) {
        for line in &mut self.lines {
            drive(line, level.as_bool());
        }
    }
}

fn drive(line: &mut OutputOpenDrain<'_>, asserted: bool) {
    if asserted {
        line.set_low();
    } else {
        line.set_high();
    }
}

impl DigitalOutputGroup for OpenDrainResetLines<'_> {
    type Error = Infallible;

    fn line_count(&self) -> usize {
        RESET_LINE_COUNT
    }

    fn set_array(&mut self, values: &[bool]) -> Result<(), Self::Error> {
        for (line, &asserted) in self.lines.iter_mut().zip(values) {
            drive(line, asserted);
        }
        Ok(())
    }
}

/// Busy-waits on the Embassy time driver.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyDelay;

impl BlockingDelay for EmbassyDelay {
    fn block_for(&mut self, duration: core::time::Duration) {
        embassy_time::block_for(board::to_embassy(duration));
    }
}

/// Card slot node handing its pins to the sequencer at bind time.
pub struct CardSlot<'d> {
    oscillator: Option<OscillatorEnable<'d>>,
    reset_lines: Option<OpenDrainResetLines<'d>>,
}

impl<'d> CardSlot<'d> {
    pub fn new(oscillator: OscillatorEnable<'d>, reset_lines: OpenDrainResetLines<'d>) -> Self {
        Self {
            oscillator: Some(oscillator),
            reset_lines: Some(reset_lines),
        }
    }
}

impl PropertySource for CardSlot<'_> {
    fn property_u32(&self, name: &str) -> Option<u32> {
        BoardProperties.property_u32(name)
    }
}

impl<'d> PlatformDevice for CardSlot<'d> {
    type Clock = OscillatorEnable<'d>;
    type ResetLines = OpenDrainResetLines<'d>;
    type Regulator = NoopRegulator;

    fn node(&self) -> NodeId {
        board::CARD_NODE
    }

    fn compatible(&self) -> &str {
        driver::COMPATIBLE
    }

    fn clock(&mut self, _name: &str) -> Result<Self::Clock, ResourceError> {
        self.oscillator.take().ok_or(ResourceError::NotFound)
    }

    fn gpio_array(
        &mut self,
        _name: &str,
        initial: ResetLevel,
    ) -> Result<Self::ResetLines, ResourceError> {
        let mut lines = self.reset_lines.take().ok_or(ResourceError::NotFound)?;
        lines.drive_all(initial);
        Ok(lines)
    }

    fn regulator_optional(&mut self, _name: &str) -> Result<Self::Regulator, ResourceError> {
        Err(ResourceError::NotFound)
    }

    // No operator surface on this board.
    fn create_attribute(&mut self, _attribute: Attribute) -> Result<(), ResourceError> {
        Err(ResourceError::Unsupported)
    }

    fn remove_attribute(&mut self, _attribute: Attribute) {}
}

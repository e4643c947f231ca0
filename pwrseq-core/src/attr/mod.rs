//! Manual override attributes exposed on the sequencer's device node.
//!
//! `pwr_gpio` reports and drives the power state by hand; `vref_uV` reads and
//! programs the reference regulator. Writes never fail: input that does not
//! parse is dropped and the whole write is still reported as consumed.

use core::fmt;

use crate::hal::{BlockingDelay, ClockControl, DigitalOutputGroup, VoltageRegulator};
use crate::sequencer::SimplePwrseq;

pub mod grammar;

pub use grammar::{PowerRequest, VoltageRequest, parse_power_request, parse_voltage_request};

/// Permission bits for a read/write attribute owned by root.
pub const ATTRIBUTE_MODE_RW: u16 = 0o644;

/// Override attributes installed by the sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Attribute {
    /// `pwr_gpio`: `on`/`off` power toggle.
    PowerToggle,
    /// `vref_uV`: reference regulator voltage in microvolts.
    ReferenceVoltage,
}

impl Attribute {
    pub const ALL: [Attribute; 2] = [Attribute::PowerToggle, Attribute::ReferenceVoltage];

    /// File name under the device node.
    pub const fn name(self) -> &'static str {
        match self {
            Attribute::PowerToggle => "pwr_gpio",
            Attribute::ReferenceVoltage => "vref_uV",
        }
    }

    pub const fn mode(self) -> u16 {
        ATTRIBUTE_MODE_RW
    }

    /// Looks an attribute up by file name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|attribute| attribute.name() == name)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure while rendering an attribute.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AttributeError {
    /// The output buffer rejected the text.
    Format,
    /// The regulator could not report its voltage.
    Regulator,
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeError::Format => f.write_str("attribute output overflow"),
            AttributeError::Regulator => f.write_str("regulator voltage unavailable"),
        }
    }
}

impl From<fmt::Error> for AttributeError {
    fn from(_: fmt::Error) -> Self {
        AttributeError::Format
    }
}

/// Renders `attribute` for a read, newline-terminated.
pub fn show<C, G, V, D, W>(
    seq: &SimplePwrseq<C, G, V, D>,
    attribute: Attribute,
    out: &mut W,
) -> Result<(), AttributeError>
where
    C: ClockControl,
    G: DigitalOutputGroup,
    V: VoltageRegulator,
    D: BlockingDelay,
    W: fmt::Write,
{
    match attribute {
        Attribute::PowerToggle => {
            let state = if seq.clock_enabled() { "on" } else { "off" };
            writeln!(out, "{state}")?;
        }
        Attribute::ReferenceVoltage => match seq.regulator_voltage() {
            None => writeln!(out, "na")?,
            Some(Ok(uv)) => writeln!(out, "{uv}")?,
            Some(Err(err)) => {
                log::warn!("pwrseq: vref read failed: {err:?}");
                return Err(AttributeError::Regulator);
            }
        },
    }
    Ok(())
}

/// Applies an operator write and returns the number of bytes consumed.
pub fn store<C, G, V, D>(
    seq: &mut SimplePwrseq<C, G, V, D>,
    attribute: Attribute,
    input: &str,
) -> usize
where
    C: ClockControl,
    G: DigitalOutputGroup,
    V: VoltageRegulator,
    D: BlockingDelay,
{
    match attribute {
        Attribute::PowerToggle => match parse_power_request(input) {
            Some(PowerRequest::On) => seq.manual_power(true),
            Some(PowerRequest::Off) => seq.manual_power(false),
            None => log::debug!("pwrseq: ignoring {attribute} write {input:?}"),
        },
        Attribute::ReferenceVoltage => {
            if !seq.has_regulator() {
                return input.len();
            }
            match parse_voltage_request(input) {
                Some(request) => {
                    let (min, max) = request.bounds();
                    seq.set_regulator_voltage(min, max);
                }
                None => log::debug!("pwrseq: ignoring {attribute} write {input:?}"),
            }
        }
    }
    input.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_names_match_device_files() {
        assert_eq!(Attribute::PowerToggle.name(), "pwr_gpio");
        assert_eq!(Attribute::ReferenceVoltage.name(), "vref_uV");
        assert_eq!(
            Attribute::from_name("vref_uV"),
            Some(Attribute::ReferenceVoltage)
        );
        assert_eq!(Attribute::from_name("vref_uv"), None);
    }
}

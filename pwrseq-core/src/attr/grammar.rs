//! Parsers for operator writes to the override attributes.
//!
//! Both attributes accept short text values. Matching follows attribute-file
//! conventions: tokens are case-sensitive and a single trailing newline (as
//! left by `echo`) is tolerated.

use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{alt, eof, opt, preceded, terminated};
use winnow::prelude::*;
use winnow::token::one_of;

use crate::hal::Microvolts;

/// Decoded `pwr_gpio` write.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerRequest {
    On,
    Off,
}

/// Decoded `vref_uV` write.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VoltageRequest {
    /// One value used as both bounds.
    Exact(Microvolts),
    /// Explicit minimum and maximum.
    Range { min: Microvolts, max: Microvolts },
}

impl VoltageRequest {
    /// Returns the `(min, max)` window handed to the regulator.
    pub const fn bounds(self) -> (Microvolts, Microvolts) {
        match self {
            VoltageRequest::Exact(uv) => (uv, uv),
            VoltageRequest::Range { min, max } => (min, max),
        }
    }
}

/// Parses `on`, `1`, `off` or `0`.
pub fn parse_power_request(input: &str) -> Option<PowerRequest> {
    let mut input = input;
    power_request.parse_next(&mut input).ok()
}

/// Parses a single voltage or a `min max` pair.
///
/// A lone value must fill the whole write. For a pair, text after the second
/// value is ignored.
pub fn parse_voltage_request(input: &str) -> Option<VoltageRequest> {
    let mut single = input;
    if let Ok(uv) = exact_voltage.parse_next(&mut single) {
        return Some(VoltageRequest::Exact(uv));
    }

    let mut pair = input;
    voltage_pair
        .parse_next(&mut pair)
        .ok()
        .map(|(min, max)| VoltageRequest::Range { min, max })
}

fn power_request(input: &mut &str) -> ModalResult<PowerRequest> {
    terminated(
        alt((
            alt(("on", "1")).value(PowerRequest::On),
            alt(("off", "0")).value(PowerRequest::Off),
        )),
        end_of_write,
    )
    .parse_next(input)
}

fn exact_voltage(input: &mut &str) -> ModalResult<Microvolts> {
    terminated(microvolts, end_of_write).parse_next(input)
}

fn voltage_pair(input: &mut &str) -> ModalResult<(Microvolts, Microvolts)> {
    (
        preceded(multispace0, microvolts),
        preceded(multispace0, microvolts),
    )
        .parse_next(input)
}

fn microvolts(input: &mut &str) -> ModalResult<Microvolts> {
    (opt(one_of(['+', '-'])), digit1)
        .take()
        .verify_map(|text: &str| text.parse::<Microvolts>().ok())
        .parse_next(input)
}

fn end_of_write(input: &mut &str) -> ModalResult<()> {
    (opt('\n'), eof).void().parse_next(input)
}

//! Simulated board hosting one `mmc-pwrseq-simple` node.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use pwrseq_core::attr::Attribute;
use pwrseq_core::config::{POST_POWER_ON_DELAY_MS, POWER_OFF_DELAY_US, PropertySource};
use pwrseq_core::driver::{self, PlatformDevice, ResourceError};
use pwrseq_core::hal::{
    BlockingDelay, ClockControl, DigitalOutputGroup, Microvolts, ResetLevel, VoltageRegulator,
};
use pwrseq_core::registry::NodeId;

pub const EMULATED_NODE: NodeId = NodeId(0);

/// Output range accepted by the simulated reference regulator.
pub const VREF_MIN_UV: Microvolts = 1_200_000;
pub const VREF_MAX_UV: Microvolts = 3_600_000;
const VREF_BOOT_UV: Microvolts = 3_300_000;

/// What the simulated node describes, taken from the command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BoardOptions {
    pub post_power_on_delay_ms: u32,
    pub power_off_delay_us: u32,
    pub reset_lines: usize,
    pub clock: bool,
    pub regulator: bool,
    pub seed: Option<u64>,
}

impl Default for BoardOptions {
    fn default() -> Self {
        Self {
            post_power_on_delay_ms: 0,
            power_off_delay_us: 0,
            reset_lines: 1,
            clock: true,
            regulator: true,
            seed: None,
        }
    }
}

impl BoardOptions {
    pub const USAGE: &'static str = "Usage: pwrseq-emulator [--post-power-on-delay-ms=N] \
         [--power-off-delay-us=N] [--reset-lines=N] [--no-clock] [--no-reset] \
         [--no-regulator] [--seed=N]";

    pub fn from_args<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        for arg in args {
            let (flag, value) = match arg.split_once('=') {
                Some((flag, value)) => (flag, Some(value)),
                None => (arg.as_str(), None),
            };
            match (flag, value) {
                ("--post-power-on-delay-ms", Some(value)) => {
                    options.post_power_on_delay_ms = parse_flag(flag, value)?;
                }
                ("--power-off-delay-us", Some(value)) => {
                    options.power_off_delay_us = parse_flag(flag, value)?;
                }
                ("--reset-lines", Some(value)) => {
                    options.reset_lines = parse_flag(flag, value)?;
                }
                ("--seed", Some(value)) => options.seed = Some(parse_flag(flag, value)?),
                ("--no-clock", None) => options.clock = false,
                ("--no-reset", None) => options.reset_lines = 0,
                ("--no-regulator", None) => options.regulator = false,
                _ => return Err(format!("Unknown argument `{arg}`")),
            }
        }
        Ok(options)
    }
}

fn parse_flag<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value `{value}` for {flag}"))
}

/// Externally observable state of the simulated hardware.
#[derive(Debug, Default)]
pub struct BoardState {
    pub clock_running: bool,
    pub reset_lines: Vec<bool>,
    pub vref_uv: Option<Microvolts>,
    pub attributes: Vec<Attribute>,
}

pub type SharedState = Rc<RefCell<BoardState>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimError {
    OutOfRange,
}

pub struct SimClock {
    state: SharedState,
}

impl ClockControl for SimClock {
    type Error = SimError;

    fn prepare_enable(&mut self) -> Result<(), Self::Error> {
        self.state.borrow_mut().clock_running = true;
        Ok(())
    }

    fn disable_unprepare(&mut self) {
        self.state.borrow_mut().clock_running = false;
    }
}

pub struct SimResetLines {
    state: SharedState,
    count: usize,
}

impl DigitalOutputGroup for SimResetLines {
    type Error = SimError;

    fn line_count(&self) -> usize {
        self.count
    }

    fn set_array(&mut self, values: &[bool]) -> Result<(), Self::Error> {
        self.state.borrow_mut().reset_lines = values.to_vec();
        Ok(())
    }
}

pub struct SimRegulator {
    state: SharedState,
}

impl VoltageRegulator for SimRegulator {
    type Error = SimError;

    fn voltage(&self) -> Result<Microvolts, Self::Error> {
        Ok(self.state.borrow().vref_uv.unwrap_or(0))
    }

    fn set_voltage(&mut self, min_uv: Microvolts, max_uv: Microvolts) -> Result<(), Self::Error> {
        let target = min_uv.max(VREF_MIN_UV);
        if min_uv > max_uv || target > max_uv || target > VREF_MAX_UV {
            return Err(SimError::OutOfRange);
        }
        self.state.borrow_mut().vref_uv = Some(target);
        Ok(())
    }
}

/// Delay backed by the host scheduler.
#[derive(Copy, Clone, Debug, Default)]
pub struct HostDelay;

impl BlockingDelay for HostDelay {
    fn block_for(&mut self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Device node as described by the command line.
pub struct SimBoard {
    options: BoardOptions,
    state: SharedState,
}

impl SimBoard {
    pub fn new(options: BoardOptions) -> Self {
        Self {
            options,
            state: SharedState::default(),
        }
    }

    pub fn state(&self) -> SharedState {
        Rc::clone(&self.state)
    }
}

impl PropertySource for SimBoard {
    fn property_u32(&self, name: &str) -> Option<u32> {
        match name {
            POST_POWER_ON_DELAY_MS => Some(self.options.post_power_on_delay_ms),
            POWER_OFF_DELAY_US => Some(self.options.power_off_delay_us),
            _ => None,
        }
    }
}

impl PlatformDevice for SimBoard {
    type Clock = SimClock;
    type ResetLines = SimResetLines;
    type Regulator = SimRegulator;

    fn node(&self) -> NodeId {
        EMULATED_NODE
    }

    fn compatible(&self) -> &str {
        driver::COMPATIBLE
    }

    fn clock(&mut self, _name: &str) -> Result<Self::Clock, ResourceError> {
        if !self.options.clock {
            return Err(ResourceError::NotFound);
        }
        Ok(SimClock {
            state: self.state(),
        })
    }

    fn gpio_array(
        &mut self,
        _name: &str,
        initial: ResetLevel,
    ) -> Result<Self::ResetLines, ResourceError> {
        let count = self.options.reset_lines;
        if count == 0 {
            return Err(ResourceError::NotFound);
        }
        self.state.borrow_mut().reset_lines = vec![initial.as_bool(); count];
        Ok(SimResetLines {
            state: self.state(),
            count,
        })
    }

    fn regulator_optional(&mut self, _name: &str) -> Result<Self::Regulator, ResourceError> {
        if !self.options.regulator {
            return Err(ResourceError::NotFound);
        }
        self.state.borrow_mut().vref_uv = Some(VREF_BOOT_UV);
        Ok(SimRegulator {
            state: self.state(),
        })
    }

    fn create_attribute(&mut self, attribute: Attribute) -> Result<(), ResourceError> {
        self.state.borrow_mut().attributes.push(attribute);
        Ok(())
    }

    fn remove_attribute(&mut self, attribute: Attribute) {
        self.state
            .borrow_mut()
            .attributes
            .retain(|present| *present != attribute);
    }

    fn jitter_seed(&self) -> Option<u64> {
        self.options.seed
    }
}

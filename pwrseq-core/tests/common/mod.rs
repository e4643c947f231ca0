#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use pwrseq_core::attr::Attribute;
use pwrseq_core::config::PropertySource;
use pwrseq_core::driver::{self, BindError, Binding, BoundPwrseq, PlatformDevice, ResourceError};
use pwrseq_core::hal::{
    BlockingDelay, ClockControl, DigitalOutputGroup, Microvolts, ResetLevel, VoltageRegulator,
};
use pwrseq_core::registry::{NodeId, PwrseqRegistry};

/// Hardware interaction observed by the mocks, in call order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HwCall {
    Acquire(String),
    Publish(Attribute),
    Withdraw(Attribute),
    ClockEnable,
    ClockDisable,
    SetLines(Vec<bool>),
    Delay(Duration),
    SetVoltage(Microvolts, Microvolts),
}

#[derive(Clone, Default)]
pub struct Trace(Rc<RefCell<Vec<HwCall>>>);

impl Trace {
    pub fn push(&self, call: HwCall) {
        self.0.borrow_mut().push(call);
    }

    /// Returns and forgets everything recorded so far.
    pub fn take(&self) -> Vec<HwCall> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn snapshot(&self) -> Vec<HwCall> {
        self.0.borrow().clone()
    }
}

pub struct MockClock {
    trace: Trace,
    fail: bool,
}

impl ClockControl for MockClock {
    type Error = &'static str;

    fn prepare_enable(&mut self) -> Result<(), Self::Error> {
        self.trace.push(HwCall::ClockEnable);
        if self.fail {
            Err("clock provider refused")
        } else {
            Ok(())
        }
    }

    fn disable_unprepare(&mut self) {
        self.trace.push(HwCall::ClockDisable);
    }
}

pub struct MockLines {
    trace: Trace,
    count: usize,
    fail: bool,
}

impl DigitalOutputGroup for MockLines {
    type Error = &'static str;

    fn line_count(&self) -> usize {
        self.count
    }

    fn set_array(&mut self, values: &[bool]) -> Result<(), Self::Error> {
        self.trace.push(HwCall::SetLines(values.to_vec()));
        if self.fail {
            Err("gpio write failed")
        } else {
            Ok(())
        }
    }
}

pub struct MockRegulator {
    trace: Trace,
    microvolts: Microvolts,
    fail_read: bool,
    fail_set: bool,
}

impl VoltageRegulator for MockRegulator {
    type Error = &'static str;

    fn voltage(&self) -> Result<Microvolts, Self::Error> {
        if self.fail_read {
            Err("regulator read failed")
        } else {
            Ok(self.microvolts)
        }
    }

    fn set_voltage(&mut self, min_uv: Microvolts, max_uv: Microvolts) -> Result<(), Self::Error> {
        self.trace.push(HwCall::SetVoltage(min_uv, max_uv));
        if self.fail_set {
            return Err("voltage out of range");
        }
        self.microvolts = min_uv;
        Ok(())
    }
}

pub struct MockDelay {
    trace: Trace,
}

impl MockDelay {
    pub fn new(trace: Trace) -> Self {
        Self { trace }
    }
}

impl BlockingDelay for MockDelay {
    fn block_for(&mut self, duration: Duration) {
        self.trace.push(HwCall::Delay(duration));
    }
}

/// Scripted device node. Each resource is either present or fails lookup
/// with the stored error.
pub struct MockDevice {
    pub node: NodeId,
    pub compatible: &'static str,
    pub clock: Result<(), ResourceError>,
    pub clock_fails: bool,
    pub reset_lines: Result<usize, ResourceError>,
    pub reset_fails: bool,
    /// Level the reset group was requested at, once acquired.
    pub reset_initial: Option<ResetLevel>,
    pub regulator: Result<Microvolts, ResourceError>,
    pub regulator_read_fails: bool,
    pub regulator_set_fails: bool,
    pub properties: Vec<(&'static str, u32)>,
    pub refuse_attributes: bool,
    pub attributes: Vec<Attribute>,
    pub trace: Trace,
}

impl MockDevice {
    /// Node describing a clock, two reset lines and a 3.3 V reference supply.
    pub fn full(node: u32) -> Self {
        Self {
            node: NodeId(node),
            compatible: driver::COMPATIBLE,
            clock: Ok(()),
            clock_fails: false,
            reset_lines: Ok(2),
            reset_fails: false,
            reset_initial: None,
            regulator: Ok(3_300_000),
            regulator_read_fails: false,
            regulator_set_fails: false,
            properties: Vec::new(),
            refuse_attributes: false,
            attributes: Vec::new(),
            trace: Trace::default(),
        }
    }

    /// Node describing no resources at all.
    pub fn bare(node: u32) -> Self {
        Self {
            clock: Err(ResourceError::NotFound),
            reset_lines: Err(ResourceError::NotFound),
            regulator: Err(ResourceError::NotFound),
            ..Self::full(node)
        }
    }

    pub fn with_property(mut self, name: &'static str, value: u32) -> Self {
        self.properties.push((name, value));
        self
    }
}

impl PropertySource for MockDevice {
    fn property_u32(&self, name: &str) -> Option<u32> {
        self.properties
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    }
}

impl PlatformDevice for MockDevice {
    type Clock = MockClock;
    type ResetLines = MockLines;
    type Regulator = MockRegulator;

    fn node(&self) -> NodeId {
        self.node
    }

    fn compatible(&self) -> &str {
        self.compatible
    }

    fn clock(&mut self, name: &str) -> Result<Self::Clock, ResourceError> {
        self.trace.push(HwCall::Acquire(name.into()));
        self.clock.map(|()| MockClock {
            trace: self.trace.clone(),
            fail: self.clock_fails,
        })
    }

    fn gpio_array(
        &mut self,
        name: &str,
        initial: ResetLevel,
    ) -> Result<Self::ResetLines, ResourceError> {
        self.trace.push(HwCall::Acquire(name.into()));
        self.reset_initial = Some(initial);
        self.reset_lines.map(|count| MockLines {
            trace: self.trace.clone(),
            count,
            fail: self.reset_fails,
        })
    }

    fn regulator_optional(&mut self, name: &str) -> Result<Self::Regulator, ResourceError> {
        self.trace.push(HwCall::Acquire(name.into()));
        self.regulator.map(|microvolts| MockRegulator {
            trace: self.trace.clone(),
            microvolts,
            fail_read: self.regulator_read_fails,
            fail_set: self.regulator_set_fails,
        })
    }

    fn create_attribute(&mut self, attribute: Attribute) -> Result<(), ResourceError> {
        if self.refuse_attributes {
            return Err(ResourceError::Failed(-12));
        }
        self.trace.push(HwCall::Publish(attribute));
        self.attributes.push(attribute);
        Ok(())
    }

    fn remove_attribute(&mut self, attribute: Attribute) {
        self.trace.push(HwCall::Withdraw(attribute));
        self.attributes.retain(|present| *present != attribute);
    }
}

pub type TestPwrseq = BoundPwrseq<NoopRawMutex, MockDevice, MockDelay>;
pub type Handle = &'static TestPwrseq;
pub type Registry = PwrseqRegistry<Handle, 2>;

/// Binds `dev` with a delay recording into the device trace.
pub fn bind_mock(
    dev: &mut MockDevice,
    registry: &mut Registry,
) -> Result<Binding<Handle>, BindError> {
    let delay = MockDelay::new(dev.trace.clone());
    driver::bind(dev, delay, registry, |seq: TestPwrseq| -> Handle {
        Box::leak(Box::new(seq))
    })
}

/// Binds `dev` into a throwaway registry and clears the bind-time trace.
pub fn bound(mut dev: MockDevice) -> (Handle, Trace) {
    let mut registry = Registry::new();
    let binding = bind_mock(&mut dev, &mut registry).expect("bind");
    dev.trace.take();
    (*binding.handle(), dev.trace.clone())
}

pub fn lines(level: bool, count: usize) -> HwCall {
    HwCall::SetLines(vec![level; count])
}

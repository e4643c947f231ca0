//! Lock-protected handle shared by the controller and the override surface.

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::attr::{self, Attribute, AttributeError};
use crate::hal::{BlockingDelay, ClockControl, DigitalOutputGroup, VoltageRegulator};

use super::{PowerPhase, PowerSequence, SimplePwrseq};

/// [`SimplePwrseq`] behind a per-instance lock.
///
/// The controller's lifecycle callbacks and the operator-facing attributes
/// both go through this wrapper, so the clock flag and the hardware handles
/// are never touched by two callers at once. The lock is held for the whole
/// operation, delays included.
pub struct SharedPwrseq<M: RawMutex, C, G, V, D> {
    inner: Mutex<M, RefCell<SimplePwrseq<C, G, V, D>>>,
}

impl<M, C, G, V, D> SharedPwrseq<M, C, G, V, D>
where
    M: RawMutex,
{
    pub const fn new(sequencer: SimplePwrseq<C, G, V, D>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(sequencer)),
        }
    }

    /// Runs `f` with exclusive access to the sequencer.
    pub fn with<R>(&self, f: impl FnOnce(&mut SimplePwrseq<C, G, V, D>) -> R) -> R {
        self.inner.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    pub fn clock_enabled(&self) -> bool {
        self.with(|seq| seq.clock_enabled())
    }

    pub fn phase(&self) -> PowerPhase {
        self.with(|seq| seq.phase())
    }

    pub fn has_regulator(&self) -> bool {
        self.with(|seq| seq.has_regulator())
    }

    pub fn into_inner(self) -> SimplePwrseq<C, G, V, D> {
        self.inner.into_inner().into_inner()
    }
}

impl<M, C, G, V, D> SharedPwrseq<M, C, G, V, D>
where
    M: RawMutex,
    C: ClockControl,
    G: DigitalOutputGroup,
    V: VoltageRegulator,
    D: BlockingDelay,
{
    /// Renders `attribute` into `out`.
    pub fn show<W>(&self, attribute: Attribute, out: &mut W) -> Result<(), AttributeError>
    where
        W: fmt::Write,
    {
        self.with(|seq| attr::show(seq, attribute, out))
    }

    /// Applies an operator write to `attribute`.
    ///
    /// Always reports the whole input as consumed, including input that was
    /// not recognized and therefore ignored.
    pub fn store(&self, attribute: Attribute, input: &str) -> usize {
        self.with(|seq| attr::store(seq, attribute, input))
    }
}

impl<M, C, G, V, D> PowerSequence for SharedPwrseq<M, C, G, V, D>
where
    M: RawMutex,
    C: ClockControl,
    G: DigitalOutputGroup,
    V: VoltageRegulator,
    D: BlockingDelay,
{
    fn pre_power_on(&self) {
        self.with(SimplePwrseq::pre_power_on);
    }

    fn post_power_on(&self) {
        self.with(SimplePwrseq::post_power_on);
    }

    fn power_off(&self) {
        self.with(SimplePwrseq::power_off);
    }
}

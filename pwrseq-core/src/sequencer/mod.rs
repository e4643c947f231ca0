//! Simple MMC power sequencer.
//!
//! [`SimplePwrseq`] owns an optional gating clock, an optional reset line
//! group, and an optional reference regulator, and applies them in a fixed
//! order around the controller's power transitions:
//!
//! * pre-power-on: start the clock, then assert reset so the card stays
//!   inactive while power and clock settle;
//! * post-power-on: release reset, then give the card its settle time;
//! * power-off: assert reset first, hold for a jittered interval, then stop
//!   the clock.
//!
//! A missing resource turns its step into a no-op. Lifecycle operations never
//! report errors; hardware failures are logged and absorbed. Controllers
//! drive the sequencer through the [`PowerSequence`] trait, usually via the
//! locked [`SharedPwrseq`] wrapper.

use core::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::PwrseqConfig;
use crate::hal::{
    BlockingDelay, ClockControl, DigitalOutputGroup, Microvolts, ResetLevel, VoltageRegulator,
};
use crate::telemetry::{SequencerOp, TelemetryEventKind, TelemetryRecorder};

mod reset;
mod shared;

use reset::DriveOutcome;
pub use reset::MAX_RESET_LINES;
pub use shared::SharedPwrseq;

/// Lifecycle callbacks a controller invokes around its own power transitions.
///
/// None of the callbacks return a value; the controller has no way to react
/// to a failure at these points.
pub trait PowerSequence {
    /// Runs before the controller enables card power.
    fn pre_power_on(&self);

    /// Runs after card power is stable.
    fn post_power_on(&self);

    /// Runs when the controller cuts card power.
    fn power_off(&self);

    /// Hardware reset of an already powered card.
    fn reset(&self) {}
}

impl<T: PowerSequence + ?Sized> PowerSequence for &T {
    fn pre_power_on(&self) {
        (**self).pre_power_on();
    }

    fn post_power_on(&self) {
        (**self).post_power_on();
    }

    fn power_off(&self) {
        (**self).power_off();
    }

    fn reset(&self) {
        (**self).reset();
    }
}

#[cfg(feature = "alloc")]
impl<T: PowerSequence + ?Sized> PowerSequence for alloc::rc::Rc<T> {
    fn pre_power_on(&self) {
        (**self).pre_power_on();
    }

    fn post_power_on(&self) {
        (**self).post_power_on();
    }

    fn power_off(&self) {
        (**self).power_off();
    }

    fn reset(&self) {
        (**self).reset();
    }
}

/// Coarse power phase, tracked for diagnostics only.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerPhase {
    Off,
    Powering,
    On,
}

impl PowerPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            PowerPhase::Off => "off",
            PowerPhase::Powering => "powering",
            PowerPhase::On => "on",
        }
    }
}

/// Hardware handles acquired at bind time. Each one may be absent.
#[derive(Debug)]
pub struct PwrseqResources<C, G, V> {
    pub clock: Option<C>,
    pub reset_lines: Option<G>,
    pub regulator: Option<V>,
}

impl<C, G, V> PwrseqResources<C, G, V> {
    /// Resource set with nothing bound.
    pub const fn none() -> Self {
        Self {
            clock: None,
            reset_lines: None,
            regulator: None,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: C) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn with_reset_lines(mut self, lines: G) -> Self {
        self.reset_lines = Some(lines);
        self
    }

    #[must_use]
    pub fn with_regulator(mut self, regulator: V) -> Self {
        self.regulator = Some(regulator);
        self
    }
}

impl<C, G, V> Default for PwrseqResources<C, G, V> {
    fn default() -> Self {
        Self::none()
    }
}

/// Power sequencer bound to one controller instance.
pub struct SimplePwrseq<C, G, V, D> {
    clock: Option<C>,
    clock_enabled: bool,
    reset_lines: Option<G>,
    regulator: Option<V>,
    config: PwrseqConfig,
    delay: D,
    jitter: SmallRng,
    phase: PowerPhase,
    telemetry: TelemetryRecorder,
}

impl<C, G, V, D> SimplePwrseq<C, G, V, D>
where
    C: ClockControl,
    G: DigitalOutputGroup,
    V: VoltageRegulator,
    D: BlockingDelay,
{
    /// Creates a sequencer over the given resources. Nothing is driven yet.
    pub fn new(resources: PwrseqResources<C, G, V>, config: PwrseqConfig, delay: D) -> Self {
        let PwrseqResources {
            clock,
            reset_lines,
            regulator,
        } = resources;

        Self {
            clock,
            clock_enabled: false,
            reset_lines,
            regulator,
            config,
            delay,
            jitter: SmallRng::seed_from_u64(config.jitter_seed()),
            phase: PowerPhase::Off,
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Starts the clock and holds the card in reset.
    pub fn pre_power_on(&mut self) {
        self.begin(SequencerOp::PrePowerOn);
        self.enable_clock();
        self.drive_reset(ResetLevel::Asserted);
        self.phase = PowerPhase::Powering;
    }

    /// Releases reset and waits for the card to initialize.
    pub fn post_power_on(&mut self) {
        self.begin(SequencerOp::PostPowerOn);
        self.drive_reset(ResetLevel::Deasserted);
        self.settle_after_power_on();
        self.phase = PowerPhase::On;
    }

    /// Holds the card in reset, waits out the jittered hold, and stops the clock.
    pub fn power_off(&mut self) {
        self.begin(SequencerOp::PowerOff);
        self.power_down();
    }

    /// Operator-requested power transition.
    ///
    /// Powering on pulses reset (assert, then immediately release) after the
    /// clock is running and applies the usual settle time. Powering off is
    /// the regular power-off sequence.
    pub fn manual_power(&mut self, on: bool) {
        if on {
            self.begin(SequencerOp::ManualPowerOn);
            self.enable_clock();
            self.drive_reset(ResetLevel::Asserted);
            self.drive_reset(ResetLevel::Deasserted);
            self.settle_after_power_on();
            self.phase = PowerPhase::On;
        } else {
            self.begin(SequencerOp::ManualPowerOff);
            self.power_down();
        }
    }

    /// Reads the reference regulator, if one is bound.
    pub fn regulator_voltage(&self) -> Option<Result<Microvolts, V::Error>> {
        self.regulator.as_ref().map(VoltageRegulator::voltage)
    }

    /// Requests a reference voltage window.
    ///
    /// Returns `false` when no regulator is bound or the regulator refused.
    pub fn set_regulator_voltage(&mut self, min_uv: Microvolts, max_uv: Microvolts) -> bool {
        let Some(regulator) = self.regulator.as_mut() else {
            return false;
        };

        match regulator.set_voltage(min_uv, max_uv) {
            Ok(()) => {
                self.telemetry.record_voltage(min_uv, max_uv);
                true
            }
            Err(err) => {
                log::warn!("pwrseq: vref set {min_uv}..{max_uv} uV failed: {err:?}");
                false
            }
        }
    }

    fn begin(&mut self, op: SequencerOp) {
        log::debug!("pwrseq: {op}");
        self.telemetry
            .record_event(TelemetryEventKind::OperationStarted(op));
    }

    fn power_down(&mut self) {
        self.drive_reset(ResetLevel::Asserted);
        if let Some(hold) = self.power_off_hold() {
            self.block_for(hold);
        }
        self.disable_clock();
        self.phase = PowerPhase::Off;
    }

    fn enable_clock(&mut self) {
        if self.clock_enabled {
            return;
        }
        let Some(clock) = self.clock.as_mut() else {
            return;
        };

        match clock.prepare_enable() {
            Ok(()) => {
                self.clock_enabled = true;
                self.telemetry.record_event(TelemetryEventKind::ClockEnabled);
            }
            Err(err) => {
                log::warn!("pwrseq: clock enable failed: {err:?}");
                self.telemetry
                    .record_event(TelemetryEventKind::ClockEnableFailed);
            }
        }
    }

    fn disable_clock(&mut self) {
        if !self.clock_enabled {
            return;
        }
        if let Some(clock) = self.clock.as_mut() {
            clock.disable_unprepare();
            self.clock_enabled = false;
            self.telemetry.record_event(TelemetryEventKind::ClockDisabled);
        }
    }

    fn drive_reset(&mut self, level: ResetLevel) {
        match reset::drive(self.reset_lines.as_mut(), level) {
            DriveOutcome::Applied(lines) => {
                self.telemetry.record_reset(level, lines);
            }
            DriveOutcome::Absent => {}
            DriveOutcome::Skipped | DriveOutcome::Failed => {
                self.telemetry.record_event(TelemetryEventKind::ResetSkipped);
            }
        }
    }

    fn settle_after_power_on(&mut self) {
        let settle = self.config.post_power_on_delay();
        if !settle.is_zero() {
            self.block_for(settle);
        }
    }

    /// Picks the power-off hold in `[d, 2d)` microseconds, or `None` when disabled.
    fn power_off_hold(&mut self) -> Option<Duration> {
        let base = u64::from(self.config.power_off_delay_us());
        if base == 0 {
            return None;
        }
        let micros = self.jitter.random_range(base..base * 2);
        Some(Duration::from_micros(micros))
    }

    fn block_for(&mut self, duration: Duration) {
        self.delay.block_for(duration);
        self.telemetry.record_delay(duration);
    }
}

impl<C, G, V, D> SimplePwrseq<C, G, V, D> {
    /// Returns `true` while the gating clock is running.
    pub const fn clock_enabled(&self) -> bool {
        self.clock_enabled
    }

    pub const fn phase(&self) -> PowerPhase {
        self.phase
    }

    pub const fn config(&self) -> &PwrseqConfig {
        &self.config
    }

    pub const fn has_clock(&self) -> bool {
        self.clock.is_some()
    }

    pub const fn has_reset_lines(&self) -> bool {
        self.reset_lines.is_some()
    }

    pub const fn has_regulator(&self) -> bool {
        self.regulator.is_some()
    }

    /// Sequencer event trail, oldest first.
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryRecorder {
        &mut self.telemetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{NoopClock, NoopDelay, NoopOutputGroup, NoopRegulator};

    type Bare = SimplePwrseq<NoopClock, NoopOutputGroup, NoopRegulator, NoopDelay>;

    fn bare(resources: PwrseqResources<NoopClock, NoopOutputGroup, NoopRegulator>) -> Bare {
        SimplePwrseq::new(resources, PwrseqConfig::new(0, 100), NoopDelay::new())
    }

    #[test]
    fn phases_follow_lifecycle_calls() {
        let mut seq = bare(PwrseqResources::none().with_clock(NoopClock::new()));
        assert_eq!(seq.phase(), PowerPhase::Off);
        seq.pre_power_on();
        assert_eq!(seq.phase(), PowerPhase::Powering);
        assert!(seq.clock_enabled());
        seq.post_power_on();
        assert_eq!(seq.phase(), PowerPhase::On);
        seq.power_off();
        assert_eq!(seq.phase(), PowerPhase::Off);
        assert!(!seq.clock_enabled());
    }

    #[test]
    fn clock_flag_stays_clear_without_clock() {
        let mut seq = bare(PwrseqResources::none());
        seq.pre_power_on();
        assert!(!seq.clock_enabled());
        seq.manual_power(true);
        assert!(!seq.clock_enabled());
    }

    #[test]
    fn power_off_hold_stays_within_jitter_window() {
        let mut seq = bare(PwrseqResources::none());
        for _ in 0..64 {
            let hold = seq.power_off_hold().unwrap();
            assert!(hold >= Duration::from_micros(100));
            assert!(hold < Duration::from_micros(200));
        }
    }

    #[test]
    fn disabled_power_off_delay_never_blocks() {
        let mut seq: Bare = SimplePwrseq::new(
            PwrseqResources::none(),
            PwrseqConfig::new(0, 0),
            NoopDelay::new(),
        );
        assert_eq!(seq.power_off_hold(), None);
    }

    #[test]
    fn voltage_request_without_regulator_is_refused() {
        let mut seq = bare(PwrseqResources::none());
        assert!(!seq.set_regulator_voltage(3_300_000, 3_300_000));
        assert!(seq.regulator_voltage().is_none());
    }
}

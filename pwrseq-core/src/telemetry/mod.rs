//! Telemetry trail recorded by the power sequencer.
//!
//! Every hardware touch the sequencer performs is mirrored into a bounded
//! ring buffer. The emulator console prints it and the firmware replays it
//! over defmt after power-up, using the compact numeric event codes.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::hal::{Microvolts, ResetLevel};

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Operation that produced a group of events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequencerOp {
    PrePowerOn,
    PostPowerOn,
    PowerOff,
    ManualPowerOn,
    ManualPowerOff,
}

impl SequencerOp {
    const fn index(self) -> u16 {
        match self {
            SequencerOp::PrePowerOn => 0,
            SequencerOp::PostPowerOn => 1,
            SequencerOp::PowerOff => 2,
            SequencerOp::ManualPowerOn => 3,
            SequencerOp::ManualPowerOff => 4,
        }
    }
}

impl fmt::Display for SequencerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SequencerOp::PrePowerOn => "pre-power-on",
            SequencerOp::PostPowerOn => "post-power-on",
            SequencerOp::PowerOff => "power-off",
            SequencerOp::ManualPowerOn => "manual-on",
            SequencerOp::ManualPowerOff => "manual-off",
        })
    }
}

/// Discriminated events emitted by the sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    OperationStarted(SequencerOp),
    ClockEnabled,
    ClockEnableFailed,
    ClockDisabled,
    ResetDriven(ResetLevel),
    ResetSkipped,
    DelayElapsed,
    VoltageSet,
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::OperationStarted(op) => write!(f, "op {op}"),
            TelemetryEventKind::ClockEnabled => f.write_str("clock-enabled"),
            TelemetryEventKind::ClockEnableFailed => f.write_str("clock-enable-failed"),
            TelemetryEventKind::ClockDisabled => f.write_str("clock-disabled"),
            TelemetryEventKind::ResetDriven(level) => write!(f, "reset-{level}"),
            TelemetryEventKind::ResetSkipped => f.write_str("reset-skipped"),
            TelemetryEventKind::DelayElapsed => f.write_str("delay"),
            TelemetryEventKind::VoltageSet => f.write_str("voltage-set"),
        }
    }
}

impl TelemetryEventKind {
    const OPERATION_BASE: u16 = 0x0000;
    const CLOCK_ENABLED_CODE: u16 = 0x0010;
    const CLOCK_ENABLE_FAILED_CODE: u16 = 0x0011;
    const CLOCK_DISABLED_CODE: u16 = 0x0012;
    const RESET_ASSERTED_CODE: u16 = 0x0020;
    const RESET_DEASSERTED_CODE: u16 = 0x0021;
    const RESET_SKIPPED_CODE: u16 = 0x0022;
    const DELAY_CODE: u16 = 0x0030;
    const VOLTAGE_SET_CODE: u16 = 0x0040;

    /// Compact numeric code for log output.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::OperationStarted(op) => Self::OPERATION_BASE + op.index(),
            TelemetryEventKind::ClockEnabled => Self::CLOCK_ENABLED_CODE,
            TelemetryEventKind::ClockEnableFailed => Self::CLOCK_ENABLE_FAILED_CODE,
            TelemetryEventKind::ClockDisabled => Self::CLOCK_DISABLED_CODE,
            TelemetryEventKind::ResetDriven(ResetLevel::Asserted) => Self::RESET_ASSERTED_CODE,
            TelemetryEventKind::ResetDriven(ResetLevel::Deasserted) => Self::RESET_DEASSERTED_CODE,
            TelemetryEventKind::ResetSkipped => Self::RESET_SKIPPED_CODE,
            TelemetryEventKind::DelayElapsed => Self::DELAY_CODE,
            TelemetryEventKind::VoltageSet => Self::VOLTAGE_SET_CODE,
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    None,
    /// Number of reset lines written in one group call.
    Lines(u8),
    /// Duration the caller was blocked for.
    Delay(Duration),
    /// Voltage window handed to the regulator.
    Voltage { min: Microvolts, max: Microvolts },
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.event)?;
        match self.details {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Lines(count) => write!(f, " lines={count}"),
            TelemetryPayload::Delay(duration) => write!(f, " {}us", duration.as_micros()),
            TelemetryPayload::Voltage { min, max } => write!(f, " min={min}uV max={max}uV"),
        }
    }
}

/// Records sequencer events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Drops every stored record. Identifiers keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Records an event without payload.
    pub fn record_event(&mut self, event: TelemetryEventKind) -> EventId {
        self.record(event, TelemetryPayload::None)
    }

    /// Records a reset group write.
    pub fn record_reset(&mut self, level: ResetLevel, lines: usize) -> EventId {
        self.record(
            TelemetryEventKind::ResetDriven(level),
            TelemetryPayload::Lines(truncate_count(lines)),
        )
    }

    /// Records a completed blocking delay.
    pub fn record_delay(&mut self, duration: Duration) -> EventId {
        self.record(
            TelemetryEventKind::DelayElapsed,
            TelemetryPayload::Delay(duration),
        )
    }

    /// Records a voltage request applied to the regulator.
    pub fn record_voltage(&mut self, min: Microvolts, max: Microvolts) -> EventId {
        self.record(
            TelemetryEventKind::VoltageSet,
            TelemetryPayload::Voltage { min, max },
        )
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(&mut self, event: TelemetryEventKind, payload: TelemetryPayload) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            event,
            details: payload,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_count(count: usize) -> u8 {
    u8::try_from(count).unwrap_or(u8::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_group_by_subsystem() {
        assert_eq!(
            TelemetryEventKind::OperationStarted(SequencerOp::PowerOff).to_raw(),
            0x0002
        );
        assert_eq!(TelemetryEventKind::ClockEnableFailed.to_raw(), 0x0011);
        assert_eq!(
            TelemetryEventKind::ResetDriven(ResetLevel::Deasserted).to_raw(),
            0x0021
        );
        assert_eq!(TelemetryEventKind::VoltageSet.to_raw(), 0x0040);
    }

    #[test]
    fn recorder_keeps_most_recent_entries() {
        let mut recorder: TelemetryRecorder<2> = TelemetryRecorder::new();
        recorder.record_event(TelemetryEventKind::ClockEnabled);
        recorder.record_reset(ResetLevel::Asserted, 2);
        recorder.record_delay(Duration::from_micros(15));

        let kept: heapless::Vec<EventId, 2> = recorder.oldest_first().map(|r| r.id).collect();
        assert_eq!(kept.as_slice(), &[1, 2]);
        assert_eq!(
            recorder.latest().map(|r| r.details),
            Some(TelemetryPayload::Delay(Duration::from_micros(15)))
        );
    }

    #[test]
    fn records_render_with_payload() {
        let mut recorder: TelemetryRecorder = TelemetryRecorder::new();
        recorder.record_voltage(1_800_000, 2_000_000);
        let mut rendered: heapless::String<64> = heapless::String::new();
        if let Some(record) = recorder.latest() {
            fmt::write(&mut rendered, format_args!("{record}")).unwrap();
        }
        assert_eq!(rendered.as_str(), "#0 voltage-set min=1800000uV max=2000000uV");
    }
}

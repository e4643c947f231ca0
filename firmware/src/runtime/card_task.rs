use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Timer};
use pwrseq_core::registry::HostPwrseq;

use super::CardPwrseq;
use crate::board::SUPPLY_RAMP_MS;

/// Brings the card slot up the way an MMC host does at boot.
#[embassy_executor::task]
pub async fn run(host: HostPwrseq<&'static CardPwrseq>, mut supply: Output<'static>) {
    host.pre_power_on();
    supply.set_high();
    Timer::after(Duration::from_millis(SUPPLY_RAMP_MS)).await;
    host.post_power_on();

    match host.sequencer() {
        Some(seq) => report(seq),
        None => defmt::warn!("pwrseq: card powered without a sequencer"),
    }

    core::future::pending::<()>().await;
}

fn report(seq: &CardPwrseq) {
    defmt::info!(
        "pwrseq: card powered, phase={} clock={}",
        seq.phase().as_str(),
        seq.clock_enabled()
    );
    seq.with(|inner| {
        for record in inner.telemetry().oldest_first() {
            defmt::debug!(
                "pwrseq: event {=u32} code={=u16:#06x} {}",
                record.id,
                record.event.to_raw(),
                defmt::Display2Format(record)
            );
        }
    });
}

use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, OutputOpenDrain, Speed};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use pwrseq_core::driver::{self, BoundPwrseq};
use pwrseq_core::registry::{HostPwrseq, PwrseqRegistry};
use static_cell::StaticCell;

use crate::board;
use crate::hw::{CardSlot, EmbassyDelay, OpenDrainResetLines, OscillatorEnable};

mod card_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) type CardPwrseq = BoundPwrseq<ThreadModeRawMutex, CardSlot<'static>, EmbassyDelay>;

static SEQUENCER: StaticCell<CardPwrseq> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA2, PA3, PA4, PA5, ..
    } = hal::init(config);

    // Reset lines start released; binding asserts them.
    let reset_lines = OpenDrainResetLines::new([
        OutputOpenDrain::new(PA4, Level::High, Speed::Low),
        OutputOpenDrain::new(PA3, Level::High, Speed::Low),
    ]);
    let oscillator = OscillatorEnable::new(Output::new(PA5, Level::Low, Speed::Low));
    let supply = Output::new(PA2, Level::Low, Speed::Low);

    let mut slot = CardSlot::new(oscillator, reset_lines);
    let mut registry: PwrseqRegistry<&'static CardPwrseq, 1> = PwrseqRegistry::new();

    if !driver::matches(&slot) {
        defmt::warn!("pwrseq: card slot is not {}", driver::COMPATIBLE);
    }
    let host = match driver::bind(&mut slot, EmbassyDelay, &mut registry, |seq: CardPwrseq| {
        &*SEQUENCER.init(seq)
    }) {
        Ok(binding) => {
            defmt::info!(
                "pwrseq: {} bound, post-power-on={}ms power-off={}us",
                driver::DRIVER_NAME,
                board::POST_POWER_ON_DELAY_MS,
                board::POWER_OFF_DELAY_US
            );
            HostPwrseq::attach(&registry, binding.node()).unwrap_or_else(HostPwrseq::none)
        }
        Err(err) => {
            defmt::error!("pwrseq: bind failed: {}", defmt::Display2Format(&err));
            HostPwrseq::none()
        }
    };

    spawner
        .spawn(card_task::run(host, supply))
        .expect("failed to spawn card power task");

    core::future::pending::<()>().await;
}

//! Card slot description for the STM32G0 carrier.
//!
//! The slot routes two open-drain reset lines and an oscillator-enable pin
//! to the card; there is no controllable reference supply. The delays below
//! play the role of the node's device-description properties.

#![allow(dead_code)]

use pwrseq_core::config::{self, PropertySource};
use pwrseq_core::registry::NodeId;

/// Node the card slot's sequencer registers under.
pub const CARD_NODE: NodeId = NodeId(1);

/// Settle time the card needs after reset is released.
pub const POST_POWER_ON_DELAY_MS: u32 = 10;
/// Lower bound of the reset hold before the oscillator stops.
pub const POWER_OFF_DELAY_US: u32 = 500;
/// Time allowed for the card supply to ramp once enabled.
pub const SUPPLY_RAMP_MS: u64 = 5;

/// Static property table of the card slot.
#[derive(Copy, Clone, Debug, Default)]
pub struct BoardProperties;

impl PropertySource for BoardProperties {
    fn property_u32(&self, name: &str) -> Option<u32> {
        match name {
            config::POST_POWER_ON_DELAY_MS => Some(POST_POWER_ON_DELAY_MS),
            config::POWER_OFF_DELAY_US => Some(POWER_OFF_DELAY_US),
            _ => None,
        }
    }
}

/// Converts a core duration to an Embassy duration, saturating on overflow.
pub fn to_embassy(duration: core::time::Duration) -> embassy_time::Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    embassy_time::Duration::from_micros(micros)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwrseq_core::config::PwrseqConfig;

    #[test]
    fn board_properties_feed_sequencer_config() {
        let config = PwrseqConfig::from_properties(&BoardProperties);
        assert_eq!(config.post_power_on_delay_ms(), POST_POWER_ON_DELAY_MS);
        assert_eq!(config.power_off_delay_us(), POWER_OFF_DELAY_US);
        assert_eq!(BoardProperties.property_u32("vmmc-supply"), None);
    }

    #[test]
    fn durations_convert_at_microsecond_resolution() {
        assert_eq!(
            to_embassy(core::time::Duration::from_micros(750)),
            embassy_time::Duration::from_micros(750)
        );
        assert_eq!(
            to_embassy(core::time::Duration::from_millis(10)),
            embassy_time::Duration::from_millis(10)
        );
    }
}

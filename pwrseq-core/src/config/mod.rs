//! Bind-time configuration for the simple power sequencer.
//!
//! Values come from the device description through a [`PropertySource`] and
//! are read exactly once, when the sequencer binds. Missing properties fall
//! back to zero, which disables the corresponding delay.

use core::time::Duration;

/// Property holding the post-power-on settle time in milliseconds.
pub const POST_POWER_ON_DELAY_MS: &str = "post-power-on-delay-ms";
/// Property holding the power-off hold time in microseconds.
pub const POWER_OFF_DELAY_US: &str = "power-off-delay-us";

/// Base seed for power-off jitter when the board does not supply one.
pub const DEFAULT_JITTER_SEED: u64 = 0x6d6d_6370_7772_7371;

/// Jitter seed for a node whose board supplies none.
///
/// Distinct nodes get unrelated seeds, so sequencers sharing a supply rail
/// do not pick the same power-off holds.
#[must_use]
pub fn node_jitter_seed(node: u32) -> u64 {
    // splitmix64 finalizer
    let mut z = DEFAULT_JITTER_SEED ^ u64::from(node);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Read-only view over the properties attached to a device node.
pub trait PropertySource {
    /// Returns the named `u32` property, or `None` when it is absent or malformed.
    fn property_u32(&self, name: &str) -> Option<u32>;
}

/// Property source that reports every property as absent.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoProperties;

impl PropertySource for NoProperties {
    fn property_u32(&self, _: &str) -> Option<u32> {
        None
    }
}

/// Delays and jitter parameters captured at bind time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PwrseqConfig {
    post_power_on_delay_ms: u32,
    power_off_delay_us: u32,
    jitter_seed: u64,
}

impl PwrseqConfig {
    /// Creates a configuration with explicit delays.
    pub const fn new(post_power_on_delay_ms: u32, power_off_delay_us: u32) -> Self {
        Self {
            post_power_on_delay_ms,
            power_off_delay_us,
            jitter_seed: DEFAULT_JITTER_SEED,
        }
    }

    /// Reads both delay properties, defaulting each to zero.
    pub fn from_properties<S>(source: &S) -> Self
    where
        S: PropertySource + ?Sized,
    {
        let post = source.property_u32(POST_POWER_ON_DELAY_MS).unwrap_or(0);
        let off = source.property_u32(POWER_OFF_DELAY_US).unwrap_or(0);
        log::debug!("pwrseq: config {POST_POWER_ON_DELAY_MS}={post} {POWER_OFF_DELAY_US}={off}");
        Self::new(post, off)
    }

    /// Replaces the seed feeding the power-off jitter generator.
    #[must_use]
    pub const fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = seed;
        self
    }

    pub const fn post_power_on_delay_ms(&self) -> u32 {
        self.post_power_on_delay_ms
    }

    pub const fn power_off_delay_us(&self) -> u32 {
        self.power_off_delay_us
    }

    pub const fn jitter_seed(&self) -> u64 {
        self.jitter_seed
    }

    /// Settle time applied after releasing reset.
    pub fn post_power_on_delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.post_power_on_delay_ms))
    }

    /// Lower bound of the randomized power-off hold.
    pub fn power_off_delay(&self) -> Duration {
        Duration::from_micros(u64::from(self.power_off_delay_us))
    }
}

impl Default for PwrseqConfig {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

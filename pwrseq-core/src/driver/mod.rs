//! Bind and unbind for the simple power sequencer.
//!
//! Binding acquires the hardware described for a device node, reads its
//! delay properties, installs the override attributes, and registers the
//! resulting sequencer so a controller can find it. Optional resources that
//! are simply not described never fail the bind; only a genuine acquisition
//! failure for the clock or reset lines does.

use core::fmt;

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::attr::Attribute;
use crate::config::{self, PropertySource, PwrseqConfig};
use crate::hal::{BlockingDelay, ClockControl, DigitalOutputGroup, ResetLevel, VoltageRegulator};
use crate::registry::{NodeId, PwrseqRegistry, RegistryError};
use crate::sequencer::{PwrseqResources, SharedPwrseq, SimplePwrseq};

/// Device-description compatible string served by this driver.
pub const COMPATIBLE: &str = "mmc-pwrseq-simple";
/// Driver name reported to the platform bus.
pub const DRIVER_NAME: &str = "pwrseq_simple";
/// Compatible strings this driver binds to.
pub const OF_MATCH_TABLE: &[&str] = &[COMPATIBLE];

/// Clock lookup name.
pub const CLOCK_NAME: &str = "ext_clock";
/// Reset GPIO array lookup name.
pub const RESET_GPIOS_NAME: &str = "reset";
/// Reference regulator supply name.
pub const VREF_SUPPLY_NAME: &str = "vref";

/// Failure reported when acquiring a resource for a device node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResourceError {
    /// The resource is not described for this node.
    NotFound,
    /// The provider subsystem is not available on this platform.
    Unsupported,
    /// The provider has not bound yet.
    ProbeDeferred,
    /// Any other provider failure, carrying its raw code.
    Failed(i32),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => f.write_str("not found"),
            ResourceError::Unsupported => f.write_str("unsupported"),
            ResourceError::ProbeDeferred => f.write_str("probe deferred"),
            ResourceError::Failed(code) => write!(f, "failed ({code})"),
        }
    }
}

/// Reasons a bind is refused.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BindError {
    Clock(ResourceError),
    ResetLines(ResourceError),
    Registry(RegistryError),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::Clock(err) => write!(f, "clock `{CLOCK_NAME}`: {err}"),
            BindError::ResetLines(err) => write!(f, "reset gpios `{RESET_GPIOS_NAME}`: {err}"),
            BindError::Registry(err) => err.fmt(f),
        }
    }
}

impl From<RegistryError> for BindError {
    fn from(error: RegistryError) -> Self {
        BindError::Registry(error)
    }
}

/// Device node as seen by the sequencer at bind time.
pub trait PlatformDevice: PropertySource {
    type Clock: ClockControl;
    type ResetLines: DigitalOutputGroup;
    type Regulator: VoltageRegulator;

    /// Node identity used for registry lookups.
    fn node(&self) -> NodeId;

    /// Compatible string from the node's description.
    fn compatible(&self) -> &str;

    /// Looks up a named clock.
    fn clock(&mut self, name: &str) -> Result<Self::Clock, ResourceError>;

    /// Looks up a named GPIO array, configured as outputs at `initial`.
    fn gpio_array(
        &mut self,
        name: &str,
        initial: ResetLevel,
    ) -> Result<Self::ResetLines, ResourceError>;

    /// Looks up a named supply that may legitimately be missing.
    fn regulator_optional(&mut self, name: &str) -> Result<Self::Regulator, ResourceError>;

    /// Publishes an override attribute on the node.
    fn create_attribute(&mut self, attribute: Attribute) -> Result<(), ResourceError>;

    /// Withdraws a previously published attribute.
    fn remove_attribute(&mut self, attribute: Attribute);

    /// Seed for the power-off jitter. Without one, the seed is derived from
    /// the node.
    fn jitter_seed(&self) -> Option<u64> {
        None
    }
}

/// Sequencer type produced by binding `P` with delay provider `D`.
pub type BoundPwrseq<M, P, D> = SharedPwrseq<
    M,
    <P as PlatformDevice>::Clock,
    <P as PlatformDevice>::ResetLines,
    <P as PlatformDevice>::Regulator,
    D,
>;

/// Returns `true` when this driver serves `dev`.
pub fn matches<P: PlatformDevice + ?Sized>(dev: &P) -> bool {
    OF_MATCH_TABLE.contains(&dev.compatible())
}

/// Attributes actually published for a binding.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct InstalledAttributes {
    pub power_toggle: bool,
    pub reference_voltage: bool,
}

impl InstalledAttributes {
    fn remove_from<P: PlatformDevice + ?Sized>(&mut self, dev: &mut P) {
        if self.power_toggle {
            dev.remove_attribute(Attribute::PowerToggle);
            self.power_toggle = false;
        }
        if self.reference_voltage {
            dev.remove_attribute(Attribute::ReferenceVoltage);
            self.reference_voltage = false;
        }
    }
}

/// Live binding between a device node and its registered sequencer.
#[derive(Debug)]
pub struct Binding<H> {
    node: NodeId,
    handle: H,
    attributes: InstalledAttributes,
}

impl<H> Binding<H> {
    pub const fn node(&self) -> NodeId {
        self.node
    }

    pub const fn handle(&self) -> &H {
        &self.handle
    }

    pub const fn attributes(&self) -> InstalledAttributes {
        self.attributes
    }

    /// Unregisters the sequencer and withdraws its attributes.
    ///
    /// The hardware is left as it is; power the card off first if that is
    /// required.
    pub fn unbind<P, const CAPACITY: usize>(
        mut self,
        dev: &mut P,
        registry: &mut PwrseqRegistry<H, CAPACITY>,
    ) -> H
    where
        P: PlatformDevice + ?Sized,
    {
        if registry.unregister(self.node).is_none() {
            log::warn!("pwrseq: {} was not registered", self.node);
        }
        self.attributes.remove_from(dev);
        log::debug!("pwrseq: unbound {}", self.node);
        self.handle
    }
}

/// Binds a sequencer to `dev` and registers it.
///
/// `place` moves the freshly built sequencer into its final storage and
/// returns the handle kept by the registry, e.g. a `&'static` reference out
/// of a `StaticCell`.
pub fn bind<M, P, D, H, F, const CAPACITY: usize>(
    dev: &mut P,
    delay: D,
    registry: &mut PwrseqRegistry<H, CAPACITY>,
    place: F,
) -> Result<Binding<H>, BindError>
where
    M: RawMutex,
    P: PlatformDevice,
    D: BlockingDelay,
    H: Clone,
    F: FnOnce(BoundPwrseq<M, P, D>) -> H,
{
    let node = dev.node();

    let clock = optional(dev.clock(CLOCK_NAME), |err| err == ResourceError::NotFound)
        .map_err(BindError::Clock)?;

    let reset_lines = optional(
        dev.gpio_array(RESET_GPIOS_NAME, ResetLevel::Asserted),
        |err| matches!(err, ResourceError::NotFound | ResourceError::Unsupported),
    )
    .map_err(BindError::ResetLines)?;

    let seed = dev
        .jitter_seed()
        .unwrap_or_else(|| config::node_jitter_seed(node.0));
    let config = PwrseqConfig::from_properties(&*dev).with_jitter_seed(seed);

    let mut attributes = InstalledAttributes {
        power_toggle: install(dev, Attribute::PowerToggle),
        reference_voltage: false,
    };

    let regulator = match dev.regulator_optional(VREF_SUPPLY_NAME) {
        Ok(regulator) => Some(regulator),
        Err(err) => {
            log::debug!("pwrseq: {node} without `{VREF_SUPPLY_NAME}` supply: {err}");
            None
        }
    };
    if regulator.is_some() {
        attributes.reference_voltage = install(dev, Attribute::ReferenceVoltage);
    }

    log::debug!(
        "pwrseq: {node} clock={} reset={} vref={}",
        clock.is_some(),
        reset_lines.is_some(),
        regulator.is_some()
    );

    let resources = PwrseqResources {
        clock,
        reset_lines,
        regulator,
    };
    let handle = place(SharedPwrseq::new(SimplePwrseq::new(
        resources, config, delay,
    )));

    if let Err(err) = registry.register(node, handle.clone()) {
        attributes.remove_from(dev);
        return Err(err.into());
    }

    Ok(Binding {
        node,
        handle,
        attributes,
    })
}

/// Maps tolerated acquisition failures to an absent resource.
fn optional<T>(
    result: Result<T, ResourceError>,
    tolerated: impl FnOnce(ResourceError) -> bool,
) -> Result<Option<T>, ResourceError> {
    match result {
        Ok(resource) => Ok(Some(resource)),
        Err(err) if tolerated(err) => Ok(None),
        Err(err) => Err(err),
    }
}

fn install<P: PlatformDevice + ?Sized>(dev: &mut P, attribute: Attribute) -> bool {
    match dev.create_attribute(attribute) {
        Ok(()) => true,
        Err(err) => {
            log::warn!("pwrseq: {} cannot publish {attribute}: {err}", dev.node());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_tolerates_only_listed_errors() {
        let absent: Result<u8, _> = Err(ResourceError::NotFound);
        assert_eq!(
            optional(absent, |err| err == ResourceError::NotFound),
            Ok(None)
        );

        let deferred: Result<u8, _> = Err(ResourceError::ProbeDeferred);
        assert_eq!(
            optional(deferred, |err| err == ResourceError::NotFound),
            Err(ResourceError::ProbeDeferred)
        );

        assert_eq!(optional(Ok(5u8), |_| false), Ok(Some(5)));
    }

    #[test]
    fn bind_errors_name_the_resource() {
        let mut rendered: heapless::String<64> = heapless::String::new();
        fmt::write(
            &mut rendered,
            format_args!("{}", BindError::Clock(ResourceError::Failed(-5))),
        )
        .unwrap();
        assert_eq!(rendered.as_str(), "clock `ext_clock`: failed (-5)");
    }
}

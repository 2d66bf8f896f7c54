//! Device catalog entry.
//!
//! Board models (NE2000, WD8003, 3C503) register the chip through this descriptor: they build a
//! [`Dp8390Config`] (typically deserialized from the machine configuration) and drive the
//! lifecycle hooks.

use crate::backend::NetworkBackend;
use crate::chip::Dp8390;
use crate::config::Dp8390Config;
use crate::error::ConfigError;
use crate::irq::IrqSink;

pub const DEVICE_NAME: &str = "DP8390 Network Interface Controller";
pub const DEVICE_INTERNAL_NAME: &str = "dp8390";

pub struct DeviceDescriptor<B, I> {
    pub name: &'static str,
    pub internal_name: &'static str,
    pub init: fn(Dp8390Config, B, I) -> Result<Dp8390<B, I>, ConfigError>,
    pub reset: fn(&mut Dp8390<B, I>),
    pub close: fn(Dp8390<B, I>) -> (B, I),
}

impl<B, I> Clone for DeviceDescriptor<B, I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B, I> Copy for DeviceDescriptor<B, I> {}

impl<B, I> std::fmt::Debug for DeviceDescriptor<B, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("name", &self.name)
            .field("internal_name", &self.internal_name)
            .finish_non_exhaustive()
    }
}

/// Catalog descriptor for a chip wired to backend `B` and interrupt sink `I`.
pub fn descriptor<B: NetworkBackend, I: IrqSink>() -> DeviceDescriptor<B, I> {
    DeviceDescriptor {
        name: DEVICE_NAME,
        internal_name: DEVICE_INTERNAL_NAME,
        init: Dp8390::<B, I>::new,
        reset: Dp8390::<B, I>::reset,
        close: Dp8390::<B, I>::close,
    }
}

//! Interrupt output of the chip.
//!
//! The DP8390 INT pin is a level: it is asserted whenever an unmasked ISR bit is set. The owning
//! adapter routes it to a PIC input or PCI INTx pin through an [`IrqSink`].

use crate::regs::{Imr, Isr};

/// Receiver of interrupt line transitions.
pub trait IrqSink {
    fn raise_irq(&mut self);
    fn lower_irq(&mut self);
}

impl<T: IrqSink + ?Sized> IrqSink for &mut T {
    fn raise_irq(&mut self) {
        (**self).raise_irq();
    }

    fn lower_irq(&mut self) {
        (**self).lower_irq();
    }
}

impl IrqSink for () {
    fn raise_irq(&mut self) {}
    fn lower_irq(&mut self) {}
}

impl<T: IrqSink + ?Sized> IrqSink for Box<T> {
    fn raise_irq(&mut self) {
        (**self).raise_irq();
    }

    fn lower_irq(&mut self) {
        (**self).lower_irq();
    }
}

impl<T: IrqSink + ?Sized> IrqSink for std::rc::Rc<std::cell::RefCell<T>> {
    fn raise_irq(&mut self) {
        self.borrow_mut().raise_irq();
    }

    fn lower_irq(&mut self) {
        self.borrow_mut().lower_irq();
    }
}

impl<T: IrqSink + ?Sized> IrqSink for std::sync::Arc<std::sync::Mutex<T>> {
    fn raise_irq(&mut self) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .raise_irq();
    }

    fn lower_irq(&mut self) {
        self.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .lower_irq();
    }
}

/// Whether `isr`/`imr` request an interrupt. ISR.RST is status-only and never interrupts.
pub fn line_level(isr: Isr, imr: Imr) -> bool {
    (isr.bits() & imr.bits() & Isr::MASKABLE.bits()) != 0
}

/// Edge tracker between the chip's computed level and the external sink.
///
/// The sink only sees transitions; recomputing an unchanged level is a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptLine {
    asserted: bool,
}

impl InterruptLine {
    pub fn is_asserted(&self) -> bool {
        self.asserted
    }

    pub fn update(&mut self, level: bool, sink: &mut impl IrqSink) {
        if level == self.asserted {
            return;
        }
        self.asserted = level;
        if level {
            sink.raise_irq();
        } else {
            sink.lower_irq();
        }
    }

    /// Drives the sink to `level` even if it matches the last level driven.
    pub fn resync(&mut self, level: bool, sink: &mut impl IrqSink) {
        self.asserted = level;
        if level {
            sink.raise_irq();
        } else {
            sink.lower_irq();
        }
    }
}

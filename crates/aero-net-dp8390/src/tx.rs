//! Transmit engine.
//!
//! CR.TXP hands TBCR bytes starting at page TPSR to the backend (or, with TCR.LB set, back into
//! the receive engine). Completion status is withheld until the modeled wire time has elapsed on
//! the chip's virtual clock; [`Dp8390::tick`] delivers it.

use tracing::{debug, trace, warn};

use crate::backend::NetworkBackend;
use crate::chip::Dp8390;
use crate::irq::IrqSink;
use crate::regs::{Cr, Isr, Tsr, PAGE_SIZE};
use crate::rx::RxErrors;
use crate::time::Deadline;

/// Collision count reported when a transmission is aborted for excessive collisions.
const NCR_ABORTED: u8 = 15;

#[cfg(feature = "io-snapshot")]
const LOOPED_TAG: u8 = 0x10;

/// Transmit status for a looped-back frame.
///
/// Internal loopback (mode 1) never sees carrier or the collision heartbeat. ENDEC loopback
/// (mode 2) senses its own carrier but no heartbeat. External loopback (mode 3) looks like a
/// normal transmission.
fn loopback_status(mode: u8) -> Tsr {
    match mode {
        1 => Tsr::PTX | Tsr::CRS | Tsr::CDH,
        2 => Tsr::PTX | Tsr::CDH,
        _ => Tsr::PTX,
    }
}

/// Result reported when the pending transmission completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxOutcome {
    Sent,
    /// Turned around inside the chip in the given TCR loopback mode (1..=3).
    Looped(u8),
    /// No link: the frame never left the chip.
    CarrierLost,
    /// The frame did not fit in packet memory.
    Underrun,
}

impl TxOutcome {
    #[cfg(feature = "io-snapshot")]
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Sent => 1,
            Self::CarrierLost => 2,
            Self::Underrun => 3,
            Self::Looped(mode) => LOOPED_TAG | mode,
        }
    }

    #[cfg(feature = "io-snapshot")]
    pub(crate) fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sent),
            2 => Some(Self::CarrierLost),
            3 => Some(Self::Underrun),
            0x11..=0x13 => Some(Self::Looped(value & 0x03)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct TxState {
    pub deadline: Deadline,
    pub outcome: Option<TxOutcome>,
}

impl<B: NetworkBackend, I: IrqSink> Dp8390<B, I> {
    /// Advances virtual time by `delta_ns` and completes a transmission whose deadline passed.
    pub fn tick(&mut self, delta_ns: u64) {
        self.clock.advance(delta_ns);
        if self.tx.deadline.expire(&self.clock) {
            self.complete_transmit();
        }
    }

    /// Virtual time at which the pending transmission completes, if any.
    pub fn next_deadline_ns(&self) -> Option<u64> {
        self.tx.deadline.at_ns()
    }

    pub fn tx_pending(&self) -> bool {
        self.tx.outcome.is_some()
    }

    pub fn link_up(&self) -> bool {
        self.link_up
    }

    /// Sets the simulated carrier state. Transmissions without link abort with carrier loss.
    pub fn set_link_up(&mut self, up: bool) {
        if self.link_up != up {
            debug!(instance = self.config.instance, up, "dp8390: link state changed");
        }
        self.link_up = up;
    }

    pub(crate) fn start_transmit(&mut self) {
        let instance = self.config.instance;
        if !self.is_running() {
            debug!(instance, "dp8390: TXP while stopped, ignored");
            return;
        }
        if self.tx.outcome.is_some() {
            debug!(instance, "dp8390: TXP while a transmission is pending, ignored");
            return;
        }

        let len = usize::from(self.regs.tx_bytes);
        let addr = u32::from(self.regs.tx_page_start) * PAGE_SIZE as u32;
        let loopback = self.regs.tcr.loopback();

        self.regs.cr.insert(Cr::TXP);
        self.regs.tsr = Tsr::empty();

        let outcome = if !self.mem.contains_range(addr, len) {
            warn!(
                instance,
                addr,
                len,
                "dp8390: transmit buffer outside packet memory"
            );
            TxOutcome::Underrun
        } else if loopback == 0 && !self.link_up {
            debug!(instance, len, "dp8390: transmit without link");
            TxOutcome::CarrierLost
        } else {
            let mut frame = vec![0u8; len];
            self.mem.read_bytes(addr, &mut frame);
            if loopback != 0 {
                trace!(instance, len, mode = loopback, "dp8390: transmit looped back");
                if let Some(&last) = frame.last() {
                    self.regs.fifo = last;
                }
                self.receive_common(&frame, RxErrors::default());
                TxOutcome::Looped(loopback)
            } else {
                if frame.is_empty() {
                    debug!(instance, "dp8390: zero-length transmit");
                } else {
                    trace!(instance, len, "dp8390: transmit");
                    self.backend.transmit(frame);
                }
                TxOutcome::Sent
            }
        };

        self.tx.outcome = Some(outcome);
        self.tx
            .deadline
            .arm(&self.clock, self.config.tx_timing.completion_delay_ns(len));
    }

    pub(crate) fn complete_transmit(&mut self) {
        let Some(outcome) = self.tx.outcome.take() else {
            return;
        };
        self.tx.deadline.cancel();
        self.regs.cr.remove(Cr::TXP);
        match outcome {
            TxOutcome::Sent => {
                self.regs.tsr = Tsr::PTX;
                self.regs.ncr = 0;
                self.regs.isr.insert(Isr::PTX);
            }
            TxOutcome::Looped(mode) => {
                self.regs.tsr = loopback_status(mode);
                self.regs.ncr = 0;
                self.regs.isr.insert(Isr::PTX);
            }
            TxOutcome::CarrierLost => {
                self.regs.tsr = Tsr::COL | Tsr::ABT | Tsr::CRS;
                self.regs.ncr = NCR_ABORTED;
                self.regs.isr.insert(Isr::TXE);
            }
            TxOutcome::Underrun => {
                self.regs.tsr = Tsr::FU;
                self.regs.isr.insert(Isr::TXE);
            }
        }
        trace!(
            instance = self.config.instance,
            tsr = self.regs.tsr.bits(),
            "dp8390: transmit complete"
        );
        self.update_irq();
    }

    /// Drops a pending transmission without reporting any status.
    pub(crate) fn cancel_transmit(&mut self) {
        if self.tx.outcome.take().is_some() {
            debug!(instance = self.config.instance, "dp8390: pending transmit canceled");
        }
        self.tx.deadline.cancel();
        self.regs.cr.remove(Cr::TXP);
    }
}

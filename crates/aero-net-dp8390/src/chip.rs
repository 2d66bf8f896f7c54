//! Chip state and the paged register file.

use tracing::{debug, trace, warn};

use crate::backend::NetworkBackend;
use crate::config::Dp8390Config;
use crate::dma::RemoteDma;
use crate::error::ConfigError;
use crate::irq::{line_level, InterruptLine, IrqSink};
use crate::memory::PacketMemory;
use crate::regs::*;
use crate::time::Clock;
use crate::tx::TxState;

/// Register file contents. Everything here is zeroed by a hard reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Registers {
    pub cr: Cr,
    pub isr: Isr,
    pub imr: Imr,
    pub dcr: Dcr,
    pub tcr: Tcr,
    pub tsr: Tsr,
    pub rcr: Rcr,
    pub rsr: Rsr,

    /// Current local DMA address (CLDA).
    pub local_dma: u16,
    pub page_start: u8,
    pub page_stop: u8,
    /// Boundary pointer (BNRY): last ring page the host has consumed.
    pub bound_ptr: u8,
    pub tx_page_start: u8,
    /// Collision count of the last transmission (NCR).
    pub ncr: u8,
    pub tx_bytes: u16,
    pub fifo: u8,

    /// Current remote DMA address (CRDA).
    pub remote_dma: u16,
    pub remote_start: u16,
    pub remote_bytes: u16,

    /// Frame alignment, CRC and missed-packet tally counters (CNTR0..CNTR2).
    pub tally: [u8; 3],

    pub physaddr: [u8; 6],
    pub curr_page: u8,
    pub mchash: [u8; 8],

    pub rempkt_ptr: u8,
    pub localpkt_ptr: u8,
    pub address_cnt: u16,
}

impl Registers {
    /// Power-up state: stopped, remote DMA idle, reset status pending, long addressing.
    pub fn power_on(mac: [u8; 6]) -> Self {
        Self {
            cr: Cr::STP.with_rdma_field(RdmaCmd::ABORT_FIELD),
            isr: Isr::RST,
            imr: Imr::empty(),
            dcr: Dcr::LAS,
            tcr: Tcr::empty(),
            tsr: Tsr::empty(),
            rcr: Rcr::empty(),
            rsr: Rsr::empty(),
            local_dma: 0,
            page_start: 0,
            page_stop: 0,
            bound_ptr: 0,
            tx_page_start: 0,
            ncr: 0,
            tx_bytes: 0,
            fifo: 0,
            remote_dma: 0,
            remote_start: 0,
            remote_bytes: 0,
            tally: [0; 3],
            physaddr: mac,
            curr_page: 0,
            mchash: [0; 8],
            rempkt_ptr: 0,
            localpkt_ptr: 0,
            address_cnt: 0,
        }
    }
}

/// A DP8390 network interface controller core.
///
/// `B` receives transmitted frames and may supply inbound ones; `I` is driven with interrupt line
/// transitions. The chip never blocks and owns no threads: the caller serializes register
/// accesses, [`Dp8390::receive_frame`], [`Dp8390::poll`] and [`Dp8390::tick`].
pub struct Dp8390<B = (), I = ()> {
    pub(crate) config: Dp8390Config,
    pub(crate) regs: Registers,
    pub(crate) mem: PacketMemory,
    pub(crate) rdma: RemoteDma,
    pub(crate) tx: TxState,
    pub(crate) clock: Clock,
    pub(crate) link_up: bool,
    line: InterruptLine,
    pub(crate) backend: B,
    irq: I,
}

impl<B, I> std::fmt::Debug for Dp8390<B, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dp8390")
            .field("instance", &self.config.instance)
            .field("regs", &self.regs)
            .field("rdma", &self.rdma)
            .field("tx", &self.tx)
            .field("now_ns", &self.clock.now_ns())
            .field("link_up", &self.link_up)
            .field("irq_asserted", &self.line.is_asserted())
            .finish_non_exhaustive()
    }
}

impl<B: NetworkBackend, I: IrqSink> Dp8390<B, I> {
    /// Allocates packet memory and brings the chip up in its power-on state.
    pub fn new(config: Dp8390Config, backend: B, irq: I) -> Result<Self, ConfigError> {
        let mem = PacketMemory::new(&config)?;
        let mut chip = Self {
            regs: Registers::power_on(config.mac),
            mem,
            rdma: RemoteDma::default(),
            tx: TxState::default(),
            clock: Clock::new(),
            link_up: true,
            line: InterruptLine::default(),
            backend,
            irq,
            config,
        };
        chip.reset();
        debug!(
            instance = chip.config.instance,
            mac = ?chip.config.mac,
            mem_start = chip.mem.start(),
            mem_end = chip.mem.end(),
            "dp8390: attached"
        );
        Ok(chip)
    }

    /// Hard (power-up) reset.
    ///
    /// Clears every register and the packet memory, rebuilds the address PROM, cancels pending
    /// transmit and remote DMA work, and leaves the chip stopped with ISR.RST set.
    pub fn reset(&mut self) {
        self.regs = Registers::power_on(self.config.mac);
        self.rdma = RemoteDma::default();
        self.tx = TxState::default();
        self.mem.clear();
        self.mem.load_prom(self.config.mac, self.config.even_mac);
        trace!(instance = self.config.instance, "dp8390: hard reset");
        self.update_irq();
    }

    /// Reset pulse from the board's reset port.
    ///
    /// Only interrupt status and in-flight work are affected; programmed registers, the MAC
    /// filter and the packet memory survive.
    pub fn soft_reset(&mut self) {
        self.regs.isr = Isr::RST;
        self.cancel_transmit();
        self.rdma.cancel();
        trace!(instance = self.config.instance, "dp8390: soft reset");
        self.update_irq();
    }

    /// Detaches the chip, lowering its interrupt line, and hands back the backend and sink.
    pub fn close(mut self) -> (B, I) {
        self.cancel_transmit();
        self.line.update(false, &mut self.irq);
        debug!(instance = self.config.instance, "dp8390: closed");
        (self.backend, self.irq)
    }

    /// Reads a register through the page currently selected by CR.PS.
    pub fn read(&mut self, offset: u8, size: u8) -> u32 {
        let page = self.regs.cr.page();
        self.read_page(page, offset, size)
    }

    /// Writes a register through the page currently selected by CR.PS.
    pub fn write(&mut self, offset: u8, size: u8, value: u32) {
        let page = self.regs.cr.page();
        self.write_page(page, offset, size, value);
    }

    /// Reads register `offset` of `page`.
    ///
    /// Registers are eight bits wide; wider accesses return the register zero-extended.
    pub fn read_page(&mut self, page: u8, offset: u8, size: u8) -> u32 {
        if size == 0 {
            return 0;
        }
        let offset = offset & (REG_COUNT - 1);
        let value = if offset == REG_CR {
            self.read_cr()
        } else {
            match page & 0x03 {
                0 => self.page0_read(offset),
                1 => self.page1_read(offset),
                2 => self.page2_read(offset),
                _ => {
                    trace!(
                        instance = self.config.instance,
                        offset,
                        "dp8390: page 3 read"
                    );
                    0
                }
            }
        };
        trace!(
            instance = self.config.instance,
            page,
            offset,
            size,
            value,
            "dp8390: register read"
        );
        u32::from(value)
    }

    /// Writes register `offset` of `page`. Only the low byte of `value` is used.
    pub fn write_page(&mut self, page: u8, offset: u8, size: u8, value: u32) {
        if size == 0 {
            return;
        }
        let offset = offset & (REG_COUNT - 1);
        let value = value as u8;
        trace!(
            instance = self.config.instance,
            page,
            offset,
            size,
            value,
            "dp8390: register write"
        );
        if offset == REG_CR {
            self.write_cr(value);
        } else {
            match page & 0x03 {
                0 => self.page0_write(offset, value),
                1 => self.page1_write(offset, value),
                2 => self.page2_write(offset, value),
                _ => trace!(
                    instance = self.config.instance,
                    offset,
                    "dp8390: page 3 write ignored"
                ),
            }
        }
        self.update_irq();
    }

    pub(crate) fn read_cr(&self) -> u8 {
        self.regs.cr.bits()
    }

    pub(crate) fn write_cr(&mut self, value: u8) {
        let mut cr = Cr::from_bits_retain(value);
        if cr.rdma_field() == 0 {
            debug!(
                instance = self.config.instance,
                value, "dp8390: CR write with remote DMA field 0, treating as abort"
            );
            cr = cr.with_rdma_field(RdmaCmd::ABORT_FIELD);
        }

        let was_started = self.regs.cr.contains(Cr::STA);
        let prev_rdma = self.regs.cr.rdma_field();

        // TXP is cleared by the transmitter, never by the host.
        let mut next = cr & (Cr::STP | Cr::STA | Cr::RD | Cr::PS);
        next.set(Cr::TXP, self.regs.cr.contains(Cr::TXP));
        self.regs.cr = next;

        if cr.contains(Cr::STP) {
            self.regs.isr.insert(Isr::RST);
            self.cancel_transmit();
            if self.rdma.state.is_active() {
                debug!(
                    instance = self.config.instance,
                    remaining = self.rdma.remaining,
                    "dp8390: stop command cancels remote DMA"
                );
            }
            self.rdma.cancel();
        } else {
            if cr.contains(Cr::STA) && !was_started {
                self.regs.isr.remove(Isr::RST);
            }
            // Rewriting CR with the running command (e.g. to switch pages) keeps the transfer.
            if !(self.rdma.state.is_active() && cr.rdma_field() == prev_rdma) {
                self.start_remote_dma(cr.rdma_cmd());
            }
        }

        if cr.contains(Cr::TXP) {
            self.start_transmit();
        }
    }

    fn page0_read(&mut self, offset: u8) -> u8 {
        let regs = &mut self.regs;
        match offset {
            P0_CLDA0 => regs.local_dma as u8,
            P0_CLDA1 => (regs.local_dma >> 8) as u8,
            P0_BNRY => regs.bound_ptr,
            P0_TSR => regs.tsr.bits(),
            P0_NCR => regs.ncr,
            P0_FIFO => regs.fifo,
            P0_ISR => regs.isr.bits(),
            P0_CRDA0 => regs.remote_dma as u8,
            P0_CRDA1 => (regs.remote_dma >> 8) as u8,
            P0_ID0 => self.config.id0,
            P0_ID1 => self.config.id1,
            P0_RSR => regs.rsr.bits(),
            // Tally counters clear when read.
            P0_CNTR0..=P0_CNTR2 => std::mem::take(&mut regs.tally[usize::from(offset - P0_CNTR0)]),
            _ => 0,
        }
    }

    fn page0_write(&mut self, offset: u8, value: u8) {
        let instance = self.config.instance;
        let regs = &mut self.regs;
        match offset {
            P0_PSTART => regs.page_start = value,
            P0_PSTOP => regs.page_stop = value,
            P0_BNRY => regs.bound_ptr = value,
            P0_TPSR => regs.tx_page_start = value,
            P0_TBCR0 => regs.tx_bytes = (regs.tx_bytes & 0xFF00) | u16::from(value),
            P0_TBCR1 => regs.tx_bytes = (regs.tx_bytes & 0x00FF) | (u16::from(value) << 8),
            P0_ISR => regs
                .isr
                .remove(Isr::from_bits_retain(value) & Isr::MASKABLE),
            P0_RSAR0 => {
                regs.remote_start = (regs.remote_start & 0xFF00) | u16::from(value);
                regs.remote_dma = regs.remote_start;
            }
            P0_RSAR1 => {
                regs.remote_start = (regs.remote_start & 0x00FF) | (u16::from(value) << 8);
                regs.remote_dma = regs.remote_start;
            }
            P0_RBCR0 => regs.remote_bytes = (regs.remote_bytes & 0xFF00) | u16::from(value),
            P0_RBCR1 => {
                regs.remote_bytes = (regs.remote_bytes & 0x00FF) | (u16::from(value) << 8)
            }
            P0_RCR => {
                if value & 0xC0 != 0 {
                    debug!(instance, value, "dp8390: RCR write with reserved bits set");
                }
                regs.rcr = Rcr::from_bits_truncate(value);
                if regs.rcr.contains(Rcr::MON) {
                    debug!(instance, "dp8390: monitor mode enabled");
                }
            }
            P0_TCR => {
                if value & 0xE0 != 0 {
                    debug!(instance, value, "dp8390: TCR write with reserved bits set");
                }
                regs.tcr = Tcr::from_bits_truncate(value);
                if regs.tcr.loopback() != 0 {
                    debug!(
                        instance,
                        mode = regs.tcr.loopback(),
                        "dp8390: transmit loopback selected"
                    );
                }
            }
            P0_DCR => {
                regs.dcr = Dcr::from_bits_truncate(value);
                if !regs.dcr.contains(Dcr::LS) {
                    debug!(instance, "dp8390: DCR loopback select active, receiver off-line");
                }
            }
            P0_IMR => {
                if value & 0x80 != 0 {
                    debug!(instance, "dp8390: IMR write with reserved bit set");
                }
                regs.imr = Imr::from_bits_truncate(value);
            }
            _ => {}
        }
    }

    fn page1_read(&self, offset: u8) -> u8 {
        match offset {
            P1_PAR0..=P1_PAR5 => self.regs.physaddr[usize::from(offset - P1_PAR0)],
            P1_CURR => self.regs.curr_page,
            P1_MAR0..=P1_MAR7 => self.regs.mchash[usize::from(offset - P1_MAR0)],
            _ => 0,
        }
    }

    fn page1_write(&mut self, offset: u8, value: u8) {
        match offset {
            P1_PAR0..=P1_PAR5 => {
                self.regs.physaddr[usize::from(offset - P1_PAR0)] = value;
                if offset == P1_PAR5 {
                    debug!(
                        instance = self.config.instance,
                        physaddr = ?self.regs.physaddr,
                        "dp8390: station address programmed"
                    );
                }
            }
            P1_CURR => self.regs.curr_page = value,
            P1_MAR0..=P1_MAR7 => self.regs.mchash[usize::from(offset - P1_MAR0)] = value,
            _ => {}
        }
    }

    fn page2_read(&self, offset: u8) -> u8 {
        let regs = &self.regs;
        match offset {
            P2_PSTART => regs.page_start,
            P2_PSTOP => regs.page_stop,
            P2_RNPP => regs.rempkt_ptr,
            P2_TPSR => regs.tx_page_start,
            P2_LNPP => regs.localpkt_ptr,
            P2_ADDR_HI => (regs.address_cnt >> 8) as u8,
            P2_ADDR_LO => regs.address_cnt as u8,
            P2_RCR => regs.rcr.bits(),
            P2_TCR => regs.tcr.bits(),
            P2_DCR => regs.dcr.bits(),
            P2_IMR => regs.imr.bits(),
            // Reserved.
            _ => 0xFF,
        }
    }

    fn page2_write(&mut self, offset: u8, value: u8) {
        let regs = &mut self.regs;
        match offset {
            P2_CLDA0 => regs.local_dma = (regs.local_dma & 0xFF00) | u16::from(value),
            P2_CLDA1 => regs.local_dma = (regs.local_dma & 0x00FF) | (u16::from(value) << 8),
            P2_RNPP => regs.rempkt_ptr = value,
            P2_LNPP => regs.localpkt_ptr = value,
            P2_ADDR_HI => regs.address_cnt = (regs.address_cnt & 0x00FF) | (u16::from(value) << 8),
            P2_ADDR_LO => regs.address_cnt = (regs.address_cnt & 0xFF00) | u16::from(value),
            _ => warn!(
                instance = self.config.instance,
                offset, value, "dp8390: write to reserved page 2 register ignored"
            ),
        }
    }

    /// Whether the chip is started and not stopped.
    pub fn is_running(&self) -> bool {
        self.regs.cr.contains(Cr::STA) && !self.regs.cr.contains(Cr::STP)
    }

    /// Current level of the interrupt output.
    pub fn line_active(&self) -> bool {
        line_level(self.regs.isr, self.regs.imr)
    }

    pub(crate) fn update_irq(&mut self) {
        let level = self.line_active();
        self.line.update(level, &mut self.irq);
    }

    /// Drives the sink to the current line level regardless of the last transition seen.
    ///
    /// Intended for restore flows: loading a snapshot restores ISR/IMR but cannot know what the
    /// external interrupt controller currently latches.
    pub fn sync_irq(&mut self) {
        let level = self.line_active();
        self.line.resync(level, &mut self.irq);
    }

    /// Drains up to `max_frames` inbound frames from the backend into the receive engine.
    ///
    /// Returns the number of frames pulled from the backend, stored or not.
    pub fn poll(&mut self, max_frames: usize) -> usize {
        let mut pulled = 0;
        while pulled < max_frames {
            let Some(frame) = self.backend.poll_receive() else {
                break;
            };
            self.receive_frame(&frame);
            pulled += 1;
        }
        pulled
    }
}

impl<B, I> Dp8390<B, I> {
    pub fn config(&self) -> &Dp8390Config {
        &self.config
    }

    pub fn instance(&self) -> u32 {
        self.config.instance
    }

    pub fn memory(&self) -> &PacketMemory {
        &self.mem
    }

    pub fn memory_mut(&mut self) -> &mut PacketMemory {
        &mut self.mem
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn irq_sink(&self) -> &I {
        &self.irq
    }

    pub fn irq_sink_mut(&mut self) -> &mut I {
        &mut self.irq
    }

    pub fn now_ns(&self) -> u64 {
        self.clock.now_ns()
    }

    pub fn cr(&self) -> Cr {
        self.regs.cr
    }

    pub fn isr(&self) -> Isr {
        self.regs.isr
    }

    pub fn imr(&self) -> Imr {
        self.regs.imr
    }

    pub fn tsr(&self) -> Tsr {
        self.regs.tsr
    }

    pub fn rsr(&self) -> Rsr {
        self.regs.rsr
    }

    pub fn station_address(&self) -> [u8; 6] {
        self.regs.physaddr
    }

    pub fn curr_page(&self) -> u8 {
        self.regs.curr_page
    }

    pub fn boundary(&self) -> u8 {
        self.regs.bound_ptr
    }

    /// Tally counters without the clear-on-read side effect.
    pub fn tally_counters(&self) -> [u8; 3] {
        self.regs.tally
    }
}

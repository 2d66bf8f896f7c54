//! DP8390 register offsets and bit layouts.
//!
//! Register numbering follows the National Semiconductor DP8390D datasheet. Every register is
//! modeled as a plain integer with named bit masks; multi-bit fields (remote DMA command, page
//! select, loopback control, FIFO threshold) are extracted through accessor methods.

use bitflags::bitflags;

/// Size of a packet-memory page (the ring buffer and transmit buffers are page-granular).
pub const PAGE_SIZE: usize = 256;

/// Number of register offsets per page.
pub const REG_COUNT: u8 = 0x10;

/// Command register; mapped at offset 0 on every page.
pub const REG_CR: u8 = 0x00;

// Page 0, read side.
pub const P0_CLDA0: u8 = 0x01;
pub const P0_CLDA1: u8 = 0x02;
pub const P0_BNRY: u8 = 0x03;
pub const P0_TSR: u8 = 0x04;
pub const P0_NCR: u8 = 0x05;
pub const P0_FIFO: u8 = 0x06;
pub const P0_ISR: u8 = 0x07;
pub const P0_CRDA0: u8 = 0x08;
pub const P0_CRDA1: u8 = 0x09;
pub const P0_ID0: u8 = 0x0A;
pub const P0_ID1: u8 = 0x0B;
pub const P0_RSR: u8 = 0x0C;
pub const P0_CNTR0: u8 = 0x0D;
pub const P0_CNTR1: u8 = 0x0E;
pub const P0_CNTR2: u8 = 0x0F;

// Page 0, write side.
pub const P0_PSTART: u8 = 0x01;
pub const P0_PSTOP: u8 = 0x02;
pub const P0_TPSR: u8 = 0x04;
pub const P0_TBCR0: u8 = 0x05;
pub const P0_TBCR1: u8 = 0x06;
pub const P0_RSAR0: u8 = 0x08;
pub const P0_RSAR1: u8 = 0x09;
pub const P0_RBCR0: u8 = 0x0A;
pub const P0_RBCR1: u8 = 0x0B;
pub const P0_RCR: u8 = 0x0C;
pub const P0_TCR: u8 = 0x0D;
pub const P0_DCR: u8 = 0x0E;
pub const P0_IMR: u8 = 0x0F;

// Page 1.
pub const P1_PAR0: u8 = 0x01;
pub const P1_PAR5: u8 = 0x06;
pub const P1_CURR: u8 = 0x07;
pub const P1_MAR0: u8 = 0x08;
pub const P1_MAR7: u8 = 0x0F;

// Page 2 (diagnostic). Offsets 0x01/0x02 read back PSTART/PSTOP but write CLDA.
pub const P2_CLDA0: u8 = 0x01;
pub const P2_CLDA1: u8 = 0x02;
pub const P2_PSTART: u8 = 0x01;
pub const P2_PSTOP: u8 = 0x02;
pub const P2_RNPP: u8 = 0x03;
pub const P2_TPSR: u8 = 0x04;
pub const P2_LNPP: u8 = 0x05;
pub const P2_ADDR_HI: u8 = 0x06;
pub const P2_ADDR_LO: u8 = 0x07;
pub const P2_RCR: u8 = 0x0C;
pub const P2_TCR: u8 = 0x0D;
pub const P2_DCR: u8 = 0x0E;
pub const P2_IMR: u8 = 0x0F;

bitflags! {
    /// Command register (CR, offset 0x00 on every page).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Cr: u8 {
        /// STP: software reset / stop.
        const STP = 0x01;
        /// STA: start the NIC.
        const STA = 0x02;
        /// TXP: transmit packet.
        const TXP = 0x04;
        /// RD0..RD2: remote DMA command field.
        const RD = 0x38;
        /// PS0..PS1: register page select field.
        const PS = 0xC0;
    }
}

impl Cr {
    const RD_SHIFT: u8 = 3;
    const PS_SHIFT: u8 = 6;

    pub fn rdma_field(self) -> u8 {
        (self.bits() & Self::RD.bits()) >> Self::RD_SHIFT
    }

    pub fn rdma_cmd(self) -> RdmaCmd {
        RdmaCmd::from_field(self.rdma_field())
    }

    pub fn page(self) -> u8 {
        (self.bits() & Self::PS.bits()) >> Self::PS_SHIFT
    }

    pub fn with_rdma_field(self, field: u8) -> Self {
        Self::from_bits_retain(
            (self.bits() & !Self::RD.bits()) | ((field << Self::RD_SHIFT) & Self::RD.bits()),
        )
    }
}

/// Remote DMA command encoded in CR bits 3..5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdmaCmd {
    Read,
    Write,
    SendPacket,
    /// Abort/complete remote DMA. Any encoding with RD2 set selects this.
    Abort,
}

impl RdmaCmd {
    /// CR field value the chip substitutes for an (invalid) all-zero command.
    pub const ABORT_FIELD: u8 = 0x04;

    pub fn from_field(field: u8) -> Self {
        match field & 0x07 {
            0x01 => Self::Read,
            0x02 => Self::Write,
            0x03 => Self::SendPacket,
            _ => Self::Abort,
        }
    }
}

bitflags! {
    /// Interrupt status register (ISR). Bits are write-1-to-clear; RST is status-only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Isr: u8 {
        const PRX = 0x01;
        const PTX = 0x02;
        const RXE = 0x04;
        const TXE = 0x08;
        const OVW = 0x10;
        const CNT = 0x20;
        const RDC = 0x40;
        const RST = 0x80;
    }
}

impl Isr {
    /// Bits that participate in interrupt generation and can be cleared by the host.
    pub const MASKABLE: Self = Self::from_bits_retain(0x7F);
}

bitflags! {
    /// Interrupt mask register (IMR). Bit positions mirror [`Isr`]; D7 is reserved.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Imr: u8 {
        const PRXE = 0x01;
        const PTXE = 0x02;
        const RXEE = 0x04;
        const TXEE = 0x08;
        const OVWE = 0x10;
        const CNTE = 0x20;
        const RDCE = 0x40;
    }
}

bitflags! {
    /// Data configuration register (DCR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Dcr: u8 {
        /// WTS: word transfer select (16-bit data port).
        const WTS = 0x01;
        /// BOS: byte order select.
        const BOS = 0x02;
        /// LAS: long address select.
        const LAS = 0x04;
        /// LS: loopback select. Clear selects loopback, set selects normal operation.
        const LS = 0x08;
        /// AR: auto-initialize remote.
        const AR = 0x10;
        /// FT0..FT1: FIFO threshold.
        const FT = 0x60;
    }
}

impl Dcr {
    pub fn word_mode(self) -> bool {
        self.contains(Self::WTS)
    }

    pub fn fifo_threshold(self) -> u8 {
        (self.bits() & Self::FT.bits()) >> 5
    }
}

bitflags! {
    /// Transmit configuration register (TCR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tcr: u8 {
        /// CRC: inhibit CRC generation.
        const CRC = 0x01;
        /// LB0..LB1: loopback control.
        const LB = 0x06;
        /// ATD: auto transmit disable.
        const ATD = 0x08;
        /// OFST: collision offset enable.
        const OFST = 0x10;
    }
}

impl Tcr {
    /// Loopback mode: 0 = normal, 1 = internal, 2 = external via ENDEC, 3 = external.
    pub fn loopback(self) -> u8 {
        (self.bits() & Self::LB.bits()) >> 1
    }
}

bitflags! {
    /// Transmit status register (TSR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tsr: u8 {
        const PTX = 0x01;
        const COL = 0x04;
        const ABT = 0x08;
        const CRS = 0x10;
        const FU = 0x20;
        const CDH = 0x40;
        const OWC = 0x80;
    }
}

bitflags! {
    /// Receive configuration register (RCR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Rcr: u8 {
        /// SEP: save error packets.
        const SEP = 0x01;
        /// AR: accept runt packets.
        const AR = 0x02;
        /// AB: accept broadcast.
        const AB = 0x04;
        /// AM: accept multicast (hash filtered).
        const AM = 0x08;
        /// PRO: promiscuous physical.
        const PRO = 0x10;
        /// MON: monitor mode.
        const MON = 0x20;
    }
}

bitflags! {
    /// Receive status register (RSR). Also used as the status byte of the receive header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Rsr: u8 {
        const PRX = 0x01;
        const CRC = 0x02;
        const FAE = 0x04;
        const FO = 0x08;
        const MPA = 0x10;
        const PHY = 0x20;
        const DIS = 0x40;
        const DFR = 0x80;
    }
}

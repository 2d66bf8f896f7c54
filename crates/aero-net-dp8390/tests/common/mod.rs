#![allow(dead_code)]

use std::collections::VecDeque;

use aero_net_dp8390::regs::*;
use aero_net_dp8390::{Dp8390, Dp8390Config, IrqSink, NetworkBackend, TxTiming};

pub const MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
pub const PEER: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

pub const RING_START: u8 = 0x46;
pub const RING_STOP: u8 = 0x80;
pub const TX_PAGE: u8 = 0x40;

/// Interrupt sink that records every transition.
#[derive(Debug, Default)]
pub struct IrqLog {
    events: Vec<bool>,
    level: bool,
}

impl IrqLog {
    pub fn take_events(&mut self) -> Vec<bool> {
        std::mem::take(&mut self.events)
    }

    pub fn level(&self) -> bool {
        self.level
    }
}

impl IrqSink for IrqLog {
    fn raise_irq(&mut self) {
        self.level = true;
        self.events.push(true);
    }

    fn lower_irq(&mut self) {
        self.level = false;
        self.events.push(false);
    }
}

#[derive(Debug, Default)]
pub struct CaptureBackend {
    pub tx: Vec<Vec<u8>>,
    pub rx: VecDeque<Vec<u8>>,
}

impl NetworkBackend for CaptureBackend {
    fn transmit(&mut self, frame: Vec<u8>) {
        self.tx.push(frame);
    }

    fn poll_receive(&mut self) -> Option<Vec<u8>> {
        self.rx.pop_front()
    }
}

pub type Nic = Dp8390<CaptureBackend, IrqLog>;

pub fn config() -> Dp8390Config {
    Dp8390Config {
        mac: MAC,
        tx_timing: TxTiming::default(),
        ..Dp8390Config::default()
    }
}

pub fn new_nic() -> Nic {
    Dp8390::new(config(), CaptureBackend::default(), IrqLog::default()).unwrap()
}

/// Programs the chip the way an NE2000 driver does on open: byte-wide DMA, receive ring at
/// `RING_START..RING_STOP`, station address `MAC`, then start.
pub fn bring_up(nic: &mut Nic, rcr: u8, imr: u8) {
    nic.write(REG_CR, 1, 0x21);
    nic.write(P0_DCR, 1, 0x48);
    nic.write(P0_RBCR0, 1, 0);
    nic.write(P0_RBCR1, 1, 0);
    nic.write(P0_RCR, 1, u32::from(rcr));
    nic.write(P0_TCR, 1, 0x02);
    nic.write(P0_TPSR, 1, u32::from(TX_PAGE));
    nic.write(P0_PSTART, 1, u32::from(RING_START));
    nic.write(P0_BNRY, 1, u32::from(RING_START));
    nic.write(P0_PSTOP, 1, u32::from(RING_STOP));
    nic.write(P0_ISR, 1, 0xFF);
    nic.write(P0_IMR, 1, u32::from(imr));

    nic.write(REG_CR, 1, 0x61);
    for (i, byte) in MAC.iter().enumerate() {
        nic.write(P1_PAR0 + i as u8, 1, u32::from(*byte));
    }
    nic.write(P1_CURR, 1, u32::from(RING_START + 1));

    nic.write(REG_CR, 1, 0x22);
    nic.write(P0_TCR, 1, 0x00);
}

pub fn set_remote<B: NetworkBackend, I: IrqSink>(nic: &mut Dp8390<B, I>, addr: u16, count: u16) {
    nic.write(P0_RSAR0, 1, u32::from(addr & 0xFF));
    nic.write(P0_RSAR1, 1, u32::from(addr >> 8));
    nic.write(P0_RBCR0, 1, u32::from(count & 0xFF));
    nic.write(P0_RBCR1, 1, u32::from(count >> 8));
}

/// Copies `data` into packet memory through the remote DMA data port, byte-wide.
pub fn remote_write(nic: &mut Nic, addr: u16, data: &[u8]) {
    set_remote(nic, addr, data.len() as u16);
    nic.write(REG_CR, 1, 0x12);
    for byte in data {
        nic.data_write(1, u32::from(*byte));
    }
}

/// Reads `len` bytes of packet memory through the remote DMA data port, byte-wide.
pub fn remote_read(nic: &mut Nic, addr: u16, len: u16) -> Vec<u8> {
    set_remote(nic, addr, len);
    nic.write(REG_CR, 1, 0x0A);
    (0..len).map(|_| nic.data_read(1) as u8).collect()
}

pub fn frame(dst: [u8; 6], len: usize) -> Vec<u8> {
    let mut frame = vec![0u8; len];
    frame[..6].copy_from_slice(&dst);
    frame[6..12].copy_from_slice(&PEER);
    frame[12] = 0x08;
    for (i, byte) in frame.iter_mut().enumerate().skip(14) {
        *byte = i as u8;
    }
    frame
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

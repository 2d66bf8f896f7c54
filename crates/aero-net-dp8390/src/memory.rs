//! On-chip packet buffer and address PROM.
//!
//! The chip sees a 16-bit address space. The packet buffer occupies `[start, end)`; addresses
//! below the buffer alias the station-address PROM; everything else reads back as open bus.

use tracing::trace;

use crate::config::{Dp8390Config, PacketMemoryLayout};
use crate::error::ConfigError;

/// Filler byte stored in the PROM after the station address.
pub const PROM_SIGNATURE: u8 = 0x57;

/// Value returned for addresses that decode to nothing.
const OPEN_BUS: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct PacketMemory {
    layout: PacketMemoryLayout,
    wrap: u32,
    ram: Vec<u8>,
    prom: [u8; 32],
    prom_size: usize,
}

impl PacketMemory {
    pub fn new(config: &Dp8390Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let size = config.memory.size as usize;
        let mut ram = Vec::new();
        ram.try_reserve_exact(size)
            .map_err(|_| ConfigError::AllocationFailed { size })?;
        ram.resize(size, 0);

        let mut mem = Self {
            layout: config.memory,
            wrap: config.memory.effective_wrap(),
            ram,
            prom: [0; 32],
            prom_size: config.prom_size(),
        };
        mem.load_prom(config.mac, config.even_mac);
        Ok(mem)
    }

    /// Rebuilds the PROM image: the station address (each byte doubled in even-MAC mode)
    /// followed by the signature byte.
    pub fn load_prom(&mut self, mac: [u8; 6], even_mac: bool) {
        let shift = usize::from(even_mac);
        self.prom_size = 16 << shift;
        for (i, byte) in self.prom[..self.prom_size].iter_mut().enumerate() {
            *byte = if i < (6 << shift) {
                mac[i >> shift]
            } else {
                PROM_SIGNATURE
            };
        }
    }

    pub fn prom(&self) -> &[u8] {
        &self.prom[..self.prom_size]
    }

    pub fn layout(&self) -> PacketMemoryLayout {
        self.layout
    }

    pub fn start(&self) -> u32 {
        self.layout.start
    }

    pub fn end(&self) -> u32 {
        self.layout.end()
    }

    pub fn wrap(&self) -> u32 {
        self.wrap
    }

    pub fn clear(&mut self) {
        self.ram.fill(0);
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    /// Index into the backing RAM for a chip address, if it decodes to the packet buffer.
    fn ram_index(&self, addr: u32) -> Option<usize> {
        let addr = addr % self.wrap;
        if addr >= self.layout.start && addr < self.layout.end() {
            Some((addr - self.layout.start) as usize)
        } else {
            None
        }
    }

    /// Whether `len` bytes starting at `addr` all decode to the packet buffer.
    pub fn contains_range(&self, addr: u32, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        let Some(first) = self.ram_index(addr) else {
            return false;
        };
        first + len <= self.ram.len()
    }

    pub fn read_u8(&self, addr: u32) -> u8 {
        if let Some(idx) = self.ram_index(addr) {
            return self.ram[idx];
        }
        let addr = (addr % self.wrap) as usize;
        if addr < self.prom_size {
            return self.prom[addr];
        }
        trace!(addr, "dp8390: out-of-bounds chipmem read");
        OPEN_BUS
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) {
        match self.ram_index(addr) {
            Some(idx) => self.ram[idx] = value,
            None => trace!(addr, value, "dp8390: out-of-bounds chipmem write discarded"),
        }
    }

    /// Little-endian read of `len` (1..=4) bytes.
    pub fn chipmem_read(&self, addr: u32, len: usize) -> u32 {
        let mut value = 0u32;
        for i in 0..len.min(4) {
            let byte = self.read_u8(addr.wrapping_add(i as u32));
            value |= u32::from(byte) << (i * 8);
        }
        value
    }

    /// Little-endian write of `len` (1..=4) bytes.
    pub fn chipmem_write(&mut self, addr: u32, value: u32, len: usize) {
        for i in 0..len.min(4) {
            self.write_u8(addr.wrapping_add(i as u32), (value >> (i * 8)) as u8);
        }
    }

    pub fn read_bytes(&self, addr: u32, out: &mut [u8]) {
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = self.read_u8(addr.wrapping_add(i as u32));
        }
    }
}

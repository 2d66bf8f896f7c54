//! Per-instance chip configuration.
//!
//! The outer adapter (NE2000, WD8003, 3C503, ...) picks the packet-memory window, ID bytes and
//! PROM layout; this crate only validates and applies them.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::regs::PAGE_SIZE;

/// Chip-visible address space is 16 bits wide.
const CHIP_ADDRESS_SPACE: u32 = 0x1_0000;

/// Placement of the on-chip packet memory in the chip's address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketMemoryLayout {
    pub start: u32,
    pub size: u32,
    /// Addresses are reduced modulo `wrap` before decoding. `None` selects the smallest power
    /// of two covering the memory window.
    #[serde(default)]
    pub wrap: Option<u32>,
}

impl PacketMemoryLayout {
    /// 8KiB buffer at 8KiB (8-bit boards such as the NE1000 and WD8003).
    pub const BYTE: Self = Self::new(8 * 1024, 8 * 1024);
    /// 16KiB buffer at 8KiB.
    pub const WORD: Self = Self::new(8 * 1024, 16 * 1024);
    /// 32KiB buffer at 16KiB (NE2000-class boards).
    pub const DWORD: Self = Self::new(16 * 1024, 32 * 1024);

    pub const fn new(start: u32, size: u32) -> Self {
        Self {
            start,
            size,
            wrap: None,
        }
    }

    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.size)
    }

    pub fn effective_wrap(&self) -> u32 {
        self.wrap
            .unwrap_or_else(|| self.end().max(1).next_power_of_two())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::EmptyMemory);
        }
        let page = PAGE_SIZE as u32;
        if self.start % page != 0 || self.size % page != 0 {
            return Err(ConfigError::UnalignedMemory {
                start: self.start,
                size: self.size,
            });
        }
        let end = self.end();
        if end > CHIP_ADDRESS_SPACE {
            return Err(ConfigError::MemoryOutOfRange { end });
        }
        let wrap = self.effective_wrap();
        if !wrap.is_power_of_two() || wrap < end || wrap > CHIP_ADDRESS_SPACE {
            return Err(ConfigError::InvalidWrap { wrap, end });
        }
        Ok(())
    }
}

impl Default for PacketMemoryLayout {
    fn default() -> Self {
        Self::DWORD
    }
}

/// Transmit completion latency model.
///
/// The completion delay for a frame of `n` bytes is `base_ns + n * ns_per_byte`. The default
/// approximates 10 Mbit/s wire time plus preamble and interframe gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxTiming {
    pub base_ns: u64,
    pub ns_per_byte: u64,
}

impl TxTiming {
    pub const fn immediate() -> Self {
        Self {
            base_ns: 0,
            ns_per_byte: 0,
        }
    }

    pub fn completion_delay_ns(&self, len: usize) -> u64 {
        self.base_ns
            .saturating_add(self.ns_per_byte.saturating_mul(len as u64))
    }
}

impl Default for TxTiming {
    fn default() -> Self {
        Self {
            base_ns: 16_000,
            ns_per_byte: 800,
        }
    }
}

/// Configuration for one DP8390 instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dp8390Config {
    /// Identifier assigned by the owning device registry; attached to log records.
    pub instance: u32,
    /// Station address burned into the address PROM and loaded into PAR0..PAR5.
    pub mac: [u8; 6],
    pub memory: PacketMemoryLayout,
    /// Duplicate every PROM byte (32-byte image) as seen by 16-bit NE2000 boards.
    pub even_mac: bool,
    /// Values returned from page-0 offsets 0x0A/0x0B.
    pub id0: u8,
    pub id1: u8,
    pub tx_timing: TxTiming,
}

impl Default for Dp8390Config {
    fn default() -> Self {
        Self {
            instance: 0,
            mac: [0x00, 0x00, 0xD8, 0x00, 0x00, 0x01],
            memory: PacketMemoryLayout::default(),
            even_mac: false,
            id0: 0xFF,
            id1: 0xFF,
            tx_timing: TxTiming::default(),
        }
    }
}

impl Dp8390Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.memory.validate()
    }

    /// Size of the address PROM image in bytes.
    pub fn prom_size(&self) -> usize {
        if self.even_mac {
            32
        } else {
            16
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        for layout in [
            PacketMemoryLayout::BYTE,
            PacketMemoryLayout::WORD,
            PacketMemoryLayout::DWORD,
        ] {
            layout.validate().unwrap();
        }
        assert_eq!(PacketMemoryLayout::DWORD.effective_wrap(), 0x1_0000);
        assert_eq!(PacketMemoryLayout::WORD.effective_wrap(), 0x8000);
        assert_eq!(PacketMemoryLayout::BYTE.effective_wrap(), 0x4000);
    }

    #[test]
    fn rejects_bad_layouts() {
        assert_eq!(
            PacketMemoryLayout::new(0x4000, 0).validate(),
            Err(ConfigError::EmptyMemory)
        );
        assert_eq!(
            PacketMemoryLayout::new(0x4010, 0x100).validate(),
            Err(ConfigError::UnalignedMemory {
                start: 0x4010,
                size: 0x100
            })
        );
        assert_eq!(
            PacketMemoryLayout::new(0xC000, 0x8000).validate(),
            Err(ConfigError::MemoryOutOfRange { end: 0x1_4000 })
        );
        let layout = PacketMemoryLayout {
            start: 0x4000,
            size: 0x4000,
            wrap: Some(0x6000),
        };
        assert_eq!(
            layout.validate(),
            Err(ConfigError::InvalidWrap {
                wrap: 0x6000,
                end: 0x8000
            })
        );
    }

    #[test]
    fn tx_timing_scales_with_length() {
        let timing = TxTiming {
            base_ns: 100,
            ns_per_byte: 10,
        };
        assert_eq!(timing.completion_delay_ns(60), 700);
        assert_eq!(TxTiming::immediate().completion_delay_ns(1500), 0);
    }
}

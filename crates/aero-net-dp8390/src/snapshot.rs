//! Deterministic snapshot encoding for the chip.
//!
//! The format is a small tag-length-value (TLV) encoding:
//! - a fixed header (`AERO` magic, format version, device id, device version)
//! - fields as `tag: u16`, `len: u32`, `len` value bytes, all little-endian
//!
//! Writers emit fields in ascending tag order so output is byte-for-byte reproducible. Readers
//! skip unknown tags, which lets newer minor versions add fields without breaking older readers.

use std::collections::BTreeMap;

use crate::backend::NetworkBackend;
use crate::chip::{Dp8390, Registers};
use crate::dma::{RdmaState, RemoteDma};
use crate::error::{SnapshotError, SnapshotResult};
use crate::irq::IrqSink;
use crate::regs::{Cr, Dcr, Imr, Isr, Rcr, Rsr, Tcr, Tsr};
use crate::time::{Clock, Deadline};
use crate::tx::{TxOutcome, TxState};

const MAGIC: [u8; 4] = *b"AERO";
const FORMAT_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);
const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotVersion {
    pub major: u16,
    pub minor: u16,
}

impl SnapshotVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

/// Snapshotting contract for emulated devices.
///
/// `DEVICE_ID` must stay stable; forward-compatible additions within a major version are made by
/// adding new TLV fields.
pub trait IoSnapshot {
    const DEVICE_ID: [u8; 4];
    const DEVICE_VERSION: SnapshotVersion;

    fn save_state(&self) -> Vec<u8>;
    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()>;
}

pub struct SnapshotWriter {
    header: Vec<u8>,
    fields: BTreeMap<u16, Vec<u8>>,
}

impl SnapshotWriter {
    pub fn new(device_id: [u8; 4], version: SnapshotVersion) -> Self {
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(&MAGIC);
        header.extend_from_slice(&FORMAT_VERSION.major.to_le_bytes());
        header.extend_from_slice(&FORMAT_VERSION.minor.to_le_bytes());
        header.extend_from_slice(&device_id);
        header.extend_from_slice(&version.major.to_le_bytes());
        header.extend_from_slice(&version.minor.to_le_bytes());
        Self {
            header,
            fields: BTreeMap::new(),
        }
    }

    pub fn field_bytes(&mut self, tag: u16, value: Vec<u8>) {
        self.fields.insert(tag, value);
    }

    pub fn field_u8(&mut self, tag: u16, value: u8) {
        self.field_bytes(tag, vec![value]);
    }

    pub fn field_u16(&mut self, tag: u16, value: u16) {
        self.field_bytes(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_u32(&mut self, tag: u16, value: u32) {
        self.field_bytes(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_u64(&mut self, tag: u16, value: u64) {
        self.field_bytes(tag, value.to_le_bytes().to_vec());
    }

    pub fn field_bool(&mut self, tag: u16, value: bool) {
        self.field_u8(tag, u8::from(value));
    }

    pub fn finish(self) -> Vec<u8> {
        let body: usize = self.fields.values().map(|v| 6 + v.len()).sum();
        let mut out = self.header;
        out.reserve(body);
        for (tag, value) in self.fields {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&(value.len() as u32).to_le_bytes());
            out.extend_from_slice(&value);
        }
        out
    }
}

pub struct SnapshotReader<'a> {
    device_version: SnapshotVersion,
    fields: BTreeMap<u16, &'a [u8]>,
}

impl<'a> SnapshotReader<'a> {
    pub fn parse(bytes: &'a [u8], device_id: [u8; 4]) -> SnapshotResult<Self> {
        let mut d = Decoder::new(bytes);
        if d.array::<4>()? != MAGIC {
            return Err(SnapshotError::InvalidMagic);
        }
        let format_major = d.u16()?;
        let _format_minor = d.u16()?;
        if format_major != FORMAT_VERSION.major {
            return Err(SnapshotError::UnsupportedVersion {
                expected: FORMAT_VERSION.major,
                found: format_major,
            });
        }
        let found = d.array::<4>()?;
        if found != device_id {
            return Err(SnapshotError::DeviceIdMismatch {
                expected: device_id,
                found,
            });
        }
        let device_version = SnapshotVersion::new(d.u16()?, d.u16()?);

        let mut fields = BTreeMap::new();
        while !d.is_empty() {
            let tag = d.u16()?;
            let len = d.u32()? as usize;
            let value = d.bytes(len)?;
            if fields.insert(tag, value).is_some() {
                return Err(SnapshotError::DuplicateFieldTag(tag));
            }
        }

        Ok(Self {
            device_version,
            fields,
        })
    }

    pub fn device_version(&self) -> SnapshotVersion {
        self.device_version
    }

    pub fn ensure_device_major(&self, major: u16) -> SnapshotResult<()> {
        if self.device_version.major != major {
            return Err(SnapshotError::UnsupportedVersion {
                expected: major,
                found: self.device_version.major,
            });
        }
        Ok(())
    }

    pub fn bytes(&self, tag: u16) -> Option<&'a [u8]> {
        self.fields.get(&tag).copied()
    }

    fn fixed<const N: usize>(&self, tag: u16, what: &'static str) -> SnapshotResult<Option<[u8; N]>> {
        match self.bytes(tag) {
            None => Ok(None),
            Some(buf) => buf
                .try_into()
                .map(Some)
                .map_err(|_| SnapshotError::InvalidFieldEncoding(what)),
        }
    }

    pub fn u8(&self, tag: u16) -> SnapshotResult<Option<u8>> {
        Ok(self.fixed::<1>(tag, "u8")?.map(|b| b[0]))
    }

    pub fn u16(&self, tag: u16) -> SnapshotResult<Option<u16>> {
        Ok(self.fixed(tag, "u16")?.map(u16::from_le_bytes))
    }

    pub fn u32(&self, tag: u16) -> SnapshotResult<Option<u32>> {
        Ok(self.fixed(tag, "u32")?.map(u32::from_le_bytes))
    }

    pub fn u64(&self, tag: u16) -> SnapshotResult<Option<u64>> {
        Ok(self.fixed(tag, "u64")?.map(u64::from_le_bytes))
    }

    pub fn bool(&self, tag: u16) -> SnapshotResult<Option<bool>> {
        match self.u8(tag)? {
            None => Ok(None),
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            Some(_) => Err(SnapshotError::InvalidFieldEncoding("bool")),
        }
    }
}

/// Encoders/decoders for structured field payloads.
pub mod codec {
    use crate::error::{SnapshotError, SnapshotResult};

    #[derive(Debug, Default)]
    pub struct Encoder {
        buf: Vec<u8>,
    }

    impl Encoder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn u8(mut self, value: u8) -> Self {
            self.buf.push(value);
            self
        }

        pub fn u16(mut self, value: u16) -> Self {
            self.buf.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub fn u32(mut self, value: u32) -> Self {
            self.buf.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub fn u64(mut self, value: u64) -> Self {
            self.buf.extend_from_slice(&value.to_le_bytes());
            self
        }

        pub fn bool(self, value: bool) -> Self {
            self.u8(u8::from(value))
        }

        pub fn bytes(mut self, value: &[u8]) -> Self {
            self.buf.extend_from_slice(value);
            self
        }

        pub fn finish(self) -> Vec<u8> {
            self.buf
        }
    }

    #[derive(Debug)]
    pub struct Decoder<'a> {
        buf: &'a [u8],
    }

    impl<'a> Decoder<'a> {
        pub fn new(buf: &'a [u8]) -> Self {
            Self { buf }
        }

        pub fn is_empty(&self) -> bool {
            self.buf.is_empty()
        }

        pub fn bytes(&mut self, len: usize) -> SnapshotResult<&'a [u8]> {
            if len > self.buf.len() {
                return Err(SnapshotError::UnexpectedEof);
            }
            let (head, tail) = self.buf.split_at(len);
            self.buf = tail;
            Ok(head)
        }

        pub fn array<const N: usize>(&mut self) -> SnapshotResult<[u8; N]> {
            let mut out = [0u8; N];
            out.copy_from_slice(self.bytes(N)?);
            Ok(out)
        }

        pub fn u8(&mut self) -> SnapshotResult<u8> {
            Ok(self.array::<1>()?[0])
        }

        pub fn u16(&mut self) -> SnapshotResult<u16> {
            Ok(u16::from_le_bytes(self.array()?))
        }

        pub fn u32(&mut self) -> SnapshotResult<u32> {
            Ok(u32::from_le_bytes(self.array()?))
        }

        pub fn u64(&mut self) -> SnapshotResult<u64> {
            Ok(u64::from_le_bytes(self.array()?))
        }

        pub fn bool(&mut self) -> SnapshotResult<bool> {
            match self.u8()? {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(SnapshotError::InvalidFieldEncoding("bool")),
            }
        }

        /// Fails if undecoded bytes remain.
        pub fn finish(self) -> SnapshotResult<()> {
            if self.buf.is_empty() {
                Ok(())
            } else {
                Err(SnapshotError::InvalidFieldEncoding("trailing bytes"))
            }
        }
    }
}

use codec::{Decoder, Encoder};

const TAG_REGISTERS: u16 = 1;
const TAG_REMOTE_DMA: u16 = 2;
const TAG_TX: u16 = 3;
const TAG_CLOCK_NS: u16 = 4;
const TAG_LINK_UP: u16 = 5;
const TAG_PACKET_MEMORY: u16 = 6;

fn encode_registers(regs: &Registers) -> Vec<u8> {
    Encoder::new()
        .u8(regs.cr.bits())
        .u8(regs.isr.bits())
        .u8(regs.imr.bits())
        .u8(regs.dcr.bits())
        .u8(regs.tcr.bits())
        .u8(regs.tsr.bits())
        .u8(regs.rcr.bits())
        .u8(regs.rsr.bits())
        .u16(regs.local_dma)
        .u8(regs.page_start)
        .u8(regs.page_stop)
        .u8(regs.bound_ptr)
        .u8(regs.tx_page_start)
        .u8(regs.ncr)
        .u16(regs.tx_bytes)
        .u8(regs.fifo)
        .u16(regs.remote_dma)
        .u16(regs.remote_start)
        .u16(regs.remote_bytes)
        .bytes(&regs.tally)
        .bytes(&regs.physaddr)
        .u8(regs.curr_page)
        .bytes(&regs.mchash)
        .u8(regs.rempkt_ptr)
        .u8(regs.localpkt_ptr)
        .u16(regs.address_cnt)
        .finish()
}

fn decode_registers(buf: &[u8]) -> SnapshotResult<Registers> {
    let mut d = Decoder::new(buf);
    let regs = Registers {
        cr: Cr::from_bits_retain(d.u8()?),
        isr: Isr::from_bits_retain(d.u8()?),
        imr: Imr::from_bits_truncate(d.u8()?),
        dcr: Dcr::from_bits_truncate(d.u8()?),
        tcr: Tcr::from_bits_truncate(d.u8()?),
        tsr: Tsr::from_bits_truncate(d.u8()?),
        rcr: Rcr::from_bits_truncate(d.u8()?),
        rsr: Rsr::from_bits_truncate(d.u8()?),
        local_dma: d.u16()?,
        page_start: d.u8()?,
        page_stop: d.u8()?,
        bound_ptr: d.u8()?,
        tx_page_start: d.u8()?,
        ncr: d.u8()?,
        tx_bytes: d.u16()?,
        fifo: d.u8()?,
        remote_dma: d.u16()?,
        remote_start: d.u16()?,
        remote_bytes: d.u16()?,
        tally: d.array()?,
        physaddr: d.array()?,
        curr_page: d.u8()?,
        mchash: d.array()?,
        rempkt_ptr: d.u8()?,
        localpkt_ptr: d.u8()?,
        address_cnt: d.u16()?,
    };
    d.finish()?;
    Ok(regs)
}

fn encode_remote_dma(rdma: &RemoteDma) -> Vec<u8> {
    Encoder::new()
        .u8(rdma.state.to_u8())
        .u16(rdma.remaining)
        .bool(rdma.send_next_page.is_some())
        .u8(rdma.send_next_page.unwrap_or(0))
        .finish()
}

fn decode_remote_dma(buf: &[u8]) -> SnapshotResult<RemoteDma> {
    let mut d = Decoder::new(buf);
    let state = RdmaState::from_u8(d.u8()?)
        .ok_or(SnapshotError::InvalidFieldEncoding("remote DMA state"))?;
    let remaining = d.u16()?;
    let has_next = d.bool()?;
    let next = d.u8()?;
    d.finish()?;
    Ok(RemoteDma {
        state,
        remaining,
        send_next_page: has_next.then_some(next),
    })
}

fn encode_tx(tx: &TxState) -> Vec<u8> {
    Encoder::new()
        .u8(tx.outcome.map_or(0, TxOutcome::to_u8))
        .bool(tx.deadline.is_armed())
        .u64(tx.deadline.at_ns().unwrap_or(0))
        .finish()
}

fn decode_tx(buf: &[u8]) -> SnapshotResult<TxState> {
    let mut d = Decoder::new(buf);
    let outcome = match d.u8()? {
        0 => None,
        raw => Some(
            TxOutcome::from_u8(raw).ok_or(SnapshotError::InvalidFieldEncoding("tx outcome"))?,
        ),
    };
    let armed = d.bool()?;
    let at_ns = d.u64()?;
    d.finish()?;
    if outcome.is_some() != armed {
        return Err(SnapshotError::InvalidFieldEncoding("tx deadline"));
    }
    let mut deadline = Deadline::default();
    deadline.set_at_ns(armed.then_some(at_ns));
    Ok(TxState { deadline, outcome })
}

impl<B: NetworkBackend, I: IrqSink> IoSnapshot for Dp8390<B, I> {
    const DEVICE_ID: [u8; 4] = *b"8390";
    const DEVICE_VERSION: SnapshotVersion = SnapshotVersion::new(1, 0);

    fn save_state(&self) -> Vec<u8> {
        let mut w = SnapshotWriter::new(Self::DEVICE_ID, Self::DEVICE_VERSION);
        w.field_bytes(TAG_REGISTERS, encode_registers(&self.regs));
        w.field_bytes(TAG_REMOTE_DMA, encode_remote_dma(&self.rdma));
        w.field_bytes(TAG_TX, encode_tx(&self.tx));
        w.field_u64(TAG_CLOCK_NS, self.clock.now_ns());
        w.field_bool(TAG_LINK_UP, self.link_up);
        w.field_bytes(TAG_PACKET_MEMORY, self.mem.ram().to_vec());
        w.finish()
    }

    /// Restores chip state. Nothing is modified unless the whole snapshot decodes.
    ///
    /// The interrupt line is not part of the snapshot; call [`Dp8390::sync_irq`] afterwards to
    /// re-drive the sink.
    fn load_state(&mut self, bytes: &[u8]) -> SnapshotResult<()> {
        let r = SnapshotReader::parse(bytes, Self::DEVICE_ID)?;
        r.ensure_device_major(Self::DEVICE_VERSION.major)?;

        let regs = match r.bytes(TAG_REGISTERS) {
            Some(buf) => decode_registers(buf)?,
            None => Registers::power_on(self.config.mac),
        };
        let rdma = match r.bytes(TAG_REMOTE_DMA) {
            Some(buf) => decode_remote_dma(buf)?,
            None => RemoteDma::default(),
        };
        let tx = match r.bytes(TAG_TX) {
            Some(buf) => decode_tx(buf)?,
            None => TxState::default(),
        };
        let now_ns = r.u64(TAG_CLOCK_NS)?.unwrap_or(0);
        let link_up = r.bool(TAG_LINK_UP)?.unwrap_or(true);
        let ram = r.bytes(TAG_PACKET_MEMORY);
        if let Some(ram) = ram {
            if ram.len() != self.mem.ram().len() {
                return Err(SnapshotError::InvalidFieldEncoding("packet memory size"));
            }
        }

        self.regs = regs;
        self.rdma = rdma;
        self.tx = tx;
        let mut clock = Clock::new();
        clock.set_now_ns(now_ns);
        self.clock = clock;
        self.link_up = link_up;
        match ram {
            Some(ram) => self.mem.ram_mut().copy_from_slice(ram),
            None => self.mem.clear(),
        }
        self.mem.load_prom(self.config.mac, self.config.even_mac);
        Ok(())
    }
}

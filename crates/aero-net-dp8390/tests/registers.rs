mod common;

use aero_net_dp8390::regs::*;
use aero_net_dp8390::{Dp8390, Dp8390Config};
use proptest::prelude::*;

use common::{new_nic, MAC};

/// Page-0 write registers with the page/offset that reads them back and their defined bits.
const READBACK: &[(u8, u8, u8, u8)] = &[
    (P0_PSTART, 2, P2_PSTART, 0xFF),
    (P0_PSTOP, 2, P2_PSTOP, 0xFF),
    (P0_BNRY, 0, P0_BNRY, 0xFF),
    (P0_TPSR, 2, P2_TPSR, 0xFF),
    (P0_RSAR0, 0, P0_CRDA0, 0xFF),
    (P0_RSAR1, 0, P0_CRDA1, 0xFF),
    (P0_RCR, 2, P2_RCR, 0x3F),
    (P0_TCR, 2, P2_TCR, 0x1F),
    (P0_DCR, 2, P2_DCR, 0x7F),
    (P0_IMR, 2, P2_IMR, 0x7F),
];

proptest! {
    #[test]
    fn page0_registers_read_back_through_their_alias(
        idx in 0..READBACK.len(),
        value in any::<u8>(),
    ) {
        let (write_off, read_page, read_off, mask) = READBACK[idx];
        let mut nic = new_nic();

        nic.write_page(0, write_off, 1, u32::from(value));
        prop_assert_eq!(nic.read_page(read_page, read_off, 1), u32::from(value & mask));
    }

    #[test]
    fn page1_registers_read_back(offset in 1u8..16, value in any::<u8>()) {
        let mut nic = new_nic();
        nic.write_page(1, offset, 1, u32::from(value));
        prop_assert_eq!(nic.read_page(1, offset, 1), u32::from(value));
    }
}

#[test]
fn cr_reads_back_command_fields() {
    let mut nic = new_nic();
    nic.write(REG_CR, 1, 0xA2);
    assert_eq!(nic.read(REG_CR, 1), 0xA2);
    assert_eq!(nic.cr().page(), 2);

    // CR is visible at offset 0 on every page.
    for page in 0..4 {
        assert_eq!(nic.read_page(page, REG_CR, 1), 0xA2);
    }
}

#[test]
fn station_address_defaults_to_configured_mac() {
    let mut nic = new_nic();
    let par: Vec<u8> = (0..6)
        .map(|i| nic.read_page(1, P1_PAR0 + i, 1) as u8)
        .collect();
    assert_eq!(par, MAC);
}

#[test]
fn page2_reserved_offsets_read_all_ones() {
    let mut nic = new_nic();
    for offset in 0x08..=0x0B {
        assert_eq!(nic.read_page(2, offset, 1), 0xFF);
    }
}

#[test]
fn page2_writes_set_diagnostic_pointers() {
    let mut nic = new_nic();
    nic.write_page(2, P2_RNPP, 1, 0x55);
    nic.write_page(2, P2_LNPP, 1, 0x66);
    nic.write_page(2, P2_ADDR_HI, 1, 0x12);
    nic.write_page(2, P2_ADDR_LO, 1, 0x34);
    nic.write_page(2, P2_CLDA0, 1, 0x78);
    nic.write_page(2, P2_CLDA1, 1, 0x56);

    assert_eq!(nic.read_page(2, P2_RNPP, 1), 0x55);
    assert_eq!(nic.read_page(2, P2_LNPP, 1), 0x66);
    assert_eq!(nic.read_page(2, P2_ADDR_HI, 1), 0x12);
    assert_eq!(nic.read_page(2, P2_ADDR_LO, 1), 0x34);
    assert_eq!(nic.read_page(0, P0_CLDA0, 1), 0x78);
    assert_eq!(nic.read_page(0, P0_CLDA1, 1), 0x56);

    // Page-2 PSTART/PSTOP offsets are not writable aliases.
    assert_eq!(nic.read_page(2, P2_PSTART, 1), 0);
}

#[test]
fn offsets_beyond_the_register_file_alias_into_it() {
    let mut nic = new_nic();
    nic.write_page(0, 0x10 | P0_PSTART, 1, 0x4C);
    assert_eq!(nic.read_page(2, P2_PSTART, 1), 0x4C);
}

#[test]
fn isr_writes_never_set_bits() {
    let mut nic = new_nic();
    nic.write(P0_ISR, 1, 0xFF);
    assert_eq!(nic.read(P0_ISR, 1), 0x80);
}

#[test]
fn even_mac_prom_through_remote_dma() {
    let config = Dp8390Config {
        mac: MAC,
        even_mac: true,
        ..Dp8390Config::default()
    };
    let mut nic: Dp8390 = Dp8390::new(config, (), ()).unwrap();
    nic.write(P0_RSAR0, 1, 0);
    nic.write(P0_RSAR1, 1, 0);
    nic.write(P0_RBCR0, 1, 32);
    nic.write(P0_RBCR1, 1, 0);
    nic.write(REG_CR, 1, 0x0A);
    let prom: Vec<u8> = (0..32).map(|_| nic.data_read(1) as u8).collect();

    assert_eq!(&prom[..12], &[0x52, 0x52, 0x54, 0x54, 0x00, 0x00, 0x12, 0x12, 0x34, 0x34, 0x56, 0x56]);
    assert!(prom[12..].iter().all(|&b| b == 0x57));
}

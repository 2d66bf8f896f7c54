mod common;

use std::cell::RefCell;
use std::rc::Rc;

use aero_net_dp8390::regs::*;
use aero_net_dp8390::{device, Dp8390, RdmaState};
use proptest::prelude::*;

use common::{
    bring_up, config, frame, init_tracing, new_nic, set_remote, CaptureBackend, IrqLog, MAC,
};

/// Triggers one chip event: 0 receives a frame (PRX), 1 completes an empty remote read (RDC),
/// 2 misses a frame on a full ring (OVW).
fn raise(nic: &mut common::Nic, event: usize) {
    match event {
        0 => {
            nic.receive_frame(&frame(MAC, 60));
        }
        1 => {
            set_remote(nic, 0x4000, 0);
            nic.write(REG_CR, 1, 0x0A);
        }
        _ => {
            // Leave less free space than one frame needs.
            let curr = nic.curr_page();
            nic.write(P0_BNRY, 1, u32::from(curr + 1));
            nic.receive_frame(&frame(MAC, 60));
        }
    }
}

proptest! {
    #[test]
    fn sink_sees_each_transition_once(
        imr in 0u8..0x80,
        events in prop::collection::vec(0usize..3, 1..12),
    ) {
        let mut nic = new_nic();
        bring_up(&mut nic, 0x00, imr);
        nic.irq_sink_mut().take_events();

        let mut level = false;
        for event in events {
            raise(&mut nic, event);
            let now = nic.line_active();
            let seen = nic.irq_sink_mut().take_events();
            if now == level {
                prop_assert!(seen.is_empty());
            } else {
                prop_assert_eq!(seen, vec![now]);
            }
            level = now;
            prop_assert_eq!(nic.irq_sink().level(), level);
        }

        // Acknowledging everything deasserts within the same write.
        nic.write(P0_ISR, 1, 0x7F);
        prop_assert!(!nic.line_active());
        let seen = nic.irq_sink_mut().take_events();
        if level {
            prop_assert_eq!(seen, vec![false]);
        } else {
            prop_assert!(seen.is_empty());
        }
    }
}

#[test]
fn masked_status_does_not_assert() {
    let mut nic = new_nic();
    bring_up(&mut nic, 0x00, 0x00);
    nic.irq_sink_mut().take_events();

    nic.receive_frame(&frame(MAC, 60));
    assert!(nic.isr().contains(Isr::PRX));
    assert!(nic.irq_sink_mut().take_events().is_empty());

    nic.write(P0_IMR, 1, 0x01);
    assert_eq!(nic.irq_sink_mut().take_events(), vec![true]);
    nic.write(P0_IMR, 1, 0x00);
    assert_eq!(nic.irq_sink_mut().take_events(), vec![false]);
}

#[test]
fn rst_never_interrupts() {
    let mut nic = new_nic();
    nic.write(P0_IMR, 1, 0x7F);
    assert!(nic.isr().contains(Isr::RST));
    assert!(!nic.line_active());
    assert!(nic.irq_sink_mut().take_events().is_empty());
}

#[test]
fn partial_acknowledge_keeps_line_up() {
    let mut nic = new_nic();
    bring_up(&mut nic, 0x00, 0x41);
    nic.irq_sink_mut().take_events();

    nic.receive_frame(&frame(MAC, 60));
    set_remote(&mut nic, 0x4000, 0);
    nic.write(REG_CR, 1, 0x0A);
    assert_eq!(nic.irq_sink_mut().take_events(), vec![true]);

    nic.write(P0_ISR, 1, 0x01);
    assert!(nic.line_active());
    assert!(nic.irq_sink_mut().take_events().is_empty());

    nic.write(P0_ISR, 1, 0x40);
    assert_eq!(nic.irq_sink_mut().take_events(), vec![false]);
}

#[test]
fn stop_drops_frames_and_restart_resumes() {
    let mut nic = new_nic();
    bring_up(&mut nic, 0x00, 0x01);

    nic.write(REG_CR, 1, 0x21);
    assert!(nic.isr().contains(Isr::RST));
    assert!(!nic.is_running());
    assert!(!nic.receive_frame(&frame(MAC, 60)));
    assert!(!nic.isr().contains(Isr::PRX));

    nic.write(REG_CR, 1, 0x22);
    assert!(nic.is_running());
    assert!(nic.receive_frame(&frame(MAC, 60)));
    assert!(nic.line_active());
}

#[test]
fn soft_reset_keeps_programming() {
    let mut nic = new_nic();
    bring_up(&mut nic, 0x00, 0x01);
    nic.receive_frame(&frame(MAC, 60));
    set_remote(&mut nic, 0x4000, 16);
    nic.write(REG_CR, 1, 0x0A);
    assert!(nic.line_active());

    nic.soft_reset();
    assert_eq!(nic.isr(), Isr::RST);
    assert!(!nic.line_active());
    assert_eq!(nic.irq_sink_mut().take_events().last(), Some(&false));
    assert_eq!(nic.rdma_state(), RdmaState::Idle);
    assert_eq!(nic.station_address(), MAC);
    assert_eq!(nic.imr().bits(), 0x01);
    assert_eq!(nic.read_page(2, P2_PSTART, 1), 0x46);
    assert_eq!(nic.memory().ram()[0x0700], 0x01);
}

#[test]
fn hard_reset_restores_power_on_state() {
    let mut nic = new_nic();
    bring_up(&mut nic, 0x04, 0x01);
    nic.write(REG_CR, 1, 0x62);
    nic.write(P1_PAR0, 1, 0xAA);
    nic.write(REG_CR, 1, 0x22);
    nic.write(P0_RCR, 1, 0x14);
    nic.receive_frame(&frame([0xFF; 6], 60));
    assert!(nic.line_active());

    nic.reset();
    assert_eq!(nic.read(REG_CR, 1), 0x21);
    assert_eq!(nic.isr(), Isr::RST);
    assert_eq!(nic.imr().bits(), 0);
    assert!(!nic.line_active());
    assert!(!nic.irq_sink().level());
    assert_eq!(nic.station_address(), MAC);
    assert!(nic.memory().ram().iter().all(|&b| b == 0));
    assert_eq!(nic.read_page(2, P2_DCR, 1), u32::from(Dcr::LAS.bits()));
}

#[test]
fn close_lowers_the_line_and_returns_parts() {
    init_tracing();
    let mut nic = new_nic();
    bring_up(&mut nic, 0x00, 0x01);
    nic.receive_frame(&frame(MAC, 60));
    assert!(nic.irq_sink().level());

    let (backend, mut irq) = nic.close();
    assert!(backend.tx.is_empty());
    assert!(!irq.level());
    assert_eq!(irq.take_events().last(), Some(&false));
}

#[test]
fn shared_sink_through_rc_refcell() {
    let log = Rc::new(RefCell::new(IrqLog::default()));
    let mut nic = Dp8390::new(config(), CaptureBackend::default(), log.clone()).unwrap();
    nic.write(P0_IMR, 1, 0x40);
    set_remote(&mut nic, 0x4000, 0);
    nic.write(REG_CR, 1, 0x0A);
    assert!(log.borrow().level());
    nic.write(P0_ISR, 1, 0x40);
    assert!(!log.borrow().level());
}

#[test]
fn borrowed_sink() {
    let mut log = IrqLog::default();
    {
        let mut nic = Dp8390::new(config(), (), &mut log).unwrap();
        nic.write(P0_IMR, 1, 0x40);
        nic.write(REG_CR, 1, 0x0A);
        nic.write(P0_ISR, 1, 0xFF);
    }
    assert_eq!(log.take_events(), vec![true, false]);
}

#[test]
fn descriptor_drives_lifecycle() {
    let desc = device::descriptor::<CaptureBackend, IrqLog>();
    assert_eq!(desc.internal_name, "dp8390");

    let mut nic = (desc.init)(config(), CaptureBackend::default(), IrqLog::default()).unwrap();
    nic.write(P0_IMR, 1, 0x40);
    nic.write(REG_CR, 1, 0x0A);
    assert!(nic.line_active());

    (desc.reset)(&mut nic);
    assert!(!nic.line_active());
    let (_, irq) = (desc.close)(nic);
    assert!(!irq.level());
}

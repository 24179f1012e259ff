//! Driver tests against the simulated crate
//!
//! Discovery, register accessors and the status snapshot, checked against
//! what actually reached each simulated board.

use vld_driver::buses::{SimBoard, SimulatedBus};
use vld_driver::chip::regs::{self, analog};
use vld_driver::chip::vme::slot_address;
use vld_driver::chip::{FirmwareVersion, Register, TriggerTiming};
use vld_driver::{
    ClockSource, DeviceRegistry, InitConfig, InitFlags, LedCalibration, VldError,
};

fn crate_with(slots: &[u32]) -> (SimulatedBus, DeviceRegistry<SimulatedBus>) {
    let sim = SimulatedBus::new();
    for &slot in slots {
        sim.insert_board(slot, SimBoard::vld(slot));
    }
    (sim.clone(), DeviceRegistry::new(sim))
}

fn initialized(slots: &[u32]) -> (SimulatedBus, DeviceRegistry<SimulatedBus>) {
    let (sim, registry) = crate_with(slots);
    registry.init(&InitConfig::scan()).unwrap();
    (sim, registry)
}

// ── Discovery ────────────────────────────────────────────────────────────────

#[test]
fn scan_finds_boards_in_slot_order() {
    let (_, registry) = crate_with(&[14, 5]);
    assert_eq!(registry.init(&InitConfig::scan()).unwrap(), 2);
    assert_eq!(registry.slots(), vec![5, 14]);
    assert_eq!(registry.device(14).unwrap().address, 14 << 19);
}

#[test]
fn empty_crate_reports_no_devices() {
    let (_, registry) = crate_with(&[]);
    assert!(matches!(
        registry.init(&InitConfig::scan()),
        Err(VldError::NoDevicesFound)
    ));
    assert_eq!(registry.device_count(), 0);
}

#[test]
fn slot_number_as_address() {
    let (_, registry) = crate_with(&[4, 9]);
    assert_eq!(registry.init(&InitConfig::single(9)).unwrap(), 1);
    assert_eq!(registry.slots(), vec![9]);
}

#[test]
fn old_firmware_rejected_unless_skipped() {
    let sim = SimulatedBus::new()
        .with_board(6, SimBoard::vld(6).with_firmware(FirmwareVersion::compose(3, 0x70, 2)))
        .with_board(7, SimBoard::vld(7));
    let registry = DeviceRegistry::new(sim);

    assert_eq!(registry.init(&InitConfig::scan()).unwrap(), 1);
    assert_eq!(registry.slots(), vec![7]);

    let skip = InitConfig::scan().with_flags(InitFlags {
        skip_firmware_check: true,
        ..InitFlags::default()
    });
    assert_eq!(registry.init(&skip).unwrap(), 2);
}

#[test]
fn duplicate_geographic_slot_skipped() {
    let sim = SimulatedBus::new()
        .with_board(8, SimBoard::vld(8))
        .with_board(9, SimBoard::vld(8));
    let registry = DeviceRegistry::new(sim);
    assert_eq!(registry.init(&InitConfig::scan()).unwrap(), 1);
    assert_eq!(registry.device(8).unwrap().address, slot_address(8));
}

#[test]
fn foreign_board_skipped() {
    let sim = SimulatedBus::new().with_board(3, SimBoard::vld(3));
    sim.set_register(3, regs::BOARD_ID, 0x4200_2300);
    sim.insert_board(4, SimBoard::vld(4));
    let registry = DeviceRegistry::new(sim);
    assert_eq!(registry.init(&InitConfig::scan()).unwrap(), 1);
    assert_eq!(registry.slots(), vec![4]);
}

#[test]
fn non_vme64x_board_takes_slot_from_address() {
    let sim = SimulatedBus::new().with_board(12, SimBoard::legacy());
    let registry = DeviceRegistry::new(sim);
    assert_eq!(registry.init(&InitConfig::single(12)).unwrap(), 1);
    assert_eq!(registry.slots(), vec![12]);
    assert_eq!(registry.geo_address(12).unwrap(), 0);
}

#[test]
fn no_init_records_candidates_without_access() {
    let (sim, registry) = crate_with(&[]);
    let config = InitConfig::list([3, 10]).with_flags(InitFlags {
        no_init: true,
        use_address_list: true,
        ..InitFlags::default()
    });
    assert_eq!(registry.init(&config).unwrap(), 2);
    assert_eq!(sim.bus_accesses(), 0);
}

#[test]
fn reinit_replaces_table() {
    let (_, registry) = initialized(&[3, 4]);
    registry.init(&InitConfig::single(4)).unwrap();
    assert_eq!(registry.slots(), vec![4]);
}

// ── Accessors ────────────────────────────────────────────────────────────────

#[test]
fn unknown_slot_never_touches_bus() {
    let (sim, registry) = initialized(&[5]);
    let before = sim.bus_accesses();
    assert!(matches!(
        registry.trigger_count(6),
        Err(VldError::NotInitialized { slot: 6 })
    ));
    assert!(registry.set_clock_source(6, ClockSource::External).is_err());
    assert_eq!(sim.bus_accesses(), before);
}

#[test]
fn invalid_parameter_never_touches_bus() {
    let (sim, registry) = initialized(&[5]);
    let before = sim.bus_accesses();
    assert!(matches!(
        registry.set_trigger_source_mask(5, 0x08),
        Err(VldError::InvalidParameter { .. })
    ));
    assert!(registry.set_calibration_pulse_width(5, 0x400).is_err());
    assert!(registry.set_periodic_pulser(5, 0x1_0000, 1).is_err());
    assert!(registry.set_bleach_time(5, 0x1000_0000, true).is_err());
    assert!(registry.reset_mask(5, 1).is_err());
    assert!(registry.led_calibration(5, 5).is_err());
    assert_eq!(sim.bus_accesses(), before);
}

#[test]
fn trigger_timing_round_trip() {
    let (sim, registry) = initialized(&[5]);
    let timing = TriggerTiming {
        delay: 0x10,
        step: 1,
        width: 0x3,
    };
    registry.set_trigger_delay_width(5, timing).unwrap();
    assert_eq!(sim.board(5).unwrap().register(regs::TRIG_DELAY), 0x0390);
    assert_eq!(registry.trigger_delay_width(5).unwrap(), timing);
}

#[test]
fn out_of_range_timing_is_clipped_and_written() {
    let (sim, registry) = initialized(&[5]);
    let timing = TriggerTiming {
        delay: 0xFF,
        step: 0,
        width: 0x3F,
    };
    registry.set_trigger_delay_width(5, timing).unwrap();
    assert_eq!(sim.board(5).unwrap().register(regs::TRIG_DELAY), 0x1F7F);

    registry.set_random_pulser(5, 9, true).unwrap();
    let pulser = registry.random_pulser(5).unwrap();
    assert_eq!(pulser.prescale, 1);
    assert!(pulser.enabled);
}

#[test]
fn bleach_enable_clears_first() {
    let (sim, registry) = initialized(&[5]);
    registry.set_bleach_time(5, 0x1234, true).unwrap();
    assert_eq!(
        sim.board(5).unwrap().writes_to(regs::BLEACH_TIME),
        vec![0, 0xB000_1234]
    );
    let timer = registry.bleach_time(5).unwrap();
    assert_eq!(timer.timer, 0x1234);
    assert!(timer.enabled);

    registry.set_bleach_time(5, 0x55, false).unwrap();
    assert!(!registry.bleach_time(5).unwrap().enabled);
}

#[test]
fn analog_switch_keeps_reserved_bit() {
    let (sim, registry) = initialized(&[5]);
    sim.set_register(5, regs::ANALOG_CTRL, analog::RESERVED | 0xFFFF_0000);
    registry.set_analog_switch_control(5, 0x20, 0x7F).unwrap();
    assert_eq!(
        sim.board(5).unwrap().register(regs::ANALOG_CTRL),
        0xFFFF_0000 | analog::RESERVED | (0x7F << 9) | 0x20
    );
    let switch = registry.analog_switch_control(5).unwrap();
    assert_eq!((switch.delay, switch.width), (0x20, 0x7F));
}

#[test]
fn clock_and_sources() {
    let (_, registry) = initialized(&[5]);
    registry.set_clock_source(5, ClockSource::External).unwrap();
    assert_eq!(registry.clock_source(5).unwrap(), ClockSource::External);
    registry.set_trigger_source_mask(5, 0x13).unwrap();
    assert_eq!(registry.trigger_source_mask(5).unwrap(), 0x13);
}

#[test]
fn periodic_pulser_fields() {
    let (sim, registry) = initialized(&[5]);
    registry.set_periodic_pulser(5, 0x0100, 25).unwrap();
    assert_eq!(sim.board(5).unwrap().register(regs::PERIODIC_TRIG), 0x0100_0019);
    let pulser = registry.periodic_pulser(5).unwrap();
    assert_eq!((pulser.period, pulser.npulses), (0x100, 25));
}

#[test]
fn led_calibration_words() {
    let (sim, registry) = initialized(&[5]);
    let setting = LedCalibration {
        low: 0x3,
        high: 0,
        bleach_ctrl: 0x5,
        bleach_enable: true,
    };
    registry.set_led_calibration(5, 2, setting).unwrap();

    let board = sim.board(5).unwrap();
    let low = Register::Led {
        connector: 2,
        half: regs::LedHalf::Low,
    };
    let high = Register::Led {
        connector: 2,
        half: regs::LedHalf::High,
    };
    assert_eq!(board.register(low.offset()), 0xB500_0007);
    assert_eq!(board.register(high.offset()), 0);
    assert_eq!(registry.led_calibration(5, 2).unwrap(), setting);
}

#[test]
fn pulse_shape_goes_to_fifo() {
    let (sim, registry) = initialized(&[5]);
    registry.load_pulse(5, &[0x81, 0x3F, 0x40]).unwrap();
    assert_eq!(
        sim.board(5).unwrap().writes_to(regs::PULSE_LOAD),
        vec![0x81, 0x3F, 0x40]
    );
    assert!(matches!(registry.load_pulse(5, &[]), Err(VldError::EmptyPulse)));
}

#[test]
fn reset_helpers_write_single_bits() {
    let (sim, registry) = initialized(&[5]);
    registry.soft_reset(5).unwrap();
    registry.reset_i2c(5).unwrap();
    registry.hard_clock_reset(5).unwrap();
    assert_eq!(
        sim.board(5).unwrap().writes_to(regs::RESET),
        vec![regs::reset::SOFT, regs::reset::I2C, regs::reset::HARD_CLK]
    );
}

#[test]
fn concurrent_accessors_share_the_lock() {
    let (sim, registry) = initialized(&[5, 6]);
    std::thread::scope(|s| {
        for slot in [5, 6] {
            let registry = &registry;
            s.spawn(move || {
                for n in 0..50 {
                    registry.set_calibration_pulse_width(slot, n).unwrap();
                }
            });
        }
    });
    assert_eq!(sim.board(5).unwrap().writes_to(regs::CALIBRATION_WIDTH).len(), 50);
    assert_eq!(registry.calibration_pulse_width(6).unwrap(), 49);
}

// ── Status ───────────────────────────────────────────────────────────────────

#[test]
fn status_snapshot_in_discovery_order() {
    let (sim, registry) = initialized(&[10, 3]);
    sim.set_register(10, regs::TRIG_CNT, 1234);

    let report = registry.status(false).unwrap();
    let slots: Vec<u32> = report.boards.iter().map(|b| b.slot).collect();
    assert_eq!(slots, vec![3, 10]);
    assert_eq!(report.boards[1].get(Register::TrigCnt), 1234);
    assert_eq!(report.boards[0].registers.len(), Register::STATUS_SET.len());
    assert!(report.boards[0]
        .registers
        .iter()
        .all(|(reg, _)| !Register::WRITE_PORTS.contains(reg)));

    let text = report.to_string();
    assert!(text.contains("2 board(s) on Simulated"));
    assert!(text.contains("1234"));
    assert!(!text.contains("registers:"));
}

#[test]
fn detailed_status_dumps_registers() {
    let (_, registry) = initialized(&[3]);
    let text = registry.status(true).unwrap().to_string();
    assert!(text.contains("Slot 3 registers:"));
    assert!(text.contains("output[4]"));
}

#[test]
fn status_fails_on_dead_board() {
    let (sim, registry) = initialized(&[3]);
    sim.insert_board(3, SimBoard::vld(3).unresponsive());
    assert!(registry.status(false).is_err());
}

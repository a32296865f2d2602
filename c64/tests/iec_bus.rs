//! IEC bus laws: wired-AND over every driver subset, and the
//! bus-attention wakeup with a drive attached.

mod common;

use c64emu::{D64Image, IecBus, IecLine, C64_DRIVER};
use common::{build_disk, stub_machine};

#[test]
fn wired_and_over_all_driver_subsets() {
    // Drivers: the C64 and four drive units.
    let drivers = [
        C64_DRIVER,
        IecBus::driver_for_device(8),
        IecBus::driver_for_device(9),
        IecBus::driver_for_device(10),
        IecBus::driver_for_device(11),
    ];

    for subset in 1u32..(1 << drivers.len()) {
        let mut bus = IecBus::new();
        for (i, &driver) in drivers.iter().enumerate() {
            if subset & (1 << i) != 0 {
                bus.set(driver, IecLine::Data, true);
            }
        }
        assert!(
            bus.line_asserted(IecLine::Data),
            "subset {subset:05b}: some driver pulls low"
        );

        // Releasing every member restores the line.
        for (i, &driver) in drivers.iter().enumerate() {
            if subset & (1 << i) != 0 {
                bus.set(driver, IecLine::Data, false);
            }
        }
        assert!(bus.line_high(IecLine::Data), "subset {subset:05b}");
    }
}

#[test]
fn lines_are_independent() {
    let mut bus = IecBus::new();
    bus.set(C64_DRIVER, IecLine::Atn, true);
    bus.set(IecBus::driver_for_device(8), IecLine::Clk, true);
    assert!(bus.line_asserted(IecLine::Atn));
    assert!(bus.line_asserted(IecLine::Clk));
    assert!(bus.line_high(IecLine::Data));
}

#[test]
fn atn_wakeup_pulls_data_within_the_window() {
    let mut c64 = stub_machine();
    let disk = D64Image::from_bytes(build_disk("TEST", "01", &[])).unwrap();
    c64.attach_disk(8, disk).unwrap();

    // Give the drive a tick with ATN released: DATA stays high.
    c64.step();
    assert!(!c64.bus().iec.line_asserted(IecLine::Data));

    // Assert ATN through CIA2 port A (bit 3 low = assert).
    c64.poke(0xDD02, 0x3F);
    c64.poke(0xDD00, 0x37);
    assert!(c64.bus().iec.line_asserted(IecLine::Atn));

    // The drive answers within one tick (well under 16 drive cycles).
    let before = c64.total_cycles();
    c64.step();
    assert!(c64.total_cycles() - before <= 16);
    assert!(c64.bus().iec.line_asserted(IecLine::Data));

    // CIA2 port A reads the asserted DATA line on bit 7.
    assert_eq!(c64.peek(0xDD00) & 0x80, 0x80);

    // Release ATN: the acknowledge pull drops again.
    c64.poke(0xDD00, 0x3F);
    c64.step();
    assert!(!c64.bus().iec.line_asserted(IecLine::Data));
}

#[test]
fn detaching_disks_keeps_bus_consistent() {
    let mut c64 = stub_machine();
    let disk = D64Image::from_bytes(build_disk("TEST", "01", &[])).unwrap();
    c64.attach_disk(8, disk).unwrap();
    c64.poke(0xDD02, 0x3F);
    c64.poke(0xDD00, 0x37); // assert ATN
    c64.step();
    assert!(c64.bus().iec.line_asserted(IecLine::Data));

    // Ejecting the disk does not remove the unit from the bus.
    c64.detach_disks();
    c64.step();
    assert!(c64.bus().iec.line_asserted(IecLine::Data));
}

//! Full boot against real ROM images. Ignored by default: place
//! `basic.rom`, `kernal.rom` (and optionally `chargen.rom`) in `roms/`
//! and run with `cargo test -- --ignored`.

use c64emu::{C64, C64Config, RomSet, VideoStandard};

fn boot_machine() -> Option<C64> {
    let roms = match RomSet::locate(None, false) {
        Ok(roms) => roms,
        Err(e) => {
            eprintln!("skipping: {e}");
            return None;
        }
    };
    Some(C64::new(C64Config {
        standard: VideoStandard::Pal,
        kernal_rom: roms.kernal,
        basic_rom: roms.basic,
        char_rom: roms.chargen,
        drive_rom: roms.drive_dos,
    }))
}

#[test]
#[ignore] // needs real C64 ROMs
fn boots_to_the_basic_banner() {
    let Some(mut c64) = boot_machine() else {
        panic!("C64 ROMs not found on the search path");
    };

    c64.run(Some(3_000_000), false, true);

    let screen = c64.screen_text();
    assert!(
        screen.contains("**** COMMODORE 64 BASIC V2 ****"),
        "banner missing:\n{screen}"
    );
    assert!(c64.ready_on_screen(), "no READY. prompt:\n{screen}");
}

#[test]
#[ignore] // needs real C64 ROMs
fn autoquit_stops_at_ready() {
    let Some(mut c64) = boot_machine() else {
        panic!("C64 ROMs not found on the search path");
    };
    c64.run(Some(10_000_000), true, true);
    assert!(c64.ready_on_screen());
    assert!(c64.total_cycles() < 10_000_000);
}

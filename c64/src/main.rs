//! Commodore 64 emulator binary.
//!
//! Headless by default: boots the KERNAL, paces execution to the video
//! standard's clock, and prints the final text screen on exit. Graphics
//! and terminal front-ends attach out of process; the TCP/UDP control
//! server is their (and your) way in.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{info, warn};

use c64emu::{server, C64, C64Config, D64Image, RomSet, VideoStandard};

struct CliArgs {
    prg_path: Option<PathBuf>,
    rom_dir: Option<PathBuf>,
    disk_path: Option<PathBuf>,
    max_cycles: Option<u64>,
    autoquit: bool,
    turbo: bool,
    ntsc: bool,
    graphics: bool,
    no_color: bool,
    tcp_port: Option<u16>,
    udp_port: Option<u16>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        prg_path: None,
        rom_dir: None,
        disk_path: None,
        max_cycles: None,
        autoquit: false,
        turbo: false,
        ntsc: false,
        graphics: false,
        no_color: false,
        tcp_port: None,
        udp_port: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rom-dir" => {
                i += 1;
                cli.rom_dir = args.get(i).map(PathBuf::from);
            }
            "--disk" => {
                i += 1;
                cli.disk_path = args.get(i).map(PathBuf::from);
            }
            "--max-cycles" => {
                i += 1;
                cli.max_cycles = args.get(i).and_then(|s| s.parse().ok());
                if cli.max_cycles.is_none() {
                    eprintln!("--max-cycles needs a number");
                    process::exit(1);
                }
            }
            "--tcp-port" => {
                i += 1;
                cli.tcp_port = args.get(i).and_then(|s| s.parse().ok());
                if cli.tcp_port.is_none() {
                    eprintln!("--tcp-port needs a port number");
                    process::exit(1);
                }
            }
            "--udp-port" => {
                i += 1;
                cli.udp_port = args.get(i).and_then(|s| s.parse().ok());
                if cli.udp_port.is_none() {
                    eprintln!("--udp-port needs a port number");
                    process::exit(1);
                }
            }
            "--autoquit" => cli.autoquit = true,
            "--turbo" => cli.turbo = true,
            "--ntsc" => cli.ntsc = true,
            "--graphics" => cli.graphics = true,
            "--no-color" | "--no-colors" => cli.no_color = true,
            "--help" | "-h" => {
                eprintln!("Usage: c64emu [OPTIONS] [program.prg]");
                eprintln!();
                eprintln!("Options:");
                eprintln!("  --rom-dir <dir>     Directory with ROM images");
                eprintln!("  --disk <file>       Mount a D64 image on device 8");
                eprintln!("  --max-cycles <n>    Stop after n CPU cycles");
                eprintln!("  --autoquit          Exit when the READY. prompt appears");
                eprintln!("  --turbo             No speed limiting");
                eprintln!("  --ntsc              NTSC timing (default PAL)");
                eprintln!("  --graphics          Validate the character ROM for a renderer");
                eprintln!("  --tcp-port <n>      Line-oriented control server (TCP)");
                eprintln!("  --udp-port <n>      One command per datagram (UDP)");
                eprintln!("  --no-color          Plain final screen dump");
                process::exit(0);
            }
            other if !other.starts_with('-') => {
                cli.prg_path = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("Unknown argument: {other}");
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn build_machine(cli: &CliArgs) -> Result<C64> {
    let roms = match RomSet::locate(cli.rom_dir.as_deref(), cli.graphics) {
        Ok(roms) => roms,
        Err(e) => {
            eprintln!("ERROR: {e}");
            process::exit(1);
        }
    };

    let standard = if cli.ntsc {
        VideoStandard::Ntsc
    } else {
        VideoStandard::Pal
    };

    let mut c64 = C64::new(C64Config {
        standard,
        kernal_rom: roms.kernal,
        basic_rom: roms.basic,
        char_rom: roms.chargen,
        drive_rom: roms.drive_dos,
    });

    if let Some(ref path) = cli.disk_path {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let image = D64Image::from_bytes(data)?;
        c64.attach_disk(8, image)?;
        info!("disk mounted on device 8: {}", path.display());
        // Let the user see the directory once BASIC is up.
        c64.queue_text_on_ready("LOAD\"$\",8\n");
    }

    if let Some(ref path) = cli.prg_path {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        // BASIC boot scribbles over program RAM; defer the load.
        c64.queue_prg_on_ready(data);
        info!("PRG queued for after boot: {}", path.display());
    }

    Ok(c64)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = parse_args();

    if cli.graphics {
        warn!("no graphics front-end is built in; a renderer attaches via the control server");
    }

    let mut c64 = build_machine(&cli)?;
    let stop = c64.stop_handle();
    let standard = c64.standard();

    info!(
        "starting emulation ({:?}, {} Hz)",
        standard,
        standard.cpu_frequency()
    );
    let started = Instant::now();

    let (cycles, screen) = if cli.tcp_port.is_some() || cli.udp_port.is_some() {
        let system = Arc::new(Mutex::new(c64));
        if let Some(port) = cli.tcp_port {
            server::spawn_tcp(port, Arc::clone(&system), Arc::clone(&stop))
                .with_context(|| format!("binding TCP port {port}"))?;
        }
        if let Some(port) = cli.udp_port {
            server::spawn_udp(port, Arc::clone(&system), Arc::clone(&stop))
                .with_context(|| format!("binding UDP port {port}"))?;
        }
        run_shared(&system, &cli);
        let c64 = system
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        (c64.total_cycles(), c64.screen_text())
    } else {
        c64.run(cli.max_cycles, cli.autoquit, cli.turbo);
        (c64.total_cycles(), c64.screen_text())
    };

    println!("\nFinal screen:");
    if cli.no_color {
        print!("{screen}");
    } else {
        // Light blue on blue, like the real thing.
        print!("\x1b[38;5;153m\x1b[48;5;25m{screen}\x1b[0m");
    }

    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        let mhz = cycles as f64 / elapsed / 1e6;
        info!("{cycles} cycles in {elapsed:.2}s ({mhz:.2} MHz)");
    }

    Ok(())
}

/// Drive the shared machine one tick per lock acquisition, so server
/// commands interleave between instructions but never inside one.
fn run_shared(system: &Arc<Mutex<C64>>, cli: &CliArgs) {
    let (stop, frame_cycles, hz) = {
        let c64 = system
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        (
            c64.stop_handle(),
            u64::from(c64.standard().cycles_per_frame()),
            f64::from(c64.standard().cpu_frequency()),
        )
    };

    let started = Instant::now();
    let mut executed: u64 = 0;
    let mut next_frame = frame_cycles;

    while !stop.load(Ordering::Relaxed) {
        if let Some(limit) = cli.max_cycles {
            if executed >= limit {
                break;
            }
        }

        {
            let mut c64 = system
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            executed += u64::from(c64.step());
        }

        if executed >= next_frame {
            next_frame += frame_cycles;

            let (ready, typed_pending) = {
                let mut c64 = system
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                (c64.poll_boot_tasks(), c64.typed_pending())
            };
            if cli.autoquit && ready && !typed_pending {
                break;
            }

            if !cli.turbo {
                let expected = executed as f64 / hz;
                let elapsed = started.elapsed().as_secs_f64();
                if expected > elapsed {
                    std::thread::sleep(Duration::from_secs_f64(expected - elapsed));
                }
            }
        }
    }
}

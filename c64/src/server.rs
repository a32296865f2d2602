//! Remote-control server: line-oriented ASCII over TCP and UDP.
//!
//! One command per line (TCP) or per datagram (UDP), one reply line per
//! command, errors prefixed `ERR:`. The listeners run on their own
//! threads and serialise every mutation through the shared machine
//! mutex; the lock is held for exactly one command, so no client ever
//! observes a half-stepped instruction.
//!
//! ```text
//! POKE addr val          write a byte (full bus side effects)
//! PEEK addr              read a byte (no side effects)
//! KEY <code>             push a PETSCII code into the keyboard buffer
//! LOAD <path>            load a PRG file from the host filesystem
//! ATTACH-DISK <path> [device]
//! DETACH-DISKS
//! RESET
//! HELP
//! QUIT
//! ```
//!
//! Numbers are decimal, `$hex` or `0xhex`.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::{info, warn};

use crate::d64::D64Image;
use crate::system::C64;

/// Shared handle the listener threads work against.
pub type SharedC64 = Arc<Mutex<C64>>;

const HELP_TEXT: &str = "COMMANDS: POKE addr val | PEEK addr | KEY code | LOAD path | \
                         ATTACH-DISK path [device] | DETACH-DISKS | RESET | HELP | QUIT";

/// Execute one command line against the machine.
///
/// Always returns a single reply line without a terminator.
pub fn handle_command(line: &str, system: &SharedC64, stop: &AtomicBool) -> String {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return "ERR: empty command".to_string();
    };
    let args: Vec<&str> = parts.collect();

    match command.to_ascii_uppercase().as_str() {
        "POKE" => match (parse_addr(&args, 0), parse_byte(&args, 1)) {
            (Some(addr), Some(value)) => {
                let mut c64 = lock(system);
                c64.poke(addr, value);
                "OK".to_string()
            }
            _ => "ERR: usage: POKE addr val".to_string(),
        },
        "PEEK" => match parse_addr(&args, 0) {
            Some(addr) => {
                let c64 = lock(system);
                format!("{}", c64.peek(addr))
            }
            None => "ERR: usage: PEEK addr".to_string(),
        },
        "KEY" => match parse_byte(&args, 0) {
            Some(code) => {
                let mut c64 = lock(system);
                c64.push_key(code);
                "OK".to_string()
            }
            None => "ERR: usage: KEY scancode".to_string(),
        },
        "LOAD" => match args.first() {
            Some(path) => match std::fs::read(path) {
                Ok(data) => {
                    let mut c64 = lock(system);
                    match c64.load_prg(&data) {
                        Ok((start, end)) => format!("OK ${start:04X}-${end:04X}"),
                        Err(e) => format!("ERR: {e}"),
                    }
                }
                Err(e) => format!("ERR: {path}: {e}"),
            },
            None => "ERR: usage: LOAD path".to_string(),
        },
        "ATTACH-DISK" => {
            let Some(path) = args.first() else {
                return "ERR: usage: ATTACH-DISK path [device]".to_string();
            };
            let device = match args.get(1) {
                Some(text) => match parse_number(text) {
                    Some(n @ 8..=11) => n as u8,
                    _ => return "ERR: device must be 8-11".to_string(),
                },
                None => 8,
            };
            let data = match std::fs::read(path) {
                Ok(data) => data,
                Err(e) => return format!("ERR: {path}: {e}"),
            };
            // A failed parse must leave any existing mount untouched,
            // so validate before touching the drive.
            let image = match D64Image::from_bytes(data) {
                Ok(image) => image,
                Err(_) => return "ERR: invalid d64".to_string(),
            };
            let mut c64 = lock(system);
            match c64.attach_disk(device, image) {
                Ok(()) => format!("OK device {device}"),
                Err(e) => format!("ERR: {e}"),
            }
        }
        "DETACH-DISKS" => {
            let mut c64 = lock(system);
            c64.detach_disks();
            "OK".to_string()
        }
        "RESET" => {
            let mut c64 = lock(system);
            c64.reset();
            "OK".to_string()
        }
        "HELP" => HELP_TEXT.to_string(),
        "QUIT" => {
            stop.store(true, Ordering::Relaxed);
            "BYE".to_string()
        }
        other => format!("ERR: unknown command {other}"),
    }
}

fn lock(system: &SharedC64) -> std::sync::MutexGuard<'_, C64> {
    system.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Parse decimal, `$hex` or `0xhex`.
fn parse_number(text: &str) -> Option<u32> {
    if let Some(hex) = text.strip_prefix('$') {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

fn parse_addr(args: &[&str], index: usize) -> Option<u16> {
    let value = parse_number(args.get(index)?)?;
    u16::try_from(value).ok()
}

fn parse_byte(args: &[&str], index: usize) -> Option<u8> {
    let value = parse_number(args.get(index)?)?;
    u8::try_from(value).ok()
}

/// Accept TCP connections and serve commands line by line.
///
/// The connection survives command errors; it closes on client
/// disconnect or QUIT.
///
/// # Errors
///
/// Fails if the port cannot be bound.
pub fn spawn_tcp(
    port: u16,
    system: SharedC64,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(("0.0.0.0", port))?;
    info!("TCP control server on port {port}");

    Ok(std::thread::spawn(move || {
        for stream in listener.incoming() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let Ok(stream) = stream else { continue };
            let system = Arc::clone(&system);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "?".to_string());
                info!("TCP client connected: {peer}");
                let mut writer = match stream.try_clone() {
                    Ok(w) => w,
                    Err(_) => return,
                };
                let reader = BufReader::new(stream);
                for line in reader.lines() {
                    let Ok(line) = line else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    let reply = handle_command(&line, &system, &stop);
                    let quitting = stop.load(Ordering::Relaxed);
                    if writeln!(writer, "{reply}").is_err() {
                        break;
                    }
                    if quitting {
                        break;
                    }
                }
                info!("TCP client disconnected: {peer}");
            });
        }
    }))
}

/// Serve one command per UDP datagram.
///
/// # Errors
///
/// Fails if the port cannot be bound.
pub fn spawn_udp(
    port: u16,
    system: SharedC64,
    stop: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let socket = UdpSocket::bind(("0.0.0.0", port))?;
    info!("UDP control server on port {port}");

    Ok(std::thread::spawn(move || {
        let mut buf = [0u8; 1024];
        loop {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let (len, src) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) => {
                    warn!("UDP receive error: {e}");
                    continue;
                }
            };
            let line = String::from_utf8_lossy(&buf[..len]);
            let reply = handle_command(line.trim(), &system, &stop);
            let _ = socket.send_to(reply.as_bytes(), src);
        }
    }))
}

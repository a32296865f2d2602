//! The C64 system: both CPUs, all chips, one clock.
//!
//! `step()` retires one main-CPU instruction and then pays the same
//! cycle count into every peripheral: CIA timers count down, the VIC
//! raster advances, and each attached drive runs its own CPU until it
//! has consumed the same budget. Interrupt lines are sampled at the top
//! of each step, so an IRQ raised during instruction K is serviced
//! before K+1 (unless masked) and a CIA2 edge becomes an NMI.
//!
//! LOAD requests take the KERNAL-hook path: a fetch from the $FFD5
//! vector with the KERNAL banked in is intercepted and serviced against
//! the attached D64 directly (the IEC byte-transfer path is not wired
//! end to end; the drives still execute their DOS ROM and answer ATN).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info};
use mos6502::{Bus as _, FLAG_C};

use crate::bus::C64Bus;
use crate::config::{C64Config, VideoStandard};
use crate::d64::D64Image;
use crate::drive::Drive1541;
use crate::error::C64Error;
use crate::keyboard::{KEYBOARD_BUFFER, KEYBOARD_BUFFER_CAPACITY, KEYBOARD_BUFFER_LEN};
use crate::memory::Memory;
use crate::petscii;
use crate::prg;
use crate::vic::Vic;

/// KERNAL LOAD entry point.
const KERNAL_LOAD: u16 = 0xFFD5;

/// Zero page used by the LOAD protocol.
const ZP_STATUS: u16 = 0x90;
const ZP_NAME_LEN: u16 = 0xB7;
const ZP_SECONDARY: u16 = 0xB9;
const ZP_DEVICE: u16 = 0xBA;
const ZP_NAME_PTR: u16 = 0xBB;

/// Serial status: end of file reached.
const STATUS_EOF: u8 = 0x40;
/// Serial status on a failed load: read timeout + EOF.
const STATUS_ERROR: u8 = 0x42;

/// 1541 error codes returned in A with carry set.
const ERR_FILE_NOT_FOUND: u8 = 4;
const ERR_DEVICE_NOT_PRESENT: u8 = 5;

/// Cycles charged for a hooked LOAD (the real transfer is instantaneous).
const HOOK_CYCLES: u32 = 64;

/// Screen RAM window scanned for boot detection.
const SCREEN_BASE: u16 = 0x0400;
const SCREEN_CELLS: u16 = 1000;

/// "READY." in screen codes.
const READY_CODES: [u8; 6] = [18, 5, 1, 4, 25, 46];

/// The whole machine.
pub struct C64 {
    cpu: mos6502::Cpu,
    bus: C64Bus,
    /// Drive units for devices 8-11.
    drives: [Option<Drive1541>; 4],
    /// DOS ROM handed to newly created drive units.
    drive_rom: Option<Vec<u8>>,
    standard: VideoStandard,

    /// CIA2 interrupt level from the previous step, for NMI edge detect.
    prev_cia2_irq: bool,
    /// Cycles retired by the main CPU (including hook charges).
    total_cycles: u64,

    /// Cross-thread stop request, polled between steps.
    stop: Arc<AtomicBool>,

    /// PETSCII bytes waiting for room in the KERNAL keyboard buffer.
    typed: VecDeque<u8>,
    /// PRG injected when the machine first reaches READY.
    autorun_prg: Option<Vec<u8>>,
    /// Text typed when the machine first reaches READY.
    boot_text: Option<String>,
    ready_seen: bool,
}

impl C64 {
    #[must_use]
    pub fn new(config: C64Config) -> Self {
        let memory = Memory::new(config.basic_rom, config.kernal_rom, config.char_rom);
        let vic = Vic::new(config.standard);
        let mut bus = C64Bus::new(memory, vic);

        // Port defaults the KERNAL would program anyway: CIA1 scans the
        // keyboard (A out, B in), CIA2 drives the serial lines released
        // and selects VIC bank 0.
        bus.cia1.write(0x02, 0xFF);
        bus.cia1.write(0x03, 0x00);
        bus.cia1.write(0x00, 0xFF);
        bus.cia2.write(0x02, 0x3F);
        bus.cia2.write(0x00, 0x3F);
        bus.sync_cia2_port_a();

        let mut cpu = mos6502::Cpu::new();
        cpu.reset(&mut bus);

        Self {
            cpu,
            bus,
            drives: [None, None, None, None],
            drive_rom: config.drive_rom,
            standard: config.standard,
            prev_cia2_irq: false,
            total_cycles: 0,
            stop: Arc::new(AtomicBool::new(false)),
            typed: VecDeque::new(),
            autorun_prg: None,
            boot_text: None,
            ready_seen: false,
        }
    }

    // -----------------------------------------------------------------
    // The tick loop
    // -----------------------------------------------------------------

    /// One tick: a single main-CPU instruction plus peripheral catch-up.
    ///
    /// Returns the cycles the instruction consumed.
    pub fn step(&mut self) -> u32 {
        if self.cpu.pc() == KERNAL_LOAD && self.bus.memory.hiram() {
            if let Some(cycles) = self.kernal_load_hook() {
                self.advance_peripherals(cycles);
                return cycles;
            }
        }

        // Sample the interrupt lines at the instruction boundary. IRQ is
        // a level (sources OR together); the CIA2 line is an NMI edge.
        self.cpu
            .set_irq(self.bus.cia1.irq_active() || self.bus.vic.irq_active());
        let cia2_irq = self.bus.cia2.irq_active();
        if cia2_irq && !self.prev_cia2_irq {
            self.cpu.nmi();
        }
        self.prev_cia2_irq = cia2_irq;

        let cycles = self.cpu.step(&mut self.bus);
        self.advance_peripherals(cycles);
        cycles
    }

    fn advance_peripherals(&mut self, cycles: u32) {
        self.bus.cia1.advance(cycles);
        self.bus.cia2.advance(cycles);
        self.bus.vic.advance(cycles);
        for drive in self.drives.iter_mut().flatten() {
            drive.run_cycles(cycles, &mut self.bus.iec);
        }
        self.total_cycles += u64::from(cycles);
        self.flush_typed();
    }

    /// Run until stopped, the cycle budget is exhausted, or (with
    /// `autoquit`) the machine reaches the READY prompt.
    ///
    /// Unless `turbo` is set, execution is paced to the standard's clock
    /// rate in frame-sized slices.
    pub fn run(&mut self, max_cycles: Option<u64>, autoquit: bool, turbo: bool) {
        let frame_cycles = u64::from(self.standard.cycles_per_frame());
        let hz = f64::from(self.standard.cpu_frequency());
        let started = Instant::now();
        let start_cycles = self.total_cycles;
        let mut next_frame = self.total_cycles + frame_cycles;

        while !self.stop.load(Ordering::Relaxed) {
            if let Some(limit) = max_cycles {
                if self.total_cycles - start_cycles >= limit {
                    break;
                }
            }

            self.step();

            if self.total_cycles >= next_frame {
                next_frame += frame_cycles;

                let ready = self.poll_boot_tasks();
                if autoquit && ready && self.typed.is_empty() {
                    break;
                }

                if !turbo {
                    let expected = (self.total_cycles - start_cycles) as f64 / hz;
                    let elapsed = started.elapsed().as_secs_f64();
                    if expected > elapsed {
                        std::thread::sleep(Duration::from_secs_f64(expected - elapsed));
                    }
                }
            }
        }
    }

    /// Once-per-frame housekeeping: detect the first READY prompt and
    /// perform the deferred boot work. Returns whether READY has been
    /// seen. External drivers of [`C64::step`] call this at frame
    /// boundaries; [`C64::run`] does it automatically.
    pub fn poll_boot_tasks(&mut self) -> bool {
        if !self.ready_seen && self.ready_on_screen() {
            self.ready_seen = true;
            debug!("READY. detected after {} cycles", self.total_cycles);
            self.on_ready();
        }
        self.ready_seen
    }

    /// Whether queued keyboard input is still waiting to drain.
    #[must_use]
    pub fn typed_pending(&self) -> bool {
        !self.typed.is_empty()
    }

    /// Deferred boot work: inject the queued PRG and keystrokes.
    fn on_ready(&mut self) {
        if let Some(data) = self.autorun_prg.take() {
            match prg::load_prg(&mut self.bus.memory, &data) {
                Ok((start, end)) => {
                    info!("PRG loaded at ${start:04X}-${end:04X}");
                    self.type_text("RUN\n");
                }
                Err(e) => info!("deferred PRG load failed: {e}"),
            }
        }
        if let Some(text) = self.boot_text.take() {
            self.type_text(&text);
        }
    }

    /// Handle to the stop flag for servers and signal handlers.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    // -----------------------------------------------------------------
    // KERNAL LOAD hook
    // -----------------------------------------------------------------

    /// Service a LOAD call against the addressed drive.
    ///
    /// Returns `None` for devices this hook does not own (tape, RS-232),
    /// letting the KERNAL routine run instead.
    fn kernal_load_hook(&mut self) -> Option<u32> {
        let device = self.bus.memory.ram_read(ZP_DEVICE);
        if !(8..=11).contains(&device) {
            return None;
        }

        let name_len = self.bus.memory.ram_read(ZP_NAME_LEN);
        let name_ptr = u16::from(self.bus.memory.ram_read(ZP_NAME_PTR))
            | (u16::from(self.bus.memory.ram_read(ZP_NAME_PTR + 1)) << 8);
        let name: String = (0..name_len)
            .map(|i| {
                petscii::petscii_to_ascii(self.bus.memory.ram_read(name_ptr.wrapping_add(i.into())))
            })
            .collect();
        let name = name.trim().to_string();
        let secondary = self.bus.memory.ram_read(ZP_SECONDARY);

        let outcome = self.fetch_file(device, &name);
        match outcome {
            Ok(data) => {
                let header = u16::from_le_bytes([data[0], data[1]]);
                let start = if secondary == 0 {
                    u16::from(self.cpu.x()) | (u16::from(self.cpu.y()) << 8)
                } else {
                    header
                };
                let payload = &data[2..];
                for (i, &byte) in payload.iter().enumerate() {
                    self.bus.memory.ram_write(start.wrapping_add(i as u16), byte);
                }
                let end = start.wrapping_add(payload.len() as u16);

                prg::set_basic_pointers(&mut self.bus.memory, end);
                self.cpu.set_x(end as u8);
                self.cpu.set_y((end >> 8) as u8);
                self.bus.memory.ram_write(ZP_STATUS, STATUS_EOF);
                self.cpu.set_flag(FLAG_C, false);
                info!("LOAD \"{name}\",{device}: ${start:04X}-${end:04X}");
            }
            Err(code) => {
                self.cpu.set_a(code);
                self.cpu.set_flag(FLAG_C, true);
                self.bus.memory.ram_write(ZP_STATUS, STATUS_ERROR);
                info!("LOAD \"{name}\",{device} failed (error {code})");
            }
        }

        self.simulate_rts();
        Some(HOOK_CYCLES)
    }

    /// File bytes (with load-address header) for a LOAD, or a 1541 error
    /// code.
    fn fetch_file(&self, device: u8, name: &str) -> Result<Vec<u8>, u8> {
        let drive = self.drives[(device - 8) as usize]
            .as_ref()
            .ok_or(ERR_DEVICE_NOT_PRESENT)?;
        let disk = drive.disk().ok_or(ERR_FILE_NOT_FOUND)?;

        if name == "$" {
            return Ok(disk.directory_listing());
        }
        let entry = disk.find_entry(name).ok_or(ERR_FILE_NOT_FOUND)?;
        let data = disk.read_file_at(&entry).map_err(|_| ERR_FILE_NOT_FOUND)?;
        if data.len() < 2 {
            return Err(ERR_FILE_NOT_FOUND);
        }
        Ok(data)
    }

    /// Pop the caller's return address as RTS would.
    fn simulate_rts(&mut self) {
        let sp = self.cpu.sp();
        let lo = self.bus.memory.ram_read(0x0100 | u16::from(sp.wrapping_add(1)));
        let hi = self.bus.memory.ram_read(0x0100 | u16::from(sp.wrapping_add(2)));
        self.cpu.set_sp(sp.wrapping_add(2));
        let ret = u16::from(lo) | (u16::from(hi) << 8);
        self.cpu.set_pc(ret.wrapping_add(1));
    }

    // -----------------------------------------------------------------
    // Keyboard injection
    // -----------------------------------------------------------------

    /// Queue text for the KERNAL keyboard buffer, converting to PETSCII.
    ///
    /// Bytes drain into $0277 (count at $C6) as the KERNAL consumes them,
    /// ten at a time.
    pub fn type_text(&mut self, text: &str) {
        for ch in text.chars() {
            if let Some(byte) = petscii::ascii_to_petscii(ch) {
                self.typed.push_back(byte);
            }
        }
    }

    /// Queue a single raw PETSCII code (server `KEY` command).
    pub fn push_key(&mut self, code: u8) {
        self.typed.push_back(code);
    }

    fn flush_typed(&mut self) {
        if self.typed.is_empty() || self.bus.memory.ram_read(KEYBOARD_BUFFER_LEN) != 0 {
            return;
        }
        let mut count = 0u8;
        while count < KEYBOARD_BUFFER_CAPACITY {
            let Some(byte) = self.typed.pop_front() else {
                break;
            };
            self.bus
                .memory
                .ram_write(KEYBOARD_BUFFER + u16::from(count), byte);
            count += 1;
        }
        self.bus.memory.ram_write(KEYBOARD_BUFFER_LEN, count);
    }

    /// Text queued when the machine first shows READY.
    pub fn queue_text_on_ready(&mut self, text: &str) {
        self.boot_text = Some(text.to_string());
    }

    /// PRG loaded (and RUN) when the machine first shows READY.
    pub fn queue_prg_on_ready(&mut self, data: Vec<u8>) {
        self.autorun_prg = Some(data);
    }

    // -----------------------------------------------------------------
    // Disks
    // -----------------------------------------------------------------

    /// Attach a disk image to a device (8-11), creating the drive unit on
    /// first use. Neither CPU is reset.
    ///
    /// # Errors
    ///
    /// Rejects device numbers outside 8-11.
    pub fn attach_disk(&mut self, device: u8, image: D64Image) -> Result<(), C64Error> {
        if !(8..=11).contains(&device) {
            return Err(C64Error::NoSuchDevice(device));
        }
        let slot = (device - 8) as usize;
        let drive = self.drives[slot]
            .get_or_insert_with(|| Drive1541::new(device, self.drive_rom.clone()));
        drive.insert_disk(image);
        Ok(())
    }

    /// Eject every mounted image. Drive units persist.
    pub fn detach_disks(&mut self) {
        for drive in self.drives.iter_mut().flatten() {
            drive.eject_disk();
        }
    }

    #[must_use]
    pub fn drive(&self, device: u8) -> Option<&Drive1541> {
        if !(8..=11).contains(&device) {
            return None;
        }
        self.drives[(device - 8) as usize].as_ref()
    }

    // -----------------------------------------------------------------
    // Observation and control
    // -----------------------------------------------------------------

    /// Reset the main CPU through the current banking ($FFFC). RAM and
    /// peripherals keep their state.
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.bus);
        self.prev_cia2_irq = false;
        self.ready_seen = false;
    }

    /// Banked, side-effect-free read (server PEEK).
    #[must_use]
    pub fn peek(&self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    /// Full-side-effect write (server POKE).
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.bus.write(addr, value);
    }

    /// Load a PRG into RAM immediately (server LOAD).
    ///
    /// # Errors
    ///
    /// Propagates header validation from [`prg::load_prg`].
    pub fn load_prg(&mut self, data: &[u8]) -> Result<(u16, u16), C64Error> {
        prg::load_prg(&mut self.bus.memory, data)
    }

    /// The 40x25 screen as ASCII text, one row per line.
    #[must_use]
    pub fn screen_text(&self) -> String {
        let mut out = String::with_capacity(25 * 41);
        for row in 0..25u16 {
            let mut line = String::with_capacity(40);
            for col in 0..40u16 {
                let code = self.bus.memory.ram_read(SCREEN_BASE + row * 40 + col);
                line.push(petscii::screen_code_to_ascii(code));
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    /// Does screen RAM currently show the READY prompt?
    #[must_use]
    pub fn ready_on_screen(&self) -> bool {
        let screen: Vec<u8> = (0..SCREEN_CELLS)
            .map(|i| self.bus.memory.ram_read(SCREEN_BASE + i))
            .collect();
        screen.windows(READY_CODES.len()).any(|w| w == READY_CODES)
    }

    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    #[must_use]
    pub fn standard(&self) -> VideoStandard {
        self.standard
    }

    #[must_use]
    pub fn cpu(&self) -> &mos6502::Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut mos6502::Cpu {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &C64Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut C64Bus {
        &mut self.bus
    }
}

//! 1541 disk drive unit.
//!
//! A complete small computer: its own 6502 at ~1 MHz, 2K of RAM, a 16K
//! DOS ROM at $C000, and two VIA register files: $1800 for the IEC
//! interface, $1C00 for the disk mechanics. Address map (partial decode,
//! as on the real board):
//!
//! ```text
//! $0000-$07FF  RAM (mirrored up to $17FF)
//! $1800-$1BFF  VIA1, IEC port      (register = addr & $0F)
//! $1C00-$1FFF  VIA2, head/motor    (register = addr & $0F)
//! $C000-$FFFF  DOS ROM
//! ```
//!
//! VIA1 port B carries the serial bus: bit 0 DATA in, bit 1 DATA out,
//! bit 2 CLK in, bit 3 CLK out, bit 4 ATN acknowledge, bit 7 ATN in.
//! While ATN is held and the acknowledge bit is clear, the board's gate
//! pulls DATA low with no CPU involvement; that hardware path is what
//! answers the bus-attention wakeup inside the protocol window.
//!
//! The drive CPU runs only when a DOS ROM is installed; without one the
//! unit still models the VIA/IEC coupling so bus behaviour stays right.
//! LOAD traffic is serviced by the KERNAL hook on the main CPU either
//! way (see `system.rs`).

use log::{debug, trace};

use crate::d64::D64Image;
use crate::iec::{IecBus, IecLine};

/// VIA1 port B: DATA input bit (1 = line low).
const VIA1_DATA_IN: u8 = 0x01;
/// VIA1 port B: DATA output bit (1 = pull low).
const VIA1_DATA_OUT: u8 = 0x02;
/// VIA1 port B: CLK input bit (1 = line low).
const VIA1_CLK_IN: u8 = 0x04;
/// VIA1 port B: CLK output bit (1 = pull low).
const VIA1_CLK_OUT: u8 = 0x08;
/// VIA1 port B: ATN acknowledge.
const VIA1_ATN_ACK: u8 = 0x10;
/// VIA1 port B: ATN input (1 = released).
const VIA1_ATN_IN: u8 = 0x80;

/// VIA register indices (6522 numbering).
const REG_ORB: usize = 0x0;
const REG_ORA: usize = 0x1;
const REG_DDRB: usize = 0x2;
const REG_IFR: usize = 0xD;
const REG_IER: usize = 0xE;

/// IFR bit for a CA1 (ATN) edge.
const IFR_CA1: u8 = 0x02;

/// The drive's address space.
struct DriveBus {
    ram: [u8; 0x0800],
    rom: Option<Vec<u8>>,
    via1: [u8; 16],
    via2: [u8; 16],
    /// External levels for VIA1 port B input bits, refreshed from the
    /// IEC bus before the CPU runs.
    via1_inputs: u8,
    /// VIA1 interrupt flags (CA1 = ATN edge).
    via1_ifr: u8,
    /// VIA1 interrupt enable.
    via1_ier: u8,
}

impl DriveBus {
    fn new(rom: Option<Vec<u8>>, device: u8) -> Self {
        if let Some(ref rom) = rom {
            assert!(rom.len() == 16384, "1541 DOS ROM must be 16384 bytes");
        }
        Self {
            ram: [0; 0x0800],
            rom,
            via1: [0; 16],
            via2: [0; 16],
            // Device-select jumpers on bits 5-6.
            via1_inputs: VIA1_ATN_IN | ((device - 8) << 5),
            via1_ifr: 0,
            via1_ier: 0,
        }
    }

    /// VIA1 port B as the CPU sees it: driven bits from the output
    /// register, the rest from the bus.
    fn via1_port_b(&self) -> u8 {
        let ddr = self.via1[REG_DDRB];
        (self.via1[REG_ORB] & ddr) | (self.via1_inputs & !ddr)
    }

    /// Output levels the drive presents to the IEC bus.
    fn via1_outputs(&self) -> u8 {
        self.via1[REG_ORB] & self.via1[REG_DDRB]
    }

    fn irq_active(&self) -> bool {
        self.via1_ifr & self.via1_ier & 0x7F != 0
    }
}

impl mos6502::Bus for DriveBus {
    fn read(&mut self, addr: u16) -> u8 {
        match addr {
            0x1800..=0x1BFF => match (addr & 0x0F) as usize {
                REG_ORB => self.via1_port_b(),
                REG_ORA => {
                    self.via1_ifr &= !IFR_CA1;
                    self.via1[REG_ORA]
                }
                REG_IFR => {
                    let any = if self.irq_active() { 0x80 } else { 0 };
                    self.via1_ifr | any
                }
                REG_IER => self.via1_ier | 0x80,
                reg => self.via1[reg],
            },
            0x1C00..=0x1FFF => self.via2[(addr & 0x0F) as usize],
            0xC000..=0xFFFF => match self.rom {
                Some(ref rom) => rom[(addr - 0xC000) as usize],
                None => 0xFF,
            },
            0x0000..=0x17FF => self.ram[(addr & 0x07FF) as usize],
            _ => 0xFF,
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x1800..=0x1BFF => match (addr & 0x0F) as usize {
                REG_ORA => {
                    self.via1_ifr &= !IFR_CA1;
                    self.via1[REG_ORA] = value;
                }
                REG_IFR => self.via1_ifr &= !(value & 0x7F),
                REG_IER => {
                    if value & 0x80 != 0 {
                        self.via1_ier |= value & 0x7F;
                    } else {
                        self.via1_ier &= !(value & 0x7F);
                    }
                }
                reg => self.via1[reg] = value,
            },
            0x1C00..=0x1FFF => self.via2[(addr & 0x0F) as usize] = value,
            0xC000..=0xFFFF => {}
            0x0000..=0x17FF => self.ram[(addr & 0x07FF) as usize] = value,
            _ => {}
        }
    }
}

/// One 1541 unit on the IEC bus.
pub struct Drive1541 {
    device: u8,
    cpu: mos6502::Cpu,
    bus: DriveBus,
    disk: Option<D64Image>,
    /// Cycle deficit carried between budget slices.
    pending: u32,
    /// Previous ATN level for edge detection (true = asserted).
    prev_atn: bool,
}

impl Drive1541 {
    /// Create a unit for device 8-11. A DOS ROM enables the drive CPU.
    #[must_use]
    pub fn new(device: u8, rom: Option<Vec<u8>>) -> Self {
        let mut bus = DriveBus::new(rom, device);
        let mut cpu = mos6502::Cpu::new();
        if bus.rom.is_some() {
            cpu.reset(&mut bus);
        }
        Self {
            device,
            cpu,
            bus,
            disk: None,
            pending: 0,
            prev_atn: false,
        }
    }

    #[must_use]
    pub fn device(&self) -> u8 {
        self.device
    }

    /// Insert a disk. The drive CPU is deliberately not reset.
    pub fn insert_disk(&mut self, disk: D64Image) {
        debug!("drive {}: disk inserted", self.device);
        self.disk = Some(disk);
    }

    pub fn eject_disk(&mut self) {
        if self.disk.take().is_some() {
            debug!("drive {}: disk ejected", self.device);
        }
    }

    #[must_use]
    pub fn has_disk(&self) -> bool {
        self.disk.is_some()
    }

    #[must_use]
    pub fn disk(&self) -> Option<&D64Image> {
        self.disk.as_ref()
    }

    #[must_use]
    pub fn cpu(&self) -> &mos6502::Cpu {
        &self.cpu
    }

    /// Run the drive for the same number of cycles the main CPU just
    /// consumed. The remainder carries to the next slice so both CPUs
    /// track the same clock over time.
    pub fn run_cycles(&mut self, budget: u32, iec: &mut IecBus) {
        self.sample_bus(iec);

        if self.bus.rom.is_none() {
            // No DOS ROM: only the hardware ATN path responds.
            self.drive_bus_lines(iec);
            return;
        }

        self.pending += budget;
        while self.pending > 0 {
            self.cpu.set_irq(self.bus.irq_active());
            let cycles = self.cpu.step(&mut self.bus);
            self.drive_bus_lines(iec);
            // The drive's own pulls are visible on its input bits too.
            self.sample_bus(iec);
            self.pending = self.pending.saturating_sub(cycles);
        }
    }

    /// Refresh VIA1 input bits from the bus and latch ATN edges.
    fn sample_bus(&mut self, iec: &IecBus) {
        let atn = iec.line_asserted(IecLine::Atn);
        let mut inputs = (self.device - 8) << 5;
        if iec.line_asserted(IecLine::Data) {
            inputs |= VIA1_DATA_IN;
        }
        if iec.line_asserted(IecLine::Clk) {
            inputs |= VIA1_CLK_IN;
        }
        if !atn {
            inputs |= VIA1_ATN_IN;
        }
        self.bus.via1_inputs = inputs;

        if atn && !self.prev_atn {
            trace!("drive {}: ATN asserted", self.device);
            self.bus.via1_ifr |= IFR_CA1;
        }
        self.prev_atn = atn;
    }

    /// Present VIA1 outputs on the bus, including the ATN-acknowledge
    /// hardware pull on DATA.
    fn drive_bus_lines(&mut self, iec: &mut IecBus) {
        let driver = IecBus::driver_for_device(self.device);
        let out = self.bus.via1_outputs();
        let atn_asserted = iec.line_asserted(IecLine::Atn);
        let auto_ack = atn_asserted && out & VIA1_ATN_ACK == 0;

        iec.set(driver, IecLine::Clk, out & VIA1_CLK_OUT != 0);
        iec.set(driver, IecLine::Data, out & VIA1_DATA_OUT != 0 || auto_ack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::d64::SIZE_35_TRACK;
    use mos6502::Bus;

    fn nop_rom() -> Vec<u8> {
        let mut rom = vec![0xEA; 16384];
        rom[0x3FFC] = 0x00; // reset vector -> $C000
        rom[0x3FFD] = 0xC0;
        rom
    }

    #[test]
    fn cpu_starts_at_reset_vector() {
        let drive = Drive1541::new(8, Some(nop_rom()));
        assert_eq!(drive.cpu().pc(), 0xC000);
    }

    #[test]
    fn bus_decode_ram_rom_via() {
        let mut bus = DriveBus::new(Some(nop_rom()), 8);
        bus.write(0x0000, 0xAB);
        assert_eq!(bus.read(0x0000), 0xAB);
        assert_eq!(bus.read(0x0800), 0xAB); // RAM mirror
        bus.write(0x1C03, 0x55);
        assert_eq!(bus.read(0x1C03), 0x55);
        assert_eq!(bus.read(0xC000), 0xEA);
        bus.write(0xC000, 0x00);
        assert_eq!(bus.read(0xC000), 0xEA); // ROM ignores writes
        assert_eq!(bus.read(0xB000), 0xFF); // open bus
    }

    #[test]
    fn atn_auto_acknowledge_pulls_data() {
        let mut iec = IecBus::new();
        let mut drive = Drive1541::new(8, None);

        drive.run_cycles(16, &mut iec);
        assert!(!iec.line_asserted(IecLine::Data));

        iec.set(crate::iec::C64_DRIVER, IecLine::Atn, true);
        drive.run_cycles(16, &mut iec);
        assert!(iec.line_asserted(IecLine::Data));

        iec.set(crate::iec::C64_DRIVER, IecLine::Atn, false);
        drive.run_cycles(16, &mut iec);
        assert!(!iec.line_asserted(IecLine::Data));
    }

    #[test]
    fn atn_ack_bit_releases_data() {
        let mut iec = IecBus::new();
        let mut drive = Drive1541::new(8, None);
        iec.set(crate::iec::C64_DRIVER, IecLine::Atn, true);

        // Acknowledge: DDRB output on bit 4, bit set.
        drive.bus.via1[REG_DDRB] = VIA1_ATN_ACK;
        drive.bus.via1[REG_ORB] = VIA1_ATN_ACK;
        drive.run_cycles(16, &mut iec);
        assert!(!iec.line_asserted(IecLine::Data));
    }

    #[test]
    fn atn_edge_sets_ca1_flag() {
        let mut iec = IecBus::new();
        let mut drive = Drive1541::new(8, Some(nop_rom()));
        drive.run_cycles(4, &mut iec);
        assert_eq!(drive.bus.via1_ifr & IFR_CA1, 0);

        iec.set(crate::iec::C64_DRIVER, IecLine::Atn, true);
        drive.run_cycles(4, &mut iec);
        assert_eq!(drive.bus.via1_ifr & IFR_CA1, IFR_CA1);
    }

    #[test]
    fn clk_output_reaches_bus() {
        let mut iec = IecBus::new();
        let mut drive = Drive1541::new(9, None);
        drive.bus.via1[REG_DDRB] = VIA1_CLK_OUT;
        drive.bus.via1[REG_ORB] = VIA1_CLK_OUT;
        drive.run_cycles(1, &mut iec);
        assert!(iec.line_asserted(IecLine::Clk));
        // Device 9's pull is independent of device 8's slot.
        assert!(!iec.line_high(IecLine::Clk));
    }

    #[test]
    fn rom_less_drive_does_not_execute() {
        let mut iec = IecBus::new();
        let mut drive = Drive1541::new(8, None);
        let pc = drive.cpu().pc();
        drive.run_cycles(1000, &mut iec);
        assert_eq!(drive.cpu().pc(), pc);
    }

    #[test]
    fn disk_attach_never_resets_the_cpu() {
        let mut iec = IecBus::new();
        let mut drive = Drive1541::new(8, Some(nop_rom()));
        drive.run_cycles(100, &mut iec);
        let pc = drive.cpu().pc();
        let disk = D64Image::from_bytes(vec![0; SIZE_35_TRACK]).unwrap();
        drive.insert_disk(disk);
        assert_eq!(drive.cpu().pc(), pc);
        assert!(drive.has_disk());
        drive.eject_disk();
        assert!(!drive.has_disk());
    }
}

//! MOS 6502/6510 CPU emulator.
//!
//! Instruction-stepped NMOS 6502: `step()` executes exactly one instruction
//! (or services a pending interrupt) and returns the number of clock cycles
//! it consumed. The machine drives its peripherals with that count, so the
//! CPU never needs to know what is attached to the bus.
//!
//! The 6510 variant used in the C64 differs only in its on-chip I/O port at
//! $00/$01, which belongs to the memory subsystem, not the CPU core.
//!
//! All 151 documented opcodes are implemented across the 13 addressing
//! modes, with page-crossing and branch penalties and NMOS decimal-mode
//! arithmetic. Undocumented opcodes retire as two-cycle NOPs.

#![allow(clippy::cast_possible_truncation)]

mod addressing;
mod opcodes;

pub use addressing::Mode;
pub use opcodes::{Op, Opcode, OPCODES};

use addressing::Operand;

/// Carry flag.
pub const FLAG_C: u8 = 0x01;
/// Zero flag.
pub const FLAG_Z: u8 = 0x02;
/// Interrupt-disable flag.
pub const FLAG_I: u8 = 0x04;
/// Decimal-mode flag.
pub const FLAG_D: u8 = 0x08;
/// Break flag (only ever exists on the stack, never in the register).
pub const FLAG_B: u8 = 0x10;
/// Unused flag, always reads 1.
pub const FLAG_U: u8 = 0x20;
/// Overflow flag.
pub const FLAG_V: u8 = 0x40;
/// Negative flag.
pub const FLAG_N: u8 = 0x80;

/// NMI vector at $FFFA/$FFFB.
pub const NMI_VECTOR: u16 = 0xFFFA;
/// Reset vector at $FFFC/$FFFD.
pub const RESET_VECTOR: u16 = 0xFFFC;
/// IRQ/BRK vector at $FFFE/$FFFF.
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Memory bus the CPU executes against.
///
/// The C64 main board and the 1541 drive board each implement this with
/// their own address decode.
pub trait Bus {
    /// Read a byte from the given address.
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte to the given address.
    fn write(&mut self, addr: u16, value: u8);
}

/// Register snapshot for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub p: u8,
}

/// The CPU state.
pub struct Cpu {
    a: u8,
    x: u8,
    y: u8,
    sp: u8,
    pc: u16,
    p: u8,

    /// Level-sensitive IRQ input, re-sampled at every instruction boundary.
    irq_line: bool,
    /// Edge-latched NMI, cleared when serviced.
    nmi_pending: bool,

    /// Total cycles retired since construction.
    cycles: u64,
}

impl Cpu {
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            p: FLAG_I | FLAG_U,
            irq_line: false,
            nmi_pending: false,
            cycles: 0,
        }
    }

    /// Reset: load PC from the reset vector, SP to $FD, I set.
    ///
    /// RAM contents are untouched; reset is a CPU event, not a power cycle.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.p = FLAG_I | FLAG_U;
        self.irq_line = false;
        self.nmi_pending = false;
        self.pc = self.read_word(bus, RESET_VECTOR);
        self.cycles += 7;
    }

    /// Drive the level-sensitive IRQ input.
    ///
    /// The caller re-asserts this every tick from the OR of all IRQ
    /// sources; the CPU samples it before each instruction fetch.
    pub fn set_irq(&mut self, asserted: bool) {
        self.irq_line = asserted;
    }

    /// Latch an NMI edge. Serviced at the next instruction boundary.
    pub fn nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Execute one instruction (or service a pending interrupt).
    ///
    /// Returns the cycles consumed.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let consumed = if self.nmi_pending {
            self.nmi_pending = false;
            self.service_interrupt(bus, NMI_VECTOR)
        } else if self.irq_line && self.p & FLAG_I == 0 {
            self.service_interrupt(bus, IRQ_VECTOR)
        } else {
            let opcode = self.fetch(bus);
            let entry = OPCODES[opcode as usize];
            self.execute(bus, entry)
        };
        self.cycles += u64::from(consumed);
        consumed
    }

    // -----------------------------------------------------------------
    // Register access
    // -----------------------------------------------------------------

    #[must_use]
    pub fn registers(&self) -> Registers {
        Registers {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            pc: self.pc,
            p: self.p,
        }
    }

    #[must_use]
    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    #[must_use]
    pub fn a(&self) -> u8 {
        self.a
    }

    pub fn set_a(&mut self, value: u8) {
        self.a = value;
    }

    #[must_use]
    pub fn x(&self) -> u8 {
        self.x
    }

    pub fn set_x(&mut self, value: u8) {
        self.x = value;
    }

    #[must_use]
    pub fn y(&self) -> u8 {
        self.y
    }

    pub fn set_y(&mut self, value: u8) {
        self.y = value;
    }

    #[must_use]
    pub fn sp(&self) -> u8 {
        self.sp
    }

    pub fn set_sp(&mut self, value: u8) {
        self.sp = value;
    }

    #[must_use]
    pub fn status(&self) -> u8 {
        self.p | FLAG_U
    }

    pub fn set_status(&mut self, value: u8) {
        self.p = value | FLAG_U;
    }

    /// Total cycles retired since construction.
    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    #[must_use]
    pub fn flag(&self, mask: u8) -> bool {
        self.p & mask != 0
    }

    pub fn set_flag(&mut self, mask: u8, set: bool) {
        if set {
            self.p |= mask;
        } else {
            self.p &= !mask;
        }
    }

    // -----------------------------------------------------------------
    // Bus helpers
    // -----------------------------------------------------------------

    fn fetch<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        value
    }

    fn fetch_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch(bus);
        let hi = self.fetch(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn read_word<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = bus.read(addr);
        let hi = bus.read(addr.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    fn push<B: Bus>(&mut self, bus: &mut B, value: u8) {
        bus.write(0x0100 | u16::from(self.sp), value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop<B: Bus>(&mut self, bus: &mut B) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 | u16::from(self.sp))
    }

    fn push_word<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.push(bus, (value >> 8) as u8);
        self.push(bus, value as u8);
    }

    fn pop_word<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pop(bus);
        let hi = self.pop(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Push PC and status (B clear), set I, jump through a vector.
    fn service_interrupt<B: Bus>(&mut self, bus: &mut B, vector: u16) -> u32 {
        self.push_word(bus, self.pc);
        self.push(bus, (self.p & !FLAG_B) | FLAG_U);
        self.set_flag(FLAG_I, true);
        self.pc = self.read_word(bus, vector);
        7
    }

    // -----------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------

    fn execute<B: Bus>(&mut self, bus: &mut B, entry: Opcode) -> u32 {
        let (operand, page_crossed) = self.resolve(bus, entry.mode);
        let mut cycles = u32::from(entry.cycles);
        if page_crossed && entry.op.read_penalty() {
            cycles += 1;
        }

        match entry.op {
            // Loads and stores
            Op::Lda => {
                self.a = self.value(bus, &operand);
                self.set_zn(self.a);
            }
            Op::Ldx => {
                self.x = self.value(bus, &operand);
                self.set_zn(self.x);
            }
            Op::Ldy => {
                self.y = self.value(bus, &operand);
                self.set_zn(self.y);
            }
            Op::Sta => bus.write(operand.address(), self.a),
            Op::Stx => bus.write(operand.address(), self.x),
            Op::Sty => bus.write(operand.address(), self.y),

            // Transfers
            Op::Tax => {
                self.x = self.a;
                self.set_zn(self.x);
            }
            Op::Tay => {
                self.y = self.a;
                self.set_zn(self.y);
            }
            Op::Txa => {
                self.a = self.x;
                self.set_zn(self.a);
            }
            Op::Tya => {
                self.a = self.y;
                self.set_zn(self.a);
            }
            Op::Tsx => {
                self.x = self.sp;
                self.set_zn(self.x);
            }
            Op::Txs => self.sp = self.x,

            // Arithmetic
            Op::Adc => {
                let value = self.value(bus, &operand);
                self.adc(value);
            }
            Op::Sbc => {
                let value = self.value(bus, &operand);
                self.sbc(value);
            }
            Op::Cmp => {
                let value = self.value(bus, &operand);
                self.compare(self.a, value);
            }
            Op::Cpx => {
                let value = self.value(bus, &operand);
                self.compare(self.x, value);
            }
            Op::Cpy => {
                let value = self.value(bus, &operand);
                self.compare(self.y, value);
            }

            // Logic
            Op::And => {
                self.a &= self.value(bus, &operand);
                self.set_zn(self.a);
            }
            Op::Ora => {
                self.a |= self.value(bus, &operand);
                self.set_zn(self.a);
            }
            Op::Eor => {
                self.a ^= self.value(bus, &operand);
                self.set_zn(self.a);
            }
            Op::Bit => {
                let value = self.value(bus, &operand);
                self.set_flag(FLAG_Z, self.a & value == 0);
                self.set_flag(FLAG_N, value & 0x80 != 0);
                self.set_flag(FLAG_V, value & 0x40 != 0);
            }

            // Shifts and rotates
            Op::Asl => self.modify(bus, &operand, Self::asl),
            Op::Lsr => self.modify(bus, &operand, Self::lsr),
            Op::Rol => self.modify(bus, &operand, Self::rol),
            Op::Ror => self.modify(bus, &operand, Self::ror),

            // Increments and decrements
            Op::Inc => self.modify(bus, &operand, |_, v| v.wrapping_add(1)),
            Op::Dec => self.modify(bus, &operand, |_, v| v.wrapping_sub(1)),
            Op::Inx => {
                self.x = self.x.wrapping_add(1);
                self.set_zn(self.x);
            }
            Op::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.set_zn(self.x);
            }
            Op::Iny => {
                self.y = self.y.wrapping_add(1);
                self.set_zn(self.y);
            }
            Op::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.set_zn(self.y);
            }

            // Branches
            Op::Bcc => cycles += self.branch(&operand, !self.flag(FLAG_C)),
            Op::Bcs => cycles += self.branch(&operand, self.flag(FLAG_C)),
            Op::Bne => cycles += self.branch(&operand, !self.flag(FLAG_Z)),
            Op::Beq => cycles += self.branch(&operand, self.flag(FLAG_Z)),
            Op::Bpl => cycles += self.branch(&operand, !self.flag(FLAG_N)),
            Op::Bmi => cycles += self.branch(&operand, self.flag(FLAG_N)),
            Op::Bvc => cycles += self.branch(&operand, !self.flag(FLAG_V)),
            Op::Bvs => cycles += self.branch(&operand, self.flag(FLAG_V)),

            // Jumps and subroutines
            Op::Jmp => self.pc = operand.address(),
            Op::Jsr => {
                let target = operand.address();
                let ret = self.pc.wrapping_sub(1);
                self.push_word(bus, ret);
                self.pc = target;
            }
            Op::Rts => {
                self.pc = self.pop_word(bus).wrapping_add(1);
            }
            Op::Rti => {
                let p = self.pop(bus);
                self.p = (p & !FLAG_B) | FLAG_U;
                self.pc = self.pop_word(bus);
            }

            // Stack
            Op::Pha => self.push(bus, self.a),
            Op::Php => self.push(bus, self.p | FLAG_B | FLAG_U),
            Op::Pla => {
                self.a = self.pop(bus);
                self.set_zn(self.a);
            }
            Op::Plp => {
                let p = self.pop(bus);
                self.p = (p & !FLAG_B) | FLAG_U;
            }

            // Flags
            Op::Clc => self.set_flag(FLAG_C, false),
            Op::Sec => self.set_flag(FLAG_C, true),
            Op::Cli => self.set_flag(FLAG_I, false),
            Op::Sei => self.set_flag(FLAG_I, true),
            Op::Cld => self.set_flag(FLAG_D, false),
            Op::Sed => self.set_flag(FLAG_D, true),
            Op::Clv => self.set_flag(FLAG_V, false),

            // BRK pushes the address of the byte after its padding byte,
            // with B set in the pushed copy only.
            Op::Brk => {
                let ret = self.pc.wrapping_add(1);
                self.push_word(bus, ret);
                self.push(bus, self.p | FLAG_B | FLAG_U);
                self.set_flag(FLAG_I, true);
                self.pc = self.read_word(bus, IRQ_VECTOR);
            }

            Op::Nop | Op::Ill => {}
        }

        cycles
    }

    /// Read the operand value for a value-consuming instruction.
    fn value<B: Bus>(&mut self, bus: &mut B, operand: &Operand) -> u8 {
        match *operand {
            Operand::Immediate(value) => value,
            Operand::Address(addr) => bus.read(addr),
            Operand::Accumulator => self.a,
            Operand::None | Operand::Relative(_) => 0,
        }
    }

    /// Read-modify-write through the accumulator or memory.
    fn modify<B: Bus>(&mut self, bus: &mut B, operand: &Operand, f: fn(&mut Self, u8) -> u8) {
        match *operand {
            Operand::Accumulator => {
                let value = self.a;
                let result = f(self, value);
                self.a = result;
                self.set_zn(result);
            }
            Operand::Address(addr) => {
                let value = bus.read(addr);
                let result = f(self, value);
                bus.write(addr, result);
                self.set_zn(result);
            }
            _ => {}
        }
    }

    /// Taken branches cost one extra cycle, two if they cross a page.
    fn branch(&mut self, operand: &Operand, taken: bool) -> u32 {
        if !taken {
            return 0;
        }
        let Operand::Relative(offset) = *operand else {
            return 0;
        };
        let target = self.pc.wrapping_add(offset as u16);
        let crossed = target & 0xFF00 != self.pc & 0xFF00;
        self.pc = target;
        if crossed {
            2
        } else {
            1
        }
    }

    fn set_zn(&mut self, value: u8) {
        self.set_flag(FLAG_Z, value == 0);
        self.set_flag(FLAG_N, value & 0x80 != 0);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.set_flag(FLAG_C, register >= value);
        self.set_zn(register.wrapping_sub(value));
    }

    // -----------------------------------------------------------------
    // ALU
    // -----------------------------------------------------------------

    fn adc(&mut self, value: u8) {
        if self.flag(FLAG_D) {
            self.adc_decimal(value);
        } else {
            self.adc_binary(value);
        }
    }

    fn adc_binary(&mut self, value: u8) {
        let carry = u16::from(self.p & FLAG_C);
        let sum = u16::from(self.a) + u16::from(value) + carry;
        let result = sum as u8;
        self.set_flag(FLAG_C, sum > 0xFF);
        self.set_flag(FLAG_V, (self.a ^ result) & (value ^ result) & 0x80 != 0);
        self.set_zn(result);
        self.a = result;
    }

    /// NMOS BCD addition: Z/N/V come from the binary intermediate, C from
    /// the adjusted high nibble.
    fn adc_decimal(&mut self, value: u8) {
        let a = u16::from(self.a);
        let v = u16::from(value);
        let carry = u16::from(self.p & FLAG_C);

        let mut low = (a & 0x0F) + (v & 0x0F) + carry;
        if low > 9 {
            low += 6;
        }
        let mut high = (a >> 4) + (v >> 4) + u16::from(low > 0x0F);

        let binary = (a + v + carry) as u8;
        self.set_flag(FLAG_Z, binary == 0);
        self.set_flag(FLAG_N, high & 0x08 != 0);
        self.set_flag(
            FLAG_V,
            (a ^ u16::from(binary)) & (v ^ u16::from(binary)) & 0x80 != 0,
        );

        if high > 9 {
            high += 6;
        }
        self.set_flag(FLAG_C, high > 0x0F);
        self.a = ((high << 4) | (low & 0x0F)) as u8;
    }

    fn sbc(&mut self, value: u8) {
        if self.flag(FLAG_D) {
            self.sbc_decimal(value);
        } else {
            // SBC is ADC of the one's complement.
            self.adc_binary(!value);
        }
    }

    fn sbc_decimal(&mut self, value: u8) {
        let a = i16::from(self.a);
        let v = i16::from(value);
        let borrow = i16::from(self.p & FLAG_C == 0);

        let mut low = (a & 0x0F) - (v & 0x0F) - borrow;
        if low < 0 {
            low = ((low - 6) & 0x0F) - 0x10;
        }
        let mut high = (a >> 4) - (v >> 4) - i16::from(low < 0);
        if high < 0 {
            high = (high - 6) & 0x0F;
        }

        let binary = a.wrapping_sub(v).wrapping_sub(borrow);
        self.set_flag(FLAG_C, binary >= 0);
        self.set_flag(FLAG_Z, binary as u8 == 0);
        self.set_flag(FLAG_N, binary & 0x80 != 0);
        self.set_flag(FLAG_V, (a ^ binary) & (!v ^ binary) & 0x80 != 0);

        self.a = ((high << 4) | (low & 0x0F)) as u8;
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x80 != 0);
        value << 1
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x01 != 0);
        value >> 1
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = self.p & FLAG_C;
        self.set_flag(FLAG_C, value & 0x80 != 0);
        (value << 1) | carry_in
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = if self.flag(FLAG_C) { 0x80 } else { 0 };
        self.set_flag(FLAG_C, value & 0x01 != 0);
        (value >> 1) | carry_in
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

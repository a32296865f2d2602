//! Commodore 64 emulator core.
//!
//! The main 6510 executes against 64K of RAM with BASIC, KERNAL and
//! character ROM overlays switched by the processor port at $0001, and a
//! memory-mapped I/O window hosting the VIC-II, SID, colour RAM and two
//! CIAs. A 1541 drive (its own 6502, 2K RAM and DOS ROM) hangs off the
//! serial IEC bus. The [`C64`] system interleaves both CPUs one main-CPU
//! instruction at a time.
//!
//! Rendering, graphics and remote-control front-ends live outside this
//! crate: the screen is read through back-door accessors, and the
//! [`server`] module speaks a line-oriented control protocol for them.

mod bus;
mod cia;
mod config;
mod d64;
mod drive;
mod error;
mod iec;
mod keyboard;
mod memory;
pub mod petscii;
pub mod prg;
mod roms;
mod sid;
mod system;
mod vic;

pub mod server;

pub use bus::C64Bus;
pub use cia::Cia;
pub use config::{C64Config, VideoStandard};
pub use d64::{D64Image, DirEntry, FileType};
pub use drive::Drive1541;
pub use error::C64Error;
pub use iec::{IecBus, IecLine, C64_DRIVER};
pub use keyboard::KeyboardMatrix;
pub use memory::Memory;
pub use roms::RomSet;
pub use sid::Sid;
pub use system::C64;
pub use vic::Vic;

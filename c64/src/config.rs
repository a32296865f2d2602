//! Machine configuration: video standard and ROM images.

/// Video standard, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStandard {
    /// 6569 VIC-II: 312 lines x 63 cycles, CPU at 985,248 Hz.
    Pal,
    /// 6567 VIC-II: 263 lines x 65 cycles, CPU at 1,022,727 Hz.
    Ntsc,
}

impl VideoStandard {
    #[must_use]
    pub fn cpu_frequency(self) -> u32 {
        match self {
            VideoStandard::Pal => 985_248,
            VideoStandard::Ntsc => 1_022_727,
        }
    }

    #[must_use]
    pub fn raster_lines(self) -> u16 {
        match self {
            VideoStandard::Pal => 312,
            VideoStandard::Ntsc => 263,
        }
    }

    #[must_use]
    pub fn cycles_per_line(self) -> u32 {
        match self {
            VideoStandard::Pal => 63,
            VideoStandard::Ntsc => 65,
        }
    }

    /// Cycles in one full frame, the throttle granule.
    #[must_use]
    pub fn cycles_per_frame(self) -> u32 {
        u32::from(self.raster_lines()) * self.cycles_per_line()
    }
}

/// Configuration for constructing a [`crate::C64`].
pub struct C64Config {
    /// Video standard (PAL default).
    pub standard: VideoStandard,
    /// KERNAL ROM (8,192 bytes).
    pub kernal_rom: Vec<u8>,
    /// BASIC ROM (8,192 bytes).
    pub basic_rom: Vec<u8>,
    /// Character ROM (4,096 bytes); optional without a renderer attached.
    pub char_rom: Option<Vec<u8>>,
    /// 1541 DOS ROM (16,384 bytes); enables drive CPU modelling.
    pub drive_rom: Option<Vec<u8>>,
}

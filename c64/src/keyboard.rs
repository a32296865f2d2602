//! C64 keyboard matrix.
//!
//! An 8x8 matrix scanned through CIA1: port A drives an active-low
//! column-select mask, port B reads the OR of pressed-key rows for the
//! selected columns (also active low). Typed input normally arrives
//! through the KERNAL keyboard buffer instead (see
//! [`crate::C64::type_text`]); the matrix exists for programs that scan
//! the hardware directly.

/// KERNAL keyboard buffer at $0277-$0280.
pub const KEYBOARD_BUFFER: u16 = 0x0277;
/// Pending-key count at $C6.
pub const KEYBOARD_BUFFER_LEN: u16 = 0x00C6;
/// The buffer holds at most ten keys.
pub const KEYBOARD_BUFFER_CAPACITY: u8 = 10;

/// 8x8 keyboard matrix. Bit set = key held.
pub struct KeyboardMatrix {
    columns: [u8; 8],
}

impl KeyboardMatrix {
    #[must_use]
    pub fn new() -> Self {
        Self { columns: [0; 8] }
    }

    /// Press or release the key at (column, row).
    pub fn set_key(&mut self, column: u8, row: u8, pressed: bool) {
        if column < 8 && row < 8 {
            if pressed {
                self.columns[column as usize] |= 1 << row;
            } else {
                self.columns[column as usize] &= !(1 << row);
            }
        }
    }

    /// Scan with an active-low column mask from CIA1 port A.
    ///
    /// Returns active-low row data: a 0 bit means some key in a selected
    /// column holds that row.
    #[must_use]
    pub fn scan(&self, column_mask: u8) -> u8 {
        let mut rows = 0u8;
        for (column, &held) in self.columns.iter().enumerate() {
            if column_mask & (1 << column) == 0 {
                rows |= held;
            }
        }
        !rows
    }

    pub fn release_all(&mut self) {
        self.columns = [0; 8];
    }
}

impl Default for KeyboardMatrix {
    fn default() -> Self {
        Self::new()
    }
}

//! D64 disk images.
//!
//! Byte-level dump of a 1541 disk: 35 tracks (174,848 bytes) or 40
//! tracks (196,608 bytes), 256-byte sectors, with the zone layout
//!
//! ```text
//! tracks  1-17: 21 sectors
//! tracks 18-24: 19 sectors
//! tracks 25-30: 18 sectors
//! tracks 31-40: 17 sectors
//! ```
//!
//! Track 18 sector 0 holds the BAM (disk name, ID, per-track free
//! counts); the directory chain starts at track 18 sector 1. Files are
//! linked lists of sectors: bytes 0/1 of each sector point at the next
//! track/sector, and in the final sector (track link 0) byte 1 gives the
//! count of payload bytes used.

use crate::error::C64Error;
use crate::petscii;

/// 35-track image size.
pub const SIZE_35_TRACK: usize = 174_848;
/// 40-track image size.
pub const SIZE_40_TRACK: usize = 196_608;

const SECTOR_SIZE: usize = 256;
const DIRECTORY_TRACK: u8 = 18;
/// Payload bytes per chained sector.
const CHAIN_PAYLOAD: usize = 254;

/// Sectors per track, 1-indexed (index 0 unused).
const SECTORS_PER_TRACK: [u8; 41] = [
    0, //
    21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, 21, // 1-17
    19, 19, 19, 19, 19, 19, 19, // 18-24
    18, 18, 18, 18, 18, 18, // 25-30
    17, 17, 17, 17, 17, // 31-35
    17, 17, 17, 17, 17, // 36-40
];

/// Byte offset of sector 0 of each track.
const TRACK_OFFSETS: [usize; 41] = {
    let mut offsets = [0usize; 41];
    let mut track = 1;
    let mut offset = 0;
    while track <= 40 {
        offsets[track] = offset;
        offset += SECTORS_PER_TRACK[track] as usize * SECTOR_SIZE;
        track += 1;
    }
    offsets
};

/// CBM DOS file types from the low bits of the directory type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Del,
    Seq,
    Prg,
    Usr,
    Rel,
    Unknown,
}

impl FileType {
    #[must_use]
    pub fn from_type_byte(byte: u8) -> Self {
        match byte & 0x07 {
            0 => FileType::Del,
            1 => FileType::Seq,
            2 => FileType::Prg,
            3 => FileType::Usr,
            4 => FileType::Rel,
            _ => FileType::Unknown,
        }
    }

    /// Three-letter label as LIST shows it.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            FileType::Del => "DEL",
            FileType::Seq => "SEQ",
            FileType::Prg => "PRG",
            FileType::Usr => "USR",
            FileType::Rel => "REL",
            FileType::Unknown => "???",
        }
    }
}

/// One directory slot.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub file_type: FileType,
    /// Bit 7 of the type byte: file closed properly.
    pub closed: bool,
    /// First track/sector of the data chain.
    pub track: u8,
    pub sector: u8,
    /// Raw 16-byte PETSCII name, $A0-padded.
    pub name: [u8; 16],
    /// Size in blocks (little-endian field in the slot).
    pub blocks: u16,
}

impl DirEntry {
    /// Name as trimmed ASCII.
    #[must_use]
    pub fn name_string(&self) -> String {
        let text: String = self.name.iter().map(|&b| petscii::petscii_to_ascii(b)).collect();
        text.trim_end().to_string()
    }

    /// Does an ASCII search name match this entry?
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        self.name_string().eq_ignore_ascii_case(name.trim())
    }
}

/// A read-only D64 disk image.
pub struct D64Image {
    data: Vec<u8>,
    tracks: u8,
}

impl D64Image {
    /// Validate and take ownership of a raw image.
    ///
    /// # Errors
    ///
    /// Rejects anything that is not exactly a 35- or 40-track image.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, C64Error> {
        let tracks = match data.len() {
            SIZE_35_TRACK => 35,
            SIZE_40_TRACK => 40,
            other => {
                return Err(C64Error::InvalidD64(format!(
                    "size {other} bytes (expected {SIZE_35_TRACK} or {SIZE_40_TRACK})"
                )))
            }
        };
        Ok(Self { data, tracks })
    }

    #[must_use]
    pub fn track_count(&self) -> u8 {
        self.tracks
    }

    /// Sectors on a track, 0 for out-of-range tracks.
    #[must_use]
    pub fn sectors_per_track(&self, track: u8) -> u8 {
        if track >= 1 && track <= self.tracks {
            SECTORS_PER_TRACK[track as usize]
        } else {
            0
        }
    }

    /// Byte offset of a track/sector, or `None` when out of range.
    #[must_use]
    pub fn track_sector_offset(&self, track: u8, sector: u8) -> Option<usize> {
        if track < 1 || track > self.tracks || sector >= SECTORS_PER_TRACK[track as usize] {
            return None;
        }
        Some(TRACK_OFFSETS[track as usize] + sector as usize * SECTOR_SIZE)
    }

    /// A 256-byte sector.
    #[must_use]
    pub fn read_sector(&self, track: u8, sector: u8) -> Option<&[u8]> {
        let offset = self.track_sector_offset(track, sector)?;
        Some(&self.data[offset..offset + SECTOR_SIZE])
    }

    /// Disk name from the BAM (16 PETSCII bytes at $90).
    #[must_use]
    pub fn disk_name(&self) -> [u8; 16] {
        let mut name = [0xA0; 16];
        if let Some(bam) = self.read_sector(DIRECTORY_TRACK, 0) {
            name.copy_from_slice(&bam[0x90..0xA0]);
        }
        name
    }

    /// Disk ID from the BAM ($A2-$A3).
    #[must_use]
    pub fn disk_id(&self) -> [u8; 2] {
        match self.read_sector(DIRECTORY_TRACK, 0) {
            Some(bam) => [bam[0xA2], bam[0xA3]],
            None => [0xA0, 0xA0],
        }
    }

    /// DOS version bytes from the BAM ($A5-$A6), "2A" on a standard disk.
    #[must_use]
    pub fn dos_type(&self) -> [u8; 2] {
        match self.read_sector(DIRECTORY_TRACK, 0) {
            Some(bam) => [bam[0xA5], bam[0xA6]],
            None => [0x32, 0x41],
        }
    }

    /// Free-block count from the BAM per-track entries, skipping the
    /// directory track as DOS does.
    ///
    /// On a 40-track image, tracks 36-40 keep their counts in the BAM
    /// extension area at $AC (the Dolphin DOS layout).
    #[must_use]
    pub fn blocks_free(&self) -> u16 {
        let Some(bam) = self.read_sector(DIRECTORY_TRACK, 0) else {
            return 0;
        };
        let mut free = 0u16;
        for track in 1..=self.tracks {
            if track == DIRECTORY_TRACK {
                continue;
            }
            let offset = if track <= 35 {
                4 * track as usize
            } else {
                0xAC + 4 * (track as usize - 36)
            };
            free += u16::from(bam[offset]);
        }
        free
    }

    /// Walk the directory chain from track 18 sector 1.
    ///
    /// Scratched slots (type byte 0) are skipped; a malformed chain stops
    /// the walk rather than failing the whole directory.
    #[must_use]
    pub fn directory(&self) -> Vec<DirEntry> {
        let mut entries = Vec::new();
        let mut seen = Vec::new();
        let mut track = DIRECTORY_TRACK;
        let mut sector = 1;

        while track != 0 {
            if seen.contains(&(track, sector)) {
                break;
            }
            seen.push((track, sector));
            let Some(data) = self.read_sector(track, sector) else {
                break;
            };

            for slot in 0..8 {
                let raw = &data[2 + slot * 32..2 + slot * 32 + 30];
                let type_byte = raw[0];
                if type_byte == 0 || raw[1] == 0 {
                    continue;
                }
                let mut name = [0u8; 16];
                name.copy_from_slice(&raw[3..19]);
                entries.push(DirEntry {
                    file_type: FileType::from_type_byte(type_byte),
                    closed: type_byte & 0x80 != 0,
                    track: raw[1],
                    sector: raw[2],
                    name,
                    blocks: u16::from(raw[28]) | (u16::from(raw[29]) << 8),
                });
            }

            let next_track = data[0];
            let next_sector = data[1];
            track = next_track;
            sector = next_sector;
        }

        entries
    }

    /// Find a directory entry by ASCII name.
    #[must_use]
    pub fn find_entry(&self, name: &str) -> Option<DirEntry> {
        self.directory().into_iter().find(|e| e.matches(name))
    }

    /// Read a file's bytes by following its sector chain.
    ///
    /// In the final sector, byte 1 holds the number of payload bytes
    /// used. For a PRG the result still carries its two-byte load
    /// address up front.
    ///
    /// # Errors
    ///
    /// A link outside the disk geometry or a cycle in the chain is
    /// reported as a malformed image.
    pub fn read_file_at(&self, entry: &DirEntry) -> Result<Vec<u8>, C64Error> {
        let mut data = Vec::new();
        let mut seen = Vec::new();
        let mut track = entry.track;
        let mut sector = entry.sector;

        while track != 0 {
            if seen.contains(&(track, sector)) {
                return Err(C64Error::InvalidD64(format!(
                    "cyclic sector chain at track {track} sector {sector}"
                )));
            }
            seen.push((track, sector));

            let block = self.read_sector(track, sector).ok_or_else(|| {
                C64Error::InvalidD64(format!("chain leaves disk at track {track} sector {sector}"))
            })?;

            let next_track = block[0];
            let next_sector = block[1];
            if next_track == 0 {
                let used = (next_sector as usize).min(CHAIN_PAYLOAD);
                data.extend_from_slice(&block[2..2 + used]);
            } else {
                data.extend_from_slice(&block[2..]);
            }
            track = next_track;
            sector = next_sector;
        }

        Ok(data)
    }

    /// The directory rendered the way `LOAD"$",8` delivers it: a BASIC
    /// program (with its $0801 load address) whose line numbers are block
    /// counts.
    #[must_use]
    pub fn directory_listing(&self) -> Vec<u8> {
        let mut prg = vec![0x01, 0x08];
        let mut addr: u16 = 0x0801;

        let name: String = self
            .disk_name()
            .iter()
            .map(|&b| petscii::petscii_to_ascii(b))
            .collect();
        let id: String = self.disk_id().iter().map(|&b| petscii::petscii_to_ascii(b)).collect();
        let dos: String = self.dos_type().iter().map(|&b| petscii::petscii_to_ascii(b)).collect();
        addr = push_basic_line(&mut prg, addr, 0, &format!("\"{name}\" {id} {dos}"));

        for entry in self.directory() {
            let name = entry.name_string();
            let quoted = format!("\"{name}\"");
            let align = match entry.blocks {
                0..=9 => "   ",
                10..=99 => "  ",
                _ => " ",
            };
            let text = format!(
                "{align}{quoted}{:width$} {}",
                "",
                entry.file_type.label(),
                width = 16 - name.len()
            );
            addr = push_basic_line(&mut prg, addr, entry.blocks, &text);
        }

        push_basic_line(&mut prg, addr, self.blocks_free(), "BLOCKS FREE.");
        prg.extend_from_slice(&[0x00, 0x00]);
        prg
    }
}

/// Append one linked BASIC line; returns the address after it.
fn push_basic_line(prg: &mut Vec<u8>, addr: u16, line_number: u16, text: &str) -> u16 {
    // link (2) + line number (2) + text + terminator (1)
    let next = addr + 4 + text.len() as u16 + 1;
    prg.extend_from_slice(&next.to_le_bytes());
    prg.extend_from_slice(&line_number.to_le_bytes());
    for ch in text.chars() {
        prg.push(petscii::ascii_to_petscii(ch).unwrap_or(b' '));
    }
    prg.push(0x00);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_sizes() {
        assert!(D64Image::from_bytes(vec![0; 1000]).is_err());
        assert!(D64Image::from_bytes(vec![0; SIZE_35_TRACK + 1]).is_err());
        assert!(D64Image::from_bytes(vec![0; SIZE_35_TRACK]).is_ok());
        assert!(D64Image::from_bytes(vec![0; SIZE_40_TRACK]).is_ok());
    }

    #[test]
    fn zone_geometry() {
        let d64 = D64Image::from_bytes(vec![0; SIZE_35_TRACK]).unwrap();
        assert_eq!(d64.sectors_per_track(1), 21);
        assert_eq!(d64.sectors_per_track(17), 21);
        assert_eq!(d64.sectors_per_track(18), 19);
        assert_eq!(d64.sectors_per_track(24), 19);
        assert_eq!(d64.sectors_per_track(25), 18);
        assert_eq!(d64.sectors_per_track(30), 18);
        assert_eq!(d64.sectors_per_track(31), 17);
        assert_eq!(d64.sectors_per_track(35), 17);
        assert_eq!(d64.sectors_per_track(36), 0);
        assert_eq!(d64.sectors_per_track(0), 0);
    }

    #[test]
    fn forty_track_geometry() {
        let d64 = D64Image::from_bytes(vec![0; SIZE_40_TRACK]).unwrap();
        assert_eq!(d64.sectors_per_track(36), 17);
        assert_eq!(d64.sectors_per_track(40), 17);
        let last = d64.track_sector_offset(40, 16).unwrap();
        assert_eq!(last + SECTOR_SIZE, SIZE_40_TRACK);
    }

    #[test]
    fn forty_track_blocks_free() {
        // Mark every track fully free: tracks 1-35 in the standard BAM
        // entries, 36-40 in the extension area at $AC.
        let mut raw = vec![0; SIZE_40_TRACK];
        let bam = TRACK_OFFSETS[18];
        for track in 1..=40usize {
            if track == 18 {
                continue;
            }
            let offset = if track <= 35 {
                4 * track
            } else {
                0xAC + 4 * (track - 36)
            };
            raw[bam + offset] = SECTORS_PER_TRACK[track];
        }
        let d64 = D64Image::from_bytes(raw).unwrap();
        // 768 sectors across 40 tracks, minus the 19 on the directory track.
        assert_eq!(d64.blocks_free(), 768 - 19);
    }

    #[test]
    fn thirty_five_track_blocks_free() {
        let mut raw = vec![0; SIZE_35_TRACK];
        let bam = TRACK_OFFSETS[18];
        for track in 1..=35usize {
            if track == 18 {
                continue;
            }
            raw[bam + 4 * track] = SECTORS_PER_TRACK[track];
        }
        let d64 = D64Image::from_bytes(raw).unwrap();
        assert_eq!(d64.blocks_free(), 664);
    }

    #[test]
    fn offsets_cover_the_image_exactly() {
        let d64 = D64Image::from_bytes(vec![0; SIZE_35_TRACK]).unwrap();
        assert_eq!(d64.track_sector_offset(1, 0), Some(0));
        assert_eq!(d64.track_sector_offset(1, 1), Some(256));
        assert_eq!(d64.track_sector_offset(18, 0), Some(17 * 21 * 256));
        let last = d64.track_sector_offset(35, 16).unwrap();
        assert_eq!(last + SECTOR_SIZE, SIZE_35_TRACK);
        assert_eq!(d64.track_sector_offset(1, 21), None);
        assert_eq!(d64.track_sector_offset(36, 0), None);
    }

    #[test]
    fn out_of_range_sector_read_is_none() {
        let d64 = D64Image::from_bytes(vec![0; SIZE_35_TRACK]).unwrap();
        assert!(d64.read_sector(18, 0).is_some());
        assert!(d64.read_sector(18, 19).is_none());
        assert!(d64.read_sector(0, 0).is_none());
    }
}

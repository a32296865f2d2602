//! Test helpers: synthetic D64 images and a stub machine.

// Not every test binary uses every helper.
#![allow(dead_code)]

use c64emu::{C64, C64Config, VideoStandard};

/// 35-track image size.
pub const D64_SIZE: usize = 174_848;

/// One file to place on a synthetic disk.
pub struct TestFile<'a> {
    pub name: &'a str,
    /// Raw file bytes including the two-byte load address.
    pub data: &'a [u8],
}

/// Build a 35-track D64 with a BAM, a one-sector directory, and each
/// file chained across track 1.
///
/// Directory block counts reflect the real chain lengths, so listings
/// and chain-walk laws line up.
pub fn build_disk(name: &str, id: &str, files: &[TestFile<'_>]) -> Vec<u8> {
    let mut image = vec![0u8; D64_SIZE];

    let bam = sector_offset(18, 0);
    image[bam] = 18; // link to the directory chain
    image[bam + 1] = 1;
    image[bam + 2] = 0x41; // DOS version 'A'
    for i in 0..16 {
        image[bam + 0x90 + i] = name.as_bytes().get(i).copied().unwrap_or(0xA0);
    }
    image[bam + 0xA0] = 0xA0;
    image[bam + 0xA1] = 0xA0;
    image[bam + 0xA2] = id.as_bytes().first().copied().unwrap_or(0xA0);
    image[bam + 0xA3] = id.as_bytes().get(1).copied().unwrap_or(0xA0);
    image[bam + 0xA4] = 0xA0;
    image[bam + 0xA5] = b'2';
    image[bam + 0xA6] = b'A';
    // Plausible free counts: every track free except the directory track.
    for track in 1..=35usize {
        if track != 18 {
            image[bam + 4 * track] = sectors_on(track as u8);
        }
    }

    // Directory: single sector, terminated chain.
    let dir = sector_offset(18, 1);
    image[dir] = 0;
    image[dir + 1] = 0xFF;

    let mut next_free_sector = 0u8; // data sectors allocated on track 1
    for (slot, file) in files.iter().enumerate() {
        assert!(slot < 8, "one directory sector holds 8 entries");
        assert!(file.data.len() >= 2, "files carry a load address");

        let start_sector = next_free_sector;
        let blocks = write_chain(&mut image, 1, &mut next_free_sector, file.data);

        let entry = dir + 2 + slot * 32;
        image[entry] = 0x82; // closed PRG
        image[entry + 1] = 1;
        image[entry + 2] = start_sector;
        for i in 0..16 {
            image[entry + 3 + i] = file.name.as_bytes().get(i).copied().unwrap_or(0xA0);
        }
        image[entry + 28] = blocks as u8;
        image[entry + 29] = (blocks >> 8) as u8;
    }

    image
}

/// Write a file as a sector chain on one track; returns the block count.
fn write_chain(image: &mut [u8], track: u8, next_sector: &mut u8, data: &[u8]) -> u16 {
    let mut blocks = 0u16;
    let mut remaining = data;
    loop {
        let sector = *next_sector;
        *next_sector += 1;
        blocks += 1;
        let offset = sector_offset(track, sector);

        if remaining.len() <= 254 {
            image[offset] = 0;
            image[offset + 1] = remaining.len() as u8;
            image[offset + 2..offset + 2 + remaining.len()].copy_from_slice(remaining);
            return blocks;
        }

        image[offset] = track;
        image[offset + 1] = sector + 1;
        image[offset + 2..offset + 256].copy_from_slice(&remaining[..254]);
        remaining = &remaining[254..];
    }
}

pub fn sectors_on(track: u8) -> u8 {
    match track {
        1..=17 => 21,
        18..=24 => 19,
        25..=30 => 18,
        31..=40 => 17,
        _ => 0,
    }
}

pub fn sector_offset(track: u8, sector: u8) -> usize {
    let mut offset = 0usize;
    for t in 1..track {
        offset += sectors_on(t) as usize * 256;
    }
    offset + sector as usize * 256
}

/// A machine with stub ROMs: the KERNAL is a NOP sled with its reset
/// vector at $E000.
pub fn stub_machine() -> C64 {
    let mut kernal = vec![0xEA; 8192];
    kernal[0x1FFC] = 0x00;
    kernal[0x1FFD] = 0xE0;
    C64::new(C64Config {
        standard: VideoStandard::Pal,
        kernal_rom: kernal,
        basic_rom: vec![0; 8192],
        char_rom: None,
        drive_rom: None,
    })
}

//! D64 laws: chain lengths, directory walking, and the LIST-able
//! directory listing.

mod common;

use c64emu::{D64Image, FileType};
use common::{build_disk, TestFile, D64_SIZE};

#[test]
fn file_length_follows_the_chain_law() {
    // Lengths chosen to land on 1, 2 and 3 sectors with varied tails.
    let one = vec![0x11u8; 100];
    let two = vec![0x22u8; 254 + 7];
    let three = vec![0x33u8; 2 * 254 + 1];
    let files = [
        TestFile { name: "ONE", data: &one },
        TestFile { name: "TWO", data: &two },
        TestFile { name: "THREE", data: &three },
    ];
    let disk = D64Image::from_bytes(build_disk("LAWS", "LD", &files)).unwrap();

    for entry in disk.directory() {
        let data = disk.read_file_at(&entry).unwrap();
        let blocks = usize::from(entry.blocks);
        let final_used = data.len() - (blocks - 1) * 254;
        assert!(final_used <= 254, "{}", entry.name_string());
        assert_eq!(
            data.len(),
            (blocks - 1) * 254 + final_used,
            "{}",
            entry.name_string()
        );
    }

    // And the exact bytes round-trip.
    let entry = disk.find_entry("TWO").unwrap();
    assert_eq!(disk.read_file_at(&entry).unwrap(), two);
}

#[test]
fn directory_metadata() {
    let data = vec![0x42u8; 50];
    let files = [TestFile { name: "HELLO", data: &data }];
    let disk = D64Image::from_bytes(build_disk("TEST", "01", &files)).unwrap();

    assert_eq!(disk.disk_id(), [b'0', b'1']);
    let entries = disk.directory();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name_string(), "HELLO");
    assert_eq!(entries[0].file_type, FileType::Prg);
    assert!(entries[0].closed);
    assert!(disk.find_entry("hello").is_some()); // case-insensitive
    assert!(disk.find_entry("MISSING").is_none());
}

#[test]
fn directory_listing_is_a_linked_basic_program() {
    // A 3-block HELLO on a disk named TEST, id 01.
    let data = vec![0x60u8; 2 * 254 + 10];
    let files = [TestFile { name: "HELLO", data: &data }];
    let disk = D64Image::from_bytes(build_disk("TEST", "01", &files)).unwrap();

    let listing = disk.directory_listing();
    assert_eq!(&listing[..2], &[0x01, 0x08]);

    // Walk the line links and collect (line number, text).
    let mut lines = Vec::new();
    let mut offset = 2usize;
    loop {
        let link = u16::from_le_bytes([listing[offset], listing[offset + 1]]);
        if link == 0 {
            break;
        }
        let number = u16::from_le_bytes([listing[offset + 2], listing[offset + 3]]);
        let mut text = String::new();
        let mut i = offset + 4;
        while listing[i] != 0 {
            text.push(listing[i] as char);
            i += 1;
        }
        // The link points at the byte after the terminator, relative to
        // the $0801 load address.
        assert_eq!(usize::from(link) - 0x0801 + 2, i + 1);
        lines.push((number, text));
        offset = i + 1;
    }

    assert_eq!(lines[0].0, 0);
    assert_eq!(lines[0].1, "\"TEST            \" 01 2A");
    assert_eq!(lines[1].0, 3);
    assert_eq!(lines[1].1, "   \"HELLO\"            PRG");
    let (free_line, free_text) = lines.last().unwrap();
    assert_eq!(free_text, "BLOCKS FREE.");
    // 664 usable blocks, three taken by HELLO, but the free counts come
    // from the BAM, which the builder left saying "all free".
    assert_eq!(*free_line, 664);
}

#[test]
fn malformed_chain_is_rejected() {
    let data = vec![0x11u8; 600];
    let files = [TestFile { name: "LOOPY", data: &data }];
    let mut raw = build_disk("BAD", "XX", &files);

    // Point the first sector's link back at itself.
    let offset = common::sector_offset(1, 0);
    raw[offset] = 1;
    raw[offset + 1] = 0;
    let disk = D64Image::from_bytes(raw).unwrap();
    let entry = disk.find_entry("LOOPY").unwrap();
    assert!(disk.read_file_at(&entry).is_err());

    // A link off the disk is also an error.
    let data = vec![0x11u8; 600];
    let files = [TestFile { name: "OFF", data: &data }];
    let mut raw = build_disk("BAD", "XX", &files);
    let offset = common::sector_offset(1, 0);
    raw[offset] = 77;
    let disk = D64Image::from_bytes(raw).unwrap();
    let entry = disk.find_entry("OFF").unwrap();
    assert!(disk.read_file_at(&entry).is_err());
}

#[test]
fn size_validation() {
    assert!(D64Image::from_bytes(vec![0; D64_SIZE]).is_ok());
    assert!(D64Image::from_bytes(vec![0; 196_608]).is_ok());
    assert!(D64Image::from_bytes(vec![0; 175_531]).is_err()); // error-byte variant
    assert!(D64Image::from_bytes(vec![0; 12345]).is_err());
}

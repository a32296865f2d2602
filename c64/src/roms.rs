//! ROM image discovery and validation.
//!
//! ROM binaries are copyrighted and not shipped; the user points the
//! emulator at a directory holding them (a VICE install works). Search
//! order: an explicit `--rom-dir`, the `C64_ROM_DIR` environment
//! variable, a `roms/` directory next to the executable (walking up
//! through `target/…` to the workspace root), and finally `roms/` in the
//! working directory.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::C64Error;

/// One ROM we know how to find.
struct RomSpec {
    name: &'static str,
    /// Accepted filenames, most common first.
    filenames: &'static [&'static str],
    size: usize,
}

const BASIC: RomSpec = RomSpec {
    name: "BASIC",
    filenames: &["basic.rom", "basic", "basic.901226-01.bin"],
    size: 8192,
};

const KERNAL: RomSpec = RomSpec {
    name: "KERNAL",
    filenames: &["kernal.rom", "kernal", "kernal.901227-03.bin"],
    size: 8192,
};

const CHARGEN: RomSpec = RomSpec {
    name: "Character",
    filenames: &["chargen.rom", "chargen", "characters.901225-01.bin"],
    size: 4096,
};

const DRIVE_DOS: RomSpec = RomSpec {
    name: "1541 DOS",
    filenames: &["dos1541.rom", "dos1541", "d1541.rom", "325302-01.bin"],
    size: 16384,
};

/// The ROM images a machine is built from.
pub struct RomSet {
    pub basic: Vec<u8>,
    pub kernal: Vec<u8>,
    pub chargen: Option<Vec<u8>>,
    pub drive_dos: Option<Vec<u8>>,
}

impl RomSet {
    /// Locate and load the ROM set.
    ///
    /// BASIC and KERNAL are required. The character ROM is required only
    /// when a renderer will attach (`require_chargen`); the 1541 DOS ROM
    /// is always optional.
    ///
    /// # Errors
    ///
    /// Reports the full search path when a required image is missing, or
    /// the offending file when one has the wrong size.
    pub fn locate(explicit: Option<&Path>, require_chargen: bool) -> Result<Self, C64Error> {
        let dirs = search_dirs(explicit);
        info!(
            "ROM search path: {}",
            dirs.iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let basic = load_required(&BASIC, &dirs)?;
        let kernal = load_required(&KERNAL, &dirs)?;
        let chargen = if require_chargen {
            Some(load_required(&CHARGEN, &dirs)?)
        } else {
            load_optional(&CHARGEN, &dirs)?
        };
        let drive_dos = load_optional(&DRIVE_DOS, &dirs)?;
        if drive_dos.is_none() {
            info!("no 1541 DOS ROM found; drive CPU modelling disabled");
        }

        Ok(Self {
            basic,
            kernal,
            chargen,
            drive_dos,
        })
    }
}

/// Candidate ROM directories, in priority order.
fn search_dirs(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = explicit {
        dirs.push(dir.to_path_buf());
    }
    if let Ok(env_dir) = std::env::var("C64_ROM_DIR") {
        dirs.push(PathBuf::from(env_dir));
    }
    // roms/ beside the executable, walking up through target/debug.
    if let Ok(exe) = std::env::current_exe() {
        let mut dir = exe.parent().map(Path::to_path_buf);
        for _ in 0..5 {
            if let Some(ref d) = dir {
                let roms = d.join("roms");
                if roms.is_dir() {
                    dirs.push(roms);
                }
                dir = d.parent().map(Path::to_path_buf);
            }
        }
    }
    dirs.push(PathBuf::from("roms"));
    dirs
}

fn find_file(spec: &RomSpec, dirs: &[PathBuf]) -> Option<PathBuf> {
    for dir in dirs {
        for filename in spec.filenames {
            let path = dir.join(filename);
            if path.is_file() {
                return Some(path);
            }
        }
    }
    None
}

fn load_validated(spec: &RomSpec, path: &Path) -> Result<Vec<u8>, C64Error> {
    let data = std::fs::read(path)?;
    if data.len() != spec.size {
        return Err(C64Error::RomSize {
            name: spec.name,
            path: path.to_path_buf(),
            actual: data.len(),
            expected: spec.size,
        });
    }
    info!("{} ROM: {}", spec.name, path.display());
    Ok(data)
}

fn load_required(spec: &RomSpec, dirs: &[PathBuf]) -> Result<Vec<u8>, C64Error> {
    match find_file(spec, dirs) {
        Some(path) => load_validated(spec, &path),
        None => Err(C64Error::RomMissing {
            name: spec.name,
            searched: dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

fn load_optional(spec: &RomSpec, dirs: &[PathBuf]) -> Result<Option<Vec<u8>>, C64Error> {
    match find_file(spec, dirs) {
        Some(path) => load_validated(spec, &path).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rom_reports_search_path() {
        let dirs = vec![PathBuf::from("/nonexistent-a"), PathBuf::from("/nonexistent-b")];
        let err = load_required(&BASIC, &dirs).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("BASIC"));
        assert!(message.contains("/nonexistent-a"));
        assert!(message.contains("/nonexistent-b"));
    }

    #[test]
    fn size_mismatch_is_reported() {
        let dir = std::env::temp_dir().join("c64emu-rom-size-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("kernal.rom");
        std::fs::write(&path, [0u8; 100]).unwrap();
        let err = load_required(&KERNAL, &[dir.clone()]).unwrap_err();
        assert!(matches!(err, C64Error::RomSize { actual: 100, .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}

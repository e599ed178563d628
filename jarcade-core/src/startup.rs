use crate::config::{MachineConfig, MachineKind, RunConfig};
use crate::graphics::decode::{decode_gfx, GfxDecodeError, RawGraphicsRom, BLITTER_GFX_SIZE};
use crate::machine::{arabian, mario, mrdo, Arabian, ArcadeMachine, Mario, MrDo};
use std::{fs, io};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("error reading ROM file {file_path}: {source}")]
    FileRead {
        file_path: String,
        #[source]
        source: io::Error,
    },
    #[error("{region} ROM region should be {expected} bytes, was {actual} bytes")]
    RomSize {
        region: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("error decoding graphics ROM: {source}")]
    GfxDecode {
        #[from]
        source: GfxDecodeError,
    },
}

/// Program and graphics ROM images for one board, each the concatenation of its files.
#[derive(Debug, Clone, Default)]
pub struct RomSet {
    pub program: Vec<u8>,
    pub gfx: Vec<u8>,
}

impl RomSet {
    pub fn from_files(
        program_rom_paths: &[String],
        gfx_rom_paths: &[String],
    ) -> Result<Self, StartupError> {
        Ok(Self {
            program: read_concatenated(program_rom_paths)?,
            gfx: read_concatenated(gfx_rom_paths)?,
        })
    }
}

fn read_concatenated(file_paths: &[String]) -> Result<Vec<u8>, StartupError> {
    let mut bytes = Vec::new();
    for file_path in file_paths {
        let contents = match fs::read(file_path) {
            Ok(contents) => contents,
            Err(err) => {
                return Err(StartupError::FileRead {
                    file_path: file_path.clone(),
                    source: err,
                })
            }
        };

        log::debug!("read {} bytes from '{file_path}'", contents.len());
        bytes.extend(contents);
    }

    Ok(bytes)
}

fn check_size(region: &'static str, bytes: &[u8], expected: usize) -> Result<(), StartupError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(StartupError::RomSize {
            region,
            expected,
            actual: bytes.len(),
        })
    }
}

/// Build a machine from ROM images that have already been read into memory.
pub fn build_machine(config: MachineConfig, roms: RomSet) -> Result<ArcadeMachine, StartupError> {
    let machine: ArcadeMachine = match config.kind {
        MachineKind::Arabian => {
            check_size("program", &roms.program, arabian::PROGRAM_ROM_SIZE)?;
            check_size("graphics", &roms.gfx, BLITTER_GFX_SIZE)?;

            Arabian::new(config, &roms.program, RawGraphicsRom::new(roms.gfx)?).into()
        }
        MachineKind::Mario => {
            check_size("program", &roms.program, mario::PROGRAM_ROM_SIZE)?;
            check_size(
                "graphics",
                &roms.gfx,
                mario::CHAR_ROM_SIZE + mario::SPRITE_ROM_SIZE,
            )?;

            let (char_rom, sprite_rom) = roms.gfx.split_at(mario::CHAR_ROM_SIZE);
            let char_gfx = decode_gfx(&mario::CHAR_LAYOUT, char_rom)?;
            let sprite_gfx = decode_gfx(&mario::SPRITE_LAYOUT, sprite_rom)?;

            Mario::new(config, &roms.program, char_gfx, sprite_gfx).into()
        }
        MachineKind::MrDo => {
            check_size("program", &roms.program, mrdo::PROGRAM_ROM_SIZE)?;
            check_size(
                "graphics",
                &roms.gfx,
                2 * mrdo::CHAR_ROM_SIZE + mrdo::SPRITE_ROM_SIZE,
            )?;

            let (fg_rom, rest) = roms.gfx.split_at(mrdo::CHAR_ROM_SIZE);
            let (bg_rom, sprite_rom) = rest.split_at(mrdo::CHAR_ROM_SIZE);
            let fg_gfx = decode_gfx(&mrdo::CHAR_LAYOUT, fg_rom)?;
            let bg_gfx = decode_gfx(&mrdo::CHAR_LAYOUT, bg_rom)?;
            let sprite_gfx = decode_gfx(&mrdo::SPRITE_LAYOUT, sprite_rom)?;

            MrDo::new(config, &roms.program, fg_gfx, bg_gfx, sprite_gfx).into()
        }
    };

    log::info!("Initialized machine ({config})");

    Ok(machine)
}

pub fn init_machine(run_config: &RunConfig) -> Result<ArcadeMachine, StartupError> {
    let roms = RomSet::from_files(&run_config.program_rom_paths, &run_config.gfx_rom_paths)?;
    build_machine(run_config.machine_config(), roms)
}

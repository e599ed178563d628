use crate::graphics::Orientation;
use jarcade_proc_macros::{EnumDisplay, EnumFromStr, StrDeserialize, StrSerialize};
use std::fmt::Formatter;

/// The boards this crate knows how to wire up.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumDisplay,
    EnumFromStr,
    StrSerialize,
    StrDeserialize,
)]
pub enum MachineKind {
    Arabian,
    Mario,
    MrDo,
}

impl MachineKind {
    /// Monitor orientation of the original cabinet.
    pub fn native_rotation(self) -> Rotation {
        match self {
            Self::Arabian | Self::MrDo => Rotation::Rot270,
            Self::Mario => Rotation::Rot180,
        }
    }
}

/// Screen rotation, expressed the way cabinet monitors are mounted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    EnumDisplay,
    EnumFromStr,
    StrSerialize,
    StrDeserialize,
)]
pub enum Rotation {
    #[default]
    Rot0,
    Rot90,
    Rot180,
    Rot270,
}

impl Rotation {
    pub fn orientation(self) -> Orientation {
        match self {
            Self::Rot0 => Orientation::IDENTITY,
            Self::Rot90 => Orientation {
                swap_xy: true,
                flip_x: true,
                flip_y: false,
            },
            Self::Rot180 => Orientation {
                swap_xy: false,
                flip_x: true,
                flip_y: true,
            },
            Self::Rot270 => Orientation {
                swap_xy: true,
                flip_x: false,
                flip_y: true,
            },
        }
    }
}

/// Per-machine construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    pub kind: MachineKind,
    pub rotation: Rotation,
}

impl MachineConfig {
    pub fn new(kind: MachineKind) -> Self {
        Self {
            kind,
            rotation: kind.native_rotation(),
        }
    }
}

impl std::fmt::Display for MachineConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "kind={}, rotation={}", self.kind, self.rotation)
    }
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub machine: MachineKind,
    pub program_rom_paths: Vec<String>,
    pub gfx_rom_paths: Vec<String>,
    pub rotation: Option<Rotation>,
    pub trace_path: Option<String>,
    pub frame_output_path: Option<String>,
    pub load_state_path: Option<String>,
    pub save_state_path: Option<String>,
}

impl RunConfig {
    pub fn machine_config(&self) -> MachineConfig {
        let mut config = MachineConfig::new(self.machine);
        if let Some(rotation) = self.rotation {
            config.rotation = rotation;
        }
        config
    }
}

impl std::fmt::Display for RunConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "machine: {}", self.machine)?;
        writeln!(f, "program_rom_paths: {:?}", self.program_rom_paths)?;
        writeln!(f, "gfx_rom_paths: {:?}", self.gfx_rom_paths)?;
        writeln!(f, "rotation: {}", fmt_option(self.rotation.as_ref()))?;
        writeln!(f, "trace_path: {}", fmt_option(self.trace_path.as_ref()))?;
        writeln!(
            f,
            "frame_output_path: {}",
            fmt_option(self.frame_output_path.as_ref())
        )?;
        writeln!(
            f,
            "load_state_path: {}",
            fmt_option(self.load_state_path.as_ref())
        )?;
        writeln!(
            f,
            "save_state_path: {}",
            fmt_option(self.save_state_path.as_ref())
        )?;

        Ok(())
    }
}

fn fmt_option<T: std::fmt::Display>(option: Option<&T>) -> String {
    match option {
        Some(value) => format!("{value}"),
        None => "<None>".into(),
    }
}

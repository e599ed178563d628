use anyhow::Context;
use jarcade_core::{MachineKind, Rotation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Run settings read from a TOML file. Every field can be overridden from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFile {
    pub machine: Option<MachineKind>,

    #[serde(default)]
    pub program_roms: Vec<String>,

    #[serde(default)]
    pub gfx_roms: Vec<String>,

    pub rotation: Option<Rotation>,
    pub trace: Option<String>,
    pub frame_output: Option<String>,
    pub load_state: Option<String>,
    pub save_state: Option<String>,
}

impl RunFile {
    pub fn from_toml_file<P>(path: P) -> Result<Self, anyhow::Error>
    where
        P: AsRef<Path> + std::fmt::Debug,
    {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("error reading TOML run file from '{path:?}'"))?;
        let run_file: Self = toml::from_str(&config_str)
            .with_context(|| format!("error parsing run config from TOML file at '{path:?}'"))?;

        Ok(run_file)
    }
}

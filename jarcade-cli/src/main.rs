mod run_file;

use crate::run_file::RunFile;
use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use jarcade_core::{MachineKind, Rotation, RunConfig};

#[derive(Parser, Debug)]
#[command(about = "Headless bus-trace runner for Arabian, Mario Bros. and Mr. Do! boards")]
struct Cli {
    /// TOML file with run settings; flags override its values
    #[arg(short = 'c', long = "config")]
    config_path: Option<String>,

    /// Arabian, Mario or MrDo
    #[arg(short = 'm', long)]
    machine: Option<MachineKind>,

    /// Program ROM files, concatenated in order
    #[arg(short = 'p', long = "program-rom")]
    program_roms: Vec<String>,

    /// Graphics ROM files, concatenated in order
    #[arg(short = 'g', long = "gfx-rom")]
    gfx_roms: Vec<String>,

    /// Override the cabinet's native rotation (Rot0, Rot90, Rot180, Rot270)
    #[arg(short = 'r', long)]
    rotation: Option<Rotation>,

    /// Bus trace to replay
    #[arg(short = 't', long)]
    trace: Option<String>,

    /// Write the final frame to this PNG file
    #[arg(short = 'o', long)]
    frame_output: Option<String>,

    #[arg(long)]
    load_state: Option<String>,

    #[arg(long)]
    save_state: Option<String>,
}

impl Cli {
    fn into_run_config(self, run_file: RunFile) -> anyhow::Result<RunConfig> {
        let machine = self
            .machine
            .or(run_file.machine)
            .context("no machine given on the command line or in the run file")?;

        let prefer_args = |args: Vec<String>, file: Vec<String>| {
            if args.is_empty() {
                file
            } else {
                args
            }
        };

        Ok(RunConfig {
            machine,
            program_rom_paths: prefer_args(self.program_roms, run_file.program_roms),
            gfx_rom_paths: prefer_args(self.gfx_roms, run_file.gfx_roms),
            rotation: self.rotation.or(run_file.rotation),
            trace_path: self.trace.or(run_file.trace),
            frame_output_path: self.frame_output.or(run_file.frame_output),
            load_state_path: self.load_state.or(run_file.load_state),
            save_state_path: self.save_state.or(run_file.save_state),
        })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Cli::parse();

    let run_file = match &args.config_path {
        Some(config_path) => RunFile::from_toml_file(config_path)?,
        None => RunFile::default(),
    };
    let run_config = args.into_run_config(run_file)?;

    jarcade_core::run(run_config).context("run failed")
}

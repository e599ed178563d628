pub mod capture;
pub mod config;
pub mod graphics;
pub mod machine;
pub mod memory;
pub mod replay;
pub mod serialize;
pub mod startup;

use crate::capture::CaptureError;
use crate::machine::Machine;
use crate::replay::TraceError;
use crate::serialize::SaveStateError;
use crate::startup::StartupError;
use thiserror::Error;

pub use config::{MachineConfig, MachineKind, Rotation, RunConfig};
pub use machine::{ArcadeMachine, BusEvent, Interrupt};
pub use memory::MemoryBus;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("error initializing machine: {source}")]
    Startup {
        #[from]
        source: StartupError,
    },
    #[error("error replaying bus trace: {source}")]
    Trace {
        #[from]
        source: TraceError,
    },
    #[error("save state error: {source}")]
    SaveState {
        #[from]
        source: SaveStateError,
    },
    #[error("error capturing frame: {source}")]
    Capture {
        #[from]
        source: CaptureError,
    },
}

/// Build the configured machine, optionally restore a save state, replay a bus trace against it,
/// then write out the final frame and state as requested.
pub fn run(run_config: RunConfig) -> Result<(), RunError> {
    log::info!("Running with config:\n{run_config}");

    let mut machine = startup::init_machine(&run_config)?;

    if let Some(load_state_path) = &run_config.load_state_path {
        machine = serialize::load_state(load_state_path, machine).map_err(|(err, _)| err)?;
    }

    if let Some(trace_path) = &run_config.trace_path {
        let trace = replay::read_trace_file(trace_path)?;
        let summary = replay::replay(&mut machine, &trace)?;
        for event in &summary.events {
            log::debug!("bus event: {event:?}");
        }
    }

    machine.render_frame();

    if let Some(frame_output_path) = &run_config.frame_output_path {
        capture::save_frame_png(machine.frame(), frame_output_path)?;
    }

    if let Some(save_state_path) = &run_config.save_state_path {
        serialize::save_state(&machine, save_state_path)?;
    }

    Ok(())
}

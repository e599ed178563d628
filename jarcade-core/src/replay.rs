//! Headless bus-trace replay.
//!
//! A trace is a text file with one bus operation per line. Operands are hexadecimal, with or
//! without a `0x` prefix, and `#` starts a comment:
//!
//! ```text
//! # blitter plane mask
//! w E000 01
//! r D000 00     # asserts the read value
//! o C800 0F     # I/O write
//! p C800        # I/O read
//! i 2 FE        # set input port 2
//! v             # vertical blank + frame render
//! ```

use crate::machine::{BusEvent, Interrupt, Machine};
use std::path::Path;
use std::{fs, io};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("error reading trace file {file_path}: {source}")]
    FileRead {
        file_path: String,
        #[source]
        source: io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("line {line}: read from {address:04X} returned {actual:02X}, expected {expected:02X}")]
    ReadMismatch {
        line: usize,
        address: u16,
        expected: u8,
        actual: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCommand {
    Write { address: u16, value: u8 },
    Read { address: u16, expected: Option<u8> },
    WriteIo { port: u16, value: u8 },
    ReadIo { port: u16, expected: Option<u8> },
    SetInput { index: usize, value: u8 },
    VBlank,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceLine {
    /// 1-based line number in the source text.
    pub line: usize,
    pub command: TraceCommand,
}

/// What a replay produced besides the machine state itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub commands: usize,
    pub frames: usize,
    pub interrupts: Vec<Interrupt>,
    pub events: Vec<BusEvent>,
}

fn parse_hex<T>(line: usize, token: Option<&str>, what: &str) -> Result<T, TraceError>
where
    T: TryFrom<u32>,
{
    let Some(token) = token else {
        return Err(TraceError::Parse {
            line,
            message: format!("missing {what}"),
        });
    };

    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| TraceError::Parse {
            line,
            message: format!("invalid {what} '{token}'"),
        })
}

fn parse_optional_hex<T>(
    line: usize,
    token: Option<&str>,
    what: &str,
) -> Result<Option<T>, TraceError>
where
    T: TryFrom<u32>,
{
    token
        .map(|token| parse_hex(line, Some(token), what))
        .transpose()
}

fn parse_line(line: usize, text: &str) -> Result<Option<TraceCommand>, TraceError> {
    let text = text.split('#').next().unwrap_or("");
    let mut tokens = text.split_whitespace();
    let Some(op) = tokens.next() else {
        return Ok(None);
    };

    let command = match op {
        "w" => TraceCommand::Write {
            address: parse_hex(line, tokens.next(), "address")?,
            value: parse_hex(line, tokens.next(), "value")?,
        },
        "r" => TraceCommand::Read {
            address: parse_hex(line, tokens.next(), "address")?,
            expected: parse_optional_hex(line, tokens.next(), "expected value")?,
        },
        "o" => TraceCommand::WriteIo {
            port: parse_hex(line, tokens.next(), "port")?,
            value: parse_hex(line, tokens.next(), "value")?,
        },
        "p" => TraceCommand::ReadIo {
            port: parse_hex(line, tokens.next(), "port")?,
            expected: parse_optional_hex(line, tokens.next(), "expected value")?,
        },
        "i" => TraceCommand::SetInput {
            index: parse_hex(line, tokens.next(), "input port index")?,
            value: parse_hex(line, tokens.next(), "value")?,
        },
        "v" => TraceCommand::VBlank,
        _ => {
            return Err(TraceError::Parse {
                line,
                message: format!("unknown command '{op}'"),
            })
        }
    };

    if let Some(extra) = tokens.next() {
        return Err(TraceError::Parse {
            line,
            message: format!("unexpected operand '{extra}'"),
        });
    }

    Ok(Some(command))
}

pub fn parse_trace(text: &str) -> Result<Vec<TraceLine>, TraceError> {
    text.lines()
        .enumerate()
        .filter_map(|(i, text)| {
            let line = i + 1;
            parse_line(line, text)
                .map(|command| command.map(|command| TraceLine { line, command }))
                .transpose()
        })
        .collect()
}

pub fn read_trace_file<P>(path: P) -> Result<Vec<TraceLine>, TraceError>
where
    P: AsRef<Path>,
{
    let text = fs::read_to_string(path.as_ref()).map_err(|source| TraceError::FileRead {
        file_path: path.as_ref().display().to_string(),
        source,
    })?;
    parse_trace(&text)
}

fn check_read(
    line: usize,
    address: u16,
    expected: Option<u8>,
    actual: u8,
) -> Result<(), TraceError> {
    match expected {
        Some(expected) if expected != actual => Err(TraceError::ReadMismatch {
            line,
            address,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Drive `machine` through `trace`, stopping at the first failed read assertion.
pub fn replay<M>(machine: &mut M, trace: &[TraceLine]) -> Result<ReplaySummary, TraceError>
where
    M: Machine + ?Sized,
{
    let mut summary = ReplaySummary::default();

    for &TraceLine { line, command } in trace {
        log::trace!("line {line}: {command:?}");

        match command {
            TraceCommand::Write { address, value } => machine.write(address, value),
            TraceCommand::Read { address, expected } => {
                check_read(line, address, expected, machine.read(address))?;
            }
            TraceCommand::WriteIo { port, value } => machine.write_io(port, value),
            TraceCommand::ReadIo { port, expected } => {
                check_read(line, port, expected, machine.read_io(port))?;
            }
            TraceCommand::SetInput { index, value } => machine.set_input_port(index, value),
            TraceCommand::VBlank => {
                summary.interrupts.extend(machine.vblank());
                machine.render_frame();
                summary.frames += 1;
            }
        }

        summary.commands += 1;
        summary.events.extend(machine.take_events());
    }

    log::info!(
        "Replayed {} bus commands over {} frames",
        summary.commands,
        summary.frames
    );

    Ok(summary)
}

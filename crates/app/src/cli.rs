use std::path::PathBuf;

use bytesize::ByteSize;
use clap::{Args, Parser};

/// Unit counts of the simulated GPU.
#[derive(Args, Debug)]
pub struct TopologyConfig {
    /// Number of vertex shaders
    #[arg(long, default_value_t = 4)]
    pub vertex_shaders: usize,
    /// Number of fragment shaders
    #[arg(long, default_value_t = 4)]
    pub fragment_shaders: usize,
    /// Number of texture units
    #[arg(long, default_value_t = 4)]
    pub texture_units: usize,
    /// Number of stamp pipelines (z-stencil and color write unit pairs)
    #[arg(long, default_value_t = 4)]
    pub stamp_units: usize,
}

/// A debug command to execute at a given cycle.
#[derive(Debug, Clone)]
pub struct DebugCommand {
    pub cycle: u64,
    pub line: String,
}

fn parse_debug_command(value: &str) -> Result<DebugCommand, String> {
    let (cycle, line) = value
        .split_once(':')
        .ok_or_else(|| format!("expected <cycle>:<command>, got {value:?}"))?;

    let cycle = cycle
        .trim()
        .parse()
        .map_err(|e| format!("invalid cycle {cycle:?}: {e}"))?;

    Ok(DebugCommand {
        cycle,
        line: line.trim().to_owned(),
    })
}

/// Jasper: cycle accurate GPU command processor simulator
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Path to the transaction trace, in RON
    pub trace: PathBuf,
    #[command(flatten)]
    pub topology: TopologyConfig,
    /// Size of GPU memory
    #[arg(long, default_value = "64MiB")]
    pub memory_size: ByteSize,
    /// Bytes transferred per memory bus cycle
    #[arg(long, default_value_t = 16)]
    pub bus_width: u32,
    /// Cycles every unit spends on a unit of work
    #[arg(long, default_value_t = 4)]
    pub latency: u32,
    /// Cycles the stamp units spend on a draw, defaults to the latency
    #[arg(long)]
    pub fragment_latency: Option<u32>,
    /// Whether to overlap the geometry phase of a batch with the fragment phase of the previous one
    #[arg(long, default_value_t = false)]
    pub pipelined: bool,
    /// Whether to dump every loaded shader program
    #[arg(long, default_value_t = false)]
    pub dump_shaders: bool,
    /// Whether to record fetched transactions for validation
    #[arg(long, default_value_t = false)]
    pub validation: bool,
    /// Directory for snapshots and dumps
    #[arg(long, default_value = ".")]
    pub snapshot_dir: PathBuf,
    /// Maximum number of cycles to simulate
    #[arg(long)]
    pub max_cycles: Option<u64>,
    /// Debug command to execute at a cycle, as `<cycle>:<command>`
    ///
    /// Can be given multiple times. Use `help` as the command to list the available ones.
    #[arg(short('c'), long("debug-command"), value_parser = parse_debug_command)]
    pub debug_commands: Vec<DebugCommand>,
}

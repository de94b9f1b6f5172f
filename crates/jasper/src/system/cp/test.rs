use strum::VariantArray;

use crate::Jasper;
use crate::modules::trace::{NopTraceModule, QueueTraceModule};
use crate::modules::units::{IdealConfig, IdealUnitsModule, NopUnitsModule, UnitsModule};
use crate::stats::Counter;
use crate::system::cp::debug::{self, CommandError};
use crate::system::cp::memory::{MAX_MEMORY_TICKETS, Tickets};
use crate::system::cp::transaction::{Command, Kind, Transaction};
use crate::system::cp::updates::{MAX_REGISTER_UPDATES, Update, UpdateBuffer};
use crate::system::cp::{PendingLoad, Status, write};
use crate::system::regs::{CompareMode, Reg, RegData};
use crate::system::units::{Links, MemoryTransaction, RasterCommand, ShaderCommand};
use crate::system::{Config, Modules};

fn jasper(transactions: Vec<Transaction>, latency: u32, config: Config) -> Jasper {
    let modules = Modules {
        trace: Box::new(QueueTraceModule::new(transactions)),
        units: Box::new(IdealUnitsModule::new(IdealConfig {
            latency,
            ..Default::default()
        })),
    };

    Jasper::new(modules, config)
}

fn pipelined() -> Config {
    Config {
        pipelined_batches: true,
        ..Default::default()
    }
}

/// Pipelined batches with a fragment phase long enough for the next batch's geometry to finish
/// first.
fn overlapped(transactions: Vec<Transaction>) -> Jasper {
    let modules = Modules {
        trace: Box::new(QueueTraceModule::new(transactions)),
        units: Box::new(IdealUnitsModule::new(IdealConfig {
            latency: 1,
            fragment_latency: Some(6),
            ..Default::default()
        })),
    };

    Jasper::new(modules, pipelined())
}

/// Clocks until the end of the trace, returning the state after every cycle.
fn run(jasper: &mut Jasper) -> Vec<Status> {
    let mut states = Vec::new();
    while !jasper.sys.is_end_of_trace() {
        jasper.clock();
        states.push(jasper.sys.regs.status);
        assert!(jasper.sys.cycle < 100_000, "trace did not finish");
    }

    states
}

fn reg_write(reg: Reg, data: RegData) -> Transaction {
    Transaction::reg_write(reg, 0, data)
}

/// Fragment draws sent to the rasterizer during the last cycle.
fn fragment_draws(jasper: &Jasper) -> usize {
    jasper
        .sys
        .links
        .rasterizer
        .command
        .pending()
        .filter(|message| message.command == RasterCommand::Draw)
        .count()
}

/// Fragment program loads sent during the last cycle.
fn fragment_loads(jasper: &Jasper) -> Vec<Vec<u8>> {
    jasper.sys.links.fragment_shaders[0]
        .pending()
        .filter_map(|message| match &message.command {
            ShaderCommand::LoadProgram { code, .. } => Some(code.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn draw_then_swap() {
    let trace = vec![
        reg_write(Reg::ViewportWidth, RegData::Uint(640)),
        Transaction::command(Command::Draw),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = jasper(trace, 1, Config::default());
    let states = run(&mut jasper);

    insta::assert_debug_snapshot!(states, @r"
    [
        Ready,
        Ready,
        Drawing,
        Drawing,
        EndGeometry,
        EndFragment,
        Ready,
        Swap,
        Swap,
        Swap,
        Swap,
        Ready,
        Ready,
    ]
    ");

    let stats = &jasper.sys.stats;
    assert_eq!(stats.get(Counter::Batches), 1);
    assert_eq!(stats.get(Counter::Frames), 1);
    assert_eq!(stats.get(Counter::DrawCycles), 2);
    assert_eq!(stats.get(Counter::SwapCycles), 4);
    assert_eq!(stats.get(Counter::RegWrites), 1);
    assert_eq!(jasper.sys.regs.raster.viewport.width, 640);
    assert_eq!(jasper.sys.cp.frame, 1);
    assert_eq!(jasper.sys.cp.batch, 0);
}

#[test]
fn memory_write_is_chunked() {
    let data = (0..320u32).map(|i| i as u8).collect::<Vec<_>>();
    let trace = vec![Transaction::write(0x1000, data)];

    let mut jasper = jasper(trace, 1, Config::default());
    let mut chunks = Vec::new();
    while !jasper.sys.is_end_of_trace() {
        jasper.clock();
        for message in jasper.sys.links.memory.request.pending() {
            if let MemoryTransaction::WriteData { address, data, .. } = &message.command {
                chunks.push((*address, data.len()));
            }
        }

        assert!(jasper.sys.cycle < 1000);
    }

    assert_eq!(chunks, [(0x1000, 128), (0x1080, 128), (0x1100, 64)]);
    assert_eq!(jasper.sys.stats.get(Counter::WriteTrans), 3);
    assert_eq!(jasper.sys.stats.get(Counter::BytesWritten), 320);

    // the last chunk is still on the bus
    for _ in 0..8 {
        jasper.clock();
    }

    assert!(jasper.sys.cp.memory.bus_free());
    assert_eq!(jasper.sys.cp.memory.tickets.free(), MAX_MEMORY_TICKETS);
}

#[test]
fn vertex_program_load() {
    let code = (0..320u32).map(|i| (i * 7) as u8).collect::<Vec<_>>();
    let trace = vec![
        Transaction::preload(0x2000, code.clone()),
        reg_write(Reg::VertexProgram, RegData::Uint(0x2000)),
        reg_write(Reg::VertexProgramSize, RegData::Uint(320)),
        Transaction::command(Command::LoadVertexProgram),
    ];

    let mut jasper = jasper(trace, 1, Config::default());
    let mut requests = Vec::new();
    let mut loaded = None;
    while !jasper.sys.is_end_of_trace() {
        jasper.clock();

        for message in jasper.sys.links.memory.request.pending() {
            if let MemoryTransaction::ReadRequest { size, .. } = message.command {
                requests.push(size);
            }
        }

        for message in jasper.sys.links.vertex_shaders[0].pending() {
            if let ShaderCommand::LoadProgram { pc, code } = &message.command {
                loaded = Some((*pc, code.clone()));
            }
        }

        assert!(jasper.sys.cycle < 1000);
    }

    assert_eq!(requests, [128, 128, 64]);
    assert_eq!(loaded, Some((0, code)));
    assert!(jasper.sys.links.fragment_shaders[0].is_empty());

    let sys = &jasper.sys;
    assert_eq!(sys.cp.vertex_programs, 1);
    assert_eq!(sys.stats.get(Counter::BytesRead), 320);
    assert_eq!(sys.cp.memory.tickets.free(), MAX_MEMORY_TICKETS);
    assert!(sys.cp.memory.read.is_none());
}

#[test]
#[should_panic(expected = "no memory tickets available")]
fn program_load_without_tickets() {
    let trace = vec![
        reg_write(Reg::VertexProgramSize, RegData::Uint(64)),
        Transaction::command(Command::LoadVertexProgram),
    ];

    let mut jasper = jasper(trace, 1, Config::default());
    jasper.clock();
    jasper.clock();

    for _ in 0..MAX_MEMORY_TICKETS {
        jasper.sys.cp.memory.tickets.issue();
    }

    jasper.clock();
}

#[test]
fn deferred_draw_is_retried_untouched() {
    let trace = vec![
        Transaction::command(Command::Draw),
        Transaction::command(Command::Draw),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = jasper(trace, 1, pipelined());
    jasper.clock();
    jasper.clock();
    jasper.clock();

    // second draw was fetched while the first one is drawing
    let deferred = jasper.sys.cp.current.clone().expect("deferred draw");
    assert_eq!(deferred.kind, Kind::Command(Command::Draw));
    assert!(!jasper.sys.cp.process_new);

    while jasper.sys.regs.status != Status::Ready {
        jasper.clock();
        assert_eq!(jasper.sys.cp.current.as_ref(), Some(&deferred));
        assert_eq!(jasper.sys.stats.get(Counter::Batches), 1);
    }

    run(&mut jasper);
    assert_eq!(jasper.sys.stats.get(Counter::Batches), 2);
    assert_eq!(jasper.sys.stats.get(Counter::Frames), 1);
}

#[test]
fn draw_overlaps_end_of_fragment() {
    let trace = vec![
        Transaction::command(Command::Draw),
        Transaction::command(Command::Draw),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = overlapped(trace);
    let mut states = Vec::new();
    let (mut overlap, mut batches, mut draws) = (false, 0, 0);
    while !jasper.sys.is_end_of_trace() {
        jasper.clock();

        let sys = &jasper.sys;
        overlap |= sys.regs.status == Status::EndGeometry && sys.cp.geometry_started;
        batches += sys.cp.end_of_batch() as u32;
        draws += fragment_draws(&jasper);
        states.push(sys.regs.status);
        assert!(sys.cycle < 1000);
    }

    states.dedup();

    use Status::*;
    assert_eq!(
        states,
        [
            Ready,
            Drawing,
            EndGeometry,
            EndFragment,
            Drawing,
            EndGeometry,
            EndFragment,
            Ready,
            Swap,
            Ready
        ]
    );

    assert!(overlap);
    assert_eq!(batches, 2);
    assert_eq!(draws, 2);
    assert_eq!(jasper.sys.stats.get(Counter::Batches), 2);
    assert_eq!(jasper.sys.stats.get(Counter::Frames), 1);
}

#[test]
fn fragment_write_waits_for_overlapped_batch() {
    let trace = vec![
        Transaction::command(Command::Draw),
        Transaction::command(Command::Draw),
        reg_write(Reg::DepthFunction, RegData::Compare(CompareMode::Greater)),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = overlapped(trace);
    let (mut deferred, mut draws) = (false, 0);
    while !jasper.sys.is_end_of_trace() {
        jasper.clock();
        draws += fragment_draws(&jasper);

        let sys = &jasper.sys;
        if sys.cp.geometry_started {
            deferred |= sys
                .cp
                .current
                .as_ref()
                .is_some_and(|t| matches!(t.kind, Kind::RegWrite { .. }));
            assert!(sys.cp.updates.fragment.is_empty());
        }

        // the second batch rasterizes with the state it was issued with
        if draws < 2 {
            assert_eq!(sys.regs.zstencil.depth_function, CompareMode::Less);
        }

        assert!(sys.cycle < 1000);
    }

    assert!(deferred);
    assert_eq!(draws, 2);
    assert_eq!(jasper.sys.regs.zstencil.depth_function, CompareMode::Greater);
    assert_eq!(jasper.sys.stats.get(Counter::RegWrites), 1);
}

#[test]
fn fragment_program_load_waits_for_overlapped_batch() {
    let trace = vec![
        Transaction::command(Command::Draw),
        Transaction::command(Command::Draw),
        Transaction::command(Command::LoadFragmentProgram),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = overlapped(trace);
    let (mut draws, mut loaded_after) = (0, None);
    while !jasper.sys.is_end_of_trace() {
        jasper.clock();
        draws += fragment_draws(&jasper);
        if !fragment_loads(&jasper).is_empty() {
            loaded_after = Some(draws);
        }

        let sys = &jasper.sys;
        if sys.cp.geometry_started {
            assert!(matches!(sys.cp.pending_load, PendingLoad::None));
        }

        assert!(sys.cycle < 1000);
    }

    assert_eq!(loaded_after, Some(2));
    assert_eq!(jasper.sys.cp.fragment_programs, 1);
    assert_eq!(jasper.sys.stats.get(Counter::Frames), 1);
}

#[test]
fn stored_fragment_program_load() {
    let code = (0..32u8).collect::<Vec<_>>();
    let trace = vec![
        Transaction::preload(0x3000, code.clone()),
        reg_write(Reg::FragmentProgram, RegData::Uint(0x3000)),
        reg_write(Reg::FragmentProgramSize, RegData::Uint(32)),
        Transaction::command(Command::Draw),
        Transaction::command(Command::LoadFragmentProgram),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = overlapped(trace);
    while !matches!(jasper.sys.cp.pending_load, PendingLoad::Stored(_)) {
        jasper.clock();
        assert!(jasper.sys.cycle < 100);
    }

    assert_eq!(jasper.sys.regs.status, Status::Drawing);

    while jasper.sys.regs.status != Status::MemoryRead {
        jasper.clock();
        assert!(fragment_loads(&jasper).is_empty());
        assert!(jasper.sys.cycle < 100);
    }

    // the swap fetched while the batch was finishing is put aside
    let sys = &jasper.sys;
    let PendingLoad::Loading {
        current,
        process_new,
    } = &sys.cp.pending_load
    else {
        panic!("fragment program load not started");
    };

    let swap = current.clone().expect("deferred swap");
    assert_eq!(swap.kind, Kind::Command(Command::SwapBuffers));
    assert!(!process_new);
    assert!(sys.cp.current.is_none());
    assert_eq!(sys.cp.stack, Status::EndFragment);

    let loaded = loop {
        jasper.clock();
        if let Some(code) = fragment_loads(&jasper).pop() {
            break code;
        }

        assert!(jasper.sys.cycle < 100);
    };

    assert_eq!(loaded, code);
    assert_eq!(jasper.sys.regs.status, Status::EndFragment);

    jasper.clock();
    let sys = &jasper.sys;
    assert_eq!(sys.regs.status, Status::EndFragment);
    assert!(matches!(sys.cp.pending_load, PendingLoad::None));
    assert_eq!(sys.cp.current.as_ref(), Some(&swap));
    assert!(!sys.cp.process_new);

    run(&mut jasper);
    assert_eq!(jasper.sys.cp.fragment_programs, 1);
    assert_eq!(jasper.sys.cp.vertex_programs, 0);
    assert_eq!(jasper.sys.stats.get(Counter::Frames), 1);
}

#[test]
fn skipped_draws_keep_cooldown() {
    let trace = vec![
        Transaction::command(Command::Draw),
        Transaction::command(Command::Draw),
    ];

    let mut jasper = jasper(trace, 1, Config::default());
    jasper.command("skip-draw on").unwrap();
    for _ in 0..3 {
        jasper.clock();
    }

    let sys = &jasper.sys;
    assert_eq!(sys.stats.get(Counter::Batches), 1);
    assert_eq!(
        sys.cp.current.as_ref().map(|t| &t.kind),
        Some(&Kind::Command(Command::Draw))
    );

    jasper.clock();
    assert_eq!(jasper.sys.stats.get(Counter::Batches), 2);
    assert!(jasper.sys.cp.end_of_batch());
    assert!(!run(&mut jasper).contains(&Status::Drawing));
}

#[test]
fn fragment_writes_wait_for_end_of_fragment() {
    let clear = [0.25, 0.5, 0.75, 1.0];
    let trace = vec![
        Transaction::command(Command::Draw),
        reg_write(Reg::ColorBufferClear, RegData::Quad(clear)),
        reg_write(Reg::StencilReference, RegData::Uint(7)),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = jasper(trace, 3, pipelined());
    let initial = jasper.sys.regs.color.clear;
    for _ in 0..5 {
        jasper.clock();
    }

    let sys = &jasper.sys;
    assert_eq!(sys.regs.status, Status::Drawing);
    assert_eq!(sys.cp.updates.fragment.occupied(), 2);
    assert_eq!(sys.regs.color.clear, initial);
    assert_eq!(sys.regs.zstencil.stencil_reference, 0);

    while jasper.sys.regs.status != Status::EndFragment {
        jasper.clock();
        assert_eq!(jasper.sys.regs.color.clear, initial);
    }

    jasper.clock();
    assert_eq!(jasper.sys.regs.color.clear, clear);
    assert_eq!(jasper.sys.regs.zstencil.stencil_reference, 0);

    jasper.clock();
    assert_eq!(jasper.sys.regs.zstencil.stencil_reference, 7);
    assert!(jasper.sys.cp.updates.fragment.is_empty());

    run(&mut jasper);
    assert_eq!(jasper.sys.stats.get(Counter::RegWrites), 2);
    assert_eq!(jasper.sys.stats.get(Counter::Frames), 1);
}

#[test]
fn buffer_commands_complete() {
    let trace = vec![
        Transaction::command(Command::ClearColorBuffer),
        Transaction::command(Command::ClearZStencilBuffer),
        Transaction::command(Command::FlushColor),
        Transaction::command(Command::SaveColorState),
        Transaction::command(Command::RestoreZStencilState),
        Transaction::command(Command::ResetColorState),
        Transaction::command(Command::DumpDepth),
        Transaction::command(Command::Blit),
    ];

    let mut jasper = jasper(trace, 2, Config::default());
    let states = run(&mut jasper);

    for state in [
        Status::ClearColor,
        Status::ClearZ,
        Status::FlushColor,
        Status::SaveStateColor,
        Status::RestoreStateZ,
        Status::RestoreStateColor,
        Status::DumpBuffer,
        Status::Blitting,
    ] {
        assert!(states.contains(&state), "{state:?} never entered");
    }

    let stats = &jasper.sys.stats;
    assert_eq!(stats.get(Counter::BitBlits), 1);
    assert!(stats.get(Counter::ClearCycles) > 0);
    assert!(stats.get(Counter::SaveRestoreStateCycles) > 0);
    assert_eq!(jasper.sys.cp.dump, None);
}

#[test]
fn flush_zstencil_waits() {
    let trace = vec![Transaction::command(Command::FlushZStencil)];

    let mut jasper = jasper(trace, 1, Config::default());
    run(&mut jasper);

    assert!(jasper.sys.stats.get(Counter::FlushCycles) > 10_000 - 1);
}

#[test]
#[should_panic(expected = "is not supported")]
fn clear_buffers_is_fatal() {
    let trace = vec![Transaction::command(Command::ClearBuffers)];
    let mut jasper = jasper(trace, 1, Config::default());
    run(&mut jasper);
}

#[test]
fn skip_frames() {
    let trace = vec![
        Transaction::write(0, vec![1; 64]),
        Transaction::command(Command::Draw),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = jasper(trace, 1, Config::default());
    jasper.command("skip-frames on").unwrap();
    let states = run(&mut jasper);

    assert!(!states.contains(&Status::Drawing));
    assert!(!states.contains(&Status::MemoryWrite));

    let stats = &jasper.sys.stats;
    assert_eq!(stats.get(Counter::WriteTrans), 0);
    assert_eq!(stats.get(Counter::Batches), 1);
    assert_eq!(stats.get(Counter::Frames), 1);
}

#[test]
fn forced_command() {
    let modules = Modules {
        trace: Box::new(NopTraceModule),
        units: Box::new(IdealUnitsModule::new(IdealConfig {
            latency: 1,
            ..Default::default()
        })),
    };

    let mut jasper = Jasper::new(modules, Config::default());
    jasper.clock();

    jasper.command("force FLUSH_COLOR").unwrap();
    assert!(matches!(
        jasper.command("force FLUSH_COLOR"),
        Err(CommandError::Pending)
    ));

    let mut ended = false;
    for _ in 0..20 {
        jasper.clock();
        if jasper.sys.cp.end_of_forced_command() {
            ended = true;
            break;
        }
    }

    assert!(ended);
    assert_eq!(jasper.sys.regs.status, Status::Ready);
    assert!(jasper.sys.stats.get(Counter::FlushCycles) > 0);
}

#[test]
fn cycle_flags() {
    let trace = vec![
        Transaction::new(Kind::InitEnd),
        Transaction::command(Command::Draw),
        Transaction::command(Command::SwapBuffers),
    ];

    let mut jasper = jasper(trace, 1, Config::default());
    let (mut batches, mut swaps, mut commands) = (0, 0, 0);
    while !jasper.sys.is_end_of_trace() {
        jasper.clock();

        let cp = &jasper.sys.cp;
        batches += cp.end_of_batch() as u32;
        swaps += cp.is_swap() as u32;
        commands += cp.end_of_command() as u32;
        assert!(!cp.end_of_forced_command());
    }

    assert_eq!(batches, 1);
    assert_eq!(swaps, 1);
    assert_eq!(commands, 3);
    assert!(jasper.sys.cp.end_of_initialization());
}

#[test]
fn forced_swap() {
    let modules = Modules {
        trace: Box::new(NopTraceModule),
        units: Box::new(IdealUnitsModule::new(IdealConfig {
            latency: 1,
            ..Default::default()
        })),
    };

    let mut jasper = Jasper::new(modules, Config::default());
    jasper.command("forceswap").unwrap();
    assert!(matches!(
        jasper.command("dumpcolor"),
        Err(CommandError::Pending)
    ));

    let mut swapped = false;
    for _ in 0..20 {
        jasper.clock();
        if jasper.sys.cp.is_swap() {
            assert!(jasper.sys.cp.end_of_forced_command());
            swapped = true;
            break;
        }
    }

    assert!(swapped);
    assert_eq!(jasper.sys.stats.get(Counter::Frames), 1);

    jasper.command("dumpstencil").unwrap();
    for _ in 0..20 {
        jasper.clock();
    }

    assert_eq!(jasper.sys.regs.status, Status::Ready);
    assert!(jasper.sys.cp.forced.is_none());
}

#[test]
fn save_registers() {
    let dir = tempfile::tempdir().unwrap();
    let trace = vec![reg_write(Reg::DisplayXRes, RegData::Uint(1920))];
    let config = Config {
        snapshot_dir: dir.path().to_owned(),
        ..Default::default()
    };

    let mut jasper = jasper(trace, 1, config);
    run(&mut jasper);
    jasper.command("_saveregisters").unwrap();

    let file = std::fs::File::open(dir.path().join(debug::REGISTERS_SNAPSHOT)).unwrap();
    let regs: crate::system::regs::Registers = ciborium::from_reader(file).unwrap();
    assert_eq!(regs.display.width, 1920);
    assert_eq!(regs, jasper.sys.regs);
}

#[test]
fn validation_log_rotates_on_swap() {
    let trace = vec![
        reg_write(Reg::DisplayXRes, RegData::Uint(640)),
        Transaction::command(Command::SwapBuffers),
        reg_write(Reg::DisplayYRes, RegData::Uint(480)),
    ];

    let config = Config {
        validation: true,
        ..Default::default()
    };

    let mut jasper = jasper(trace, 1, config);
    run(&mut jasper);

    let first = jasper.sys.cp.transaction_log();
    let kinds = first.iter().map(|t| t.kind.clone()).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        [
            Kind::RegWrite {
                reg: Reg::DisplayXRes,
                sub: 0,
                data: RegData::Uint(640)
            },
            Kind::Command(Command::SwapBuffers),
        ]
    );

    let second = jasper.sys.cp.transaction_log();
    assert_eq!(second.len(), 1);
    assert_eq!(jasper.sys.regs.display.width, 640);
    assert_eq!(jasper.sys.regs.display.height, 480);
}

#[test]
fn register_fan_out() {
    let trace = vec![reg_write(Reg::ViewportWidth, RegData::Uint(256))];

    let mut jasper = jasper(trace, 1, Config::default());
    jasper.clock();
    jasper.clock();

    let links = &jasper.sys.links;
    assert_eq!(jasper.sys.regs.raster.viewport.width, 256);
    assert_eq!(links.rasterizer.command.len(), 1);
    assert_eq!(links.dac.command.len(), 1);
    assert!(links.zstencil.iter().all(|link| link.command.len() == 1));
    assert!(links.color.iter().all(|link| link.command.len() == 1));
    assert!(links.streamer.command.is_empty());
    assert!(links.vertex_shaders.iter().all(|signal| signal.is_empty()));
}

#[test]
fn shader_program_pc_routes_by_target() {
    let trace = vec![Transaction::reg_write(
        Reg::ShaderProgramPc,
        1,
        RegData::Uint(12),
    )];

    let mut jasper = jasper(trace, 1, Config::default());
    jasper.clock();
    jasper.clock();

    let links = &jasper.sys.links;
    assert_eq!(jasper.sys.regs.shader.start_pc[1], 12);
    assert!(links.vertex_shaders.iter().all(|signal| signal.is_empty()));
    assert!(links.fragment_shaders.iter().all(|signal| signal.len() == 1));
}

#[test]
fn texture_address_sub_registers() {
    let handler = write::handler(Reg::TextureAddress).unwrap();
    let mut regs = crate::system::regs::Registers::default();

    // unit 2, mip level 3, face 4
    (handler.store)(&mut regs, 2 * 78 + 3 * 6 + 4, &RegData::Uint(0xCAFE));
    assert_eq!(regs.textures[2].address[3][4], 0xCAFE);
    assert_eq!(handler.subs, 16 * 78);
}

#[test]
#[should_panic(expected = "invalid value")]
fn invalid_register_value() {
    let trace = vec![reg_write(Reg::DisplayXRes, RegData::Uint(0))];
    let mut jasper = jasper(trace, 1, Config::default());
    run(&mut jasper);
}

#[test]
#[should_panic(expected = "is read only")]
fn read_only_register() {
    let trace = vec![reg_write(Reg::Status, RegData::Uint(0))];
    let mut jasper = jasper(trace, 1, Config::default());
    run(&mut jasper);
}

#[test]
#[should_panic(expected = "unknown GPU register 1A")]
fn unknown_register() {
    Reg::new(0x1A);
}

struct NoRasterizer;

impl UnitsModule for NoRasterizer {
    fn clock(&mut self, cycle: u64, links: &mut Links) {
        NopUnitsModule.clock(cycle, links);
        links.rasterizer.state.clear();
    }
}

#[test]
#[should_panic(expected = "missing rasterizer state at cycle 0")]
fn missing_unit_state() {
    let modules = Modules {
        trace: Box::new(NopTraceModule),
        units: Box::new(NoRasterizer),
    };

    let mut jasper = Jasper::new(modules, Config::default());
    jasper.clock();
}

#[test]
fn tickets() {
    let mut tickets = Tickets::default();
    let issued = (0..10).map(|_| tickets.issue()).collect::<Vec<_>>();

    assert_eq!(issued, (0..10u32).collect::<Vec<_>>());
    assert_eq!(tickets.free(), MAX_MEMORY_TICKETS - 10);

    for _ in 0..10 {
        tickets.release();
    }

    assert_eq!(tickets.free(), MAX_MEMORY_TICKETS);
}

#[test]
fn update_buffer() {
    let update = |sub| Update {
        reg: Reg::FragmentConstant,
        sub,
        data: RegData::Quad([0.0; 4]),
        cookies: Default::default(),
    };

    let mut buffer = UpdateBuffer::default();
    for sub in 0..MAX_REGISTER_UPDATES as u32 {
        assert!(buffer.push(update(sub)).is_ok());
        assert_eq!(buffer.occupied() + buffer.free(), MAX_REGISTER_UPDATES);
    }

    assert!(buffer.is_full());
    assert_eq!(buffer.push(update(999)), Err(update(999)));

    for sub in 0..3 {
        assert_eq!(buffer.pop().map(|u| u.sub), Some(sub));
    }

    assert!(buffer.push(update(1000)).is_ok());
    assert_eq!(buffer.occupied(), MAX_REGISTER_UPDATES - 2);

    buffer.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.pop(), None);
}

#[test]
fn debug_commands() {
    let mut jasper = jasper(Vec::new(), 1, Config::default());

    let err = jasper.command("frobnicate").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @r#"unknown command "frobnicate""#);

    let err = jasper.command("skip-draw maybe").unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"usage: skip-draw <on|off> - count draws without executing them");

    assert!(matches!(
        jasper.command("force NOT_A_COMMAND"),
        Err(CommandError::Usage { .. })
    ));

    jasper.command("skip-draw on").unwrap();
    assert!(jasper.sys.cp.skip_draw);

    assert!(
        debug::command_list()
            .iter()
            .all(|(name, usage)| usage.starts_with(name))
    );
}

#[test]
fn statistics_report() {
    let trace = vec![reg_write(Reg::DisplayXRes, RegData::Uint(640))];
    let mut jasper = jasper(trace, 1, Config::default());
    run(&mut jasper);

    let report = jasper.sys.stats.report();
    assert_eq!(report.keys().next(), Some(&"regWrites"));
    assert_eq!(report["regWrites"], 1);
    assert_eq!(report.len(), Counter::VARIANTS.len());
}

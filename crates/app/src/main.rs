mod cli;

use std::path::Path;

use clap::Parser;
use eyre_pretty::eyre::{Result, WrapErr};
use jasper::Jasper;
use jasper::modules::trace::QueueTraceModule;
use jasper::modules::units::{IdealConfig, IdealUnitsModule};
use jasper::system::cp::debug;
use jasper::system::cp::transaction::Transaction;
use jasper::system::{self, Modules};

fn load_trace(path: &Path) -> Result<Vec<Transaction>> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read trace {}", path.display()))?;

    let transactions = ron::from_str(&text)
        .wrap_err_with(|| format!("failed to parse trace {}", path.display()))?;

    Ok(transactions)
}

fn exec_debug_command(jasper: &mut Jasper, line: &str) {
    if line == "help" {
        for (_, usage) in debug::command_list() {
            println!("{usage}");
        }

        return;
    }

    match jasper.command(line) {
        Ok(()) => tracing::info!(cycle = jasper.sys.cycle, "executed debug command {line:?}"),
        Err(e) => tracing::warn!(cycle = jasper.sys.cycle, "debug command {line:?} failed: {e}"),
    }
}

fn setup_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let file = std::fs::File::options()
        .truncate(true)
        .create(true)
        .write(true)
        .open("log.log")
        .unwrap();

    let (file_nb, _guard_file) = tracing_appender::non_blocking(file);
    let file_layer = fmt::layer().with_writer(file_nb).with_ansi(false);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or(EnvFilter::new("app=debug,jasper=debug,jasper::modules=info"));

    let subscriber = tracing_subscriber::registry()
        .with(file_layer)
        .with(env_filter);

    subscriber.init();

    _guard_file
}

fn main() -> Result<()> {
    eyre_pretty::install()?;
    let _tracing_guard = setup_tracing();
    let cfg = cli::Config::parse();

    let transactions = load_trace(&cfg.trace)?;
    tracing::info!(
        transactions = transactions.len(),
        "loaded trace {}",
        cfg.trace.display()
    );

    let modules = Modules {
        trace: Box::new(QueueTraceModule::new(transactions)),
        units: Box::new(IdealUnitsModule::new(IdealConfig {
            latency: cfg.latency,
            fragment_latency: cfg.fragment_latency,
            memory_size: cfg.memory_size.as_u64(),
            bus_width: cfg.bus_width,
        })),
    };

    let config = system::Config {
        vertex_shaders: cfg.topology.vertex_shaders,
        fragment_shaders: cfg.topology.fragment_shaders,
        texture_units: cfg.topology.texture_units,
        stamp_units: cfg.topology.stamp_units,
        pipelined_batches: cfg.pipelined,
        dump_shaders: cfg.dump_shaders,
        validation: cfg.validation,
        bus_width: cfg.bus_width,
        snapshot_dir: cfg.snapshot_dir.clone(),
    };

    let mut jasper = Jasper::new(modules, config);
    let max_cycles = cfg.max_cycles.unwrap_or(u64::MAX);

    let mut debug_commands = cfg.debug_commands.clone();
    debug_commands.sort_by_key(|command| command.cycle);

    for command in &debug_commands {
        let until = command.cycle.min(max_cycles);
        jasper.exec(until.saturating_sub(jasper.sys.cycle));
        if jasper.sys.cycle != command.cycle {
            break;
        }

        exec_debug_command(&mut jasper, &command.line);
    }

    jasper.exec(max_cycles.saturating_sub(jasper.sys.cycle));

    if jasper.sys.is_end_of_trace() {
        tracing::info!(cycle = jasper.sys.cycle, "simulation finished");
    } else {
        tracing::warn!(cycle = jasper.sys.cycle, "cycle limit reached before the end of the trace");
    }

    println!("cycles: {}", jasper.sys.cycle);
    println!("frames: {}", jasper.sys.cp.frame);
    for (name, value) in jasper.sys.stats.report() {
        println!("{name}: {value}");
    }

    Ok(())
}

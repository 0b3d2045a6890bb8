//! `catcheck`: run the catalog consistency checks against a cluster catalog
//! snapshot and report the verdict through the exit code.

mod cli;
mod config;
mod telemetry;

use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use catcheck_core::{
    CheckRegistry, Connector, DropStyle, FileRepairGenerator, Orchestrator, ReportSink,
    RunContext, RunSummary, SnapshotConnector, TempSchemaDropper, TracingSink, checkcat_report,
    drop_leaked_schemas, load_segment_registry, resolve_batch_size,
};
use catcheck_error::Result;
use catcheck_types::CheckId;
use tracing::{debug, info};

use crate::cli::{CliArgs, Invocation, parse_args, print_help};
use crate::config::CatcheckConfig;

/// Exit code for usage, configuration and lookup errors.
const USAGE_EXIT: u8 = 4;

fn list_checks(registry: &CheckRegistry) {
    for id in registry.ids() {
        println!("{:<24} {}", id.as_str(), id.description());
    }
}

fn run(args: &CliArgs) -> Result<u8> {
    let mut config = CatcheckConfig::load(args.config.as_deref())?;
    config.apply_cli(args);
    telemetry::init(&config.log.level);

    let registry = CheckRegistry::standard();
    if args.list {
        list_checks(&registry);
        return Ok(0);
    }

    // Resolve every check name before touching the cluster.
    for name in &args.run_checks {
        registry.lookup(name)?;
    }
    let skip = args
        .skip_checks
        .iter()
        .map(|name| name.parse::<CheckId>())
        .collect::<Result<Vec<_>>>()?;

    let connector = Arc::new(SnapshotConnector::new(config.snapshot_dir()?));
    let coordinator = connector.connect_coordinator()?;
    let segments = load_segment_registry(&coordinator)?;
    let sink: Arc<dyn ReportSink> = Arc::new(TracingSink);

    let batch = resolve_batch_size(
        config.batch.size,
        &coordinator,
        &segments,
        &config.batch.policy,
        sink.as_ref(),
    );
    debug!(?batch, "batch size");

    let mut ctx = RunContext::new(config.cluster.database.clone());
    if !args.skip_leaked_schemas {
        // Snapshot files are independent, so the drop must reach each primary.
        let dropper = TempSchemaDropper::new(DropStyle::DeleteNamespaceRow)
            .with_segments(Arc::clone(&connector) as Arc<dyn Connector>, segments.clone());
        drop_leaked_schemas(&dropper, &coordinator, &mut ctx, sink.as_ref());
    }

    let mut orchestrator = Orchestrator::new(registry, segments, connector, Arc::clone(&sink))
        .with_batch_size(batch.size);
    if config.repair.enabled {
        info!(dir = %config.repair.dir.display(), "repair mode enabled");
        orchestrator = orchestrator
            .with_repair_generator(Arc::new(FileRepairGenerator::new(config.repair.dir.clone())));
    }

    if args.run_checks.is_empty() {
        orchestrator.run_all_checks(&coordinator, &skip, &mut ctx);
    } else {
        orchestrator.run_selected(args.run_checks.as_slice(), &coordinator, &mut ctx)?;
    }

    checkcat_report(&ctx, sink.as_ref());
    if args.json {
        println!("{}", RunSummary::from(&ctx).to_json_pretty()?);
    }
    Ok(ctx.exit_code())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let parsed = match parse_args(&args) {
        Ok(Invocation::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Ok(Invocation::Run(parsed)) => parsed,
        Err(error) => {
            eprintln!("catcheck: {error}\nTry 'catcheck --help' for more information.");
            return ExitCode::from(USAGE_EXIT);
        }
    };

    match run(&parsed) {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("catcheck: {error}");
            ExitCode::from(USAGE_EXIT)
        }
    }
}

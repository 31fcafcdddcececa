//! Shader build command-line tool

mod cli;
mod logging;

use clap::Parser;
use cli::{Cli, Commands, CommonArgs};
use shaderbuild::{
    CompileTarget, DEFAULT_LIBRARY_NAME, EntrySpec, Error, Pipeline, PipelineOptions, RunReport,
    SourceSet, TargetConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for malformed invocations, matching clap's own usage errors
const USAGE_EXIT: u8 = 2;

fn load_config(common: &CommonArgs) -> anyhow::Result<TargetConfig> {
    let mut config = match &common.config {
        Some(path) => TargetConfig::load(path)?,
        None => TargetConfig::default(),
    };

    if let Some(backend) = common.backend {
        config.backend = Some(backend.into());
    }
    if let Some(compiler) = &common.compiler {
        config.compiler = Some(compiler.clone());
    }
    if let Some(model) = common.shader_model {
        config.shader_model = model;
    }
    config.include_dirs.extend(common.include_dirs.iter().cloned());
    config.defines.extend(common.defines.iter().cloned());
    Ok(config)
}

fn build(
    sources: SourceSet,
    output_dir: PathBuf,
    library_name: String,
    common: CommonArgs,
) -> anyhow::Result<RunReport> {
    let config = load_config(&common)?;
    let target = CompileTarget::for_host(&config);
    log::debug!(
        "Target: {} backend, compiler {}",
        target.backend,
        target.compiler.display()
    );

    let mut options = PipelineOptions::new(sources, output_dir);
    options.library_name = library_name;
    options.forced_include = common.include;
    options.entry_symbol = common.entry_symbol;
    options.timeout = common.timeout;
    options.temp_dir = common.temp_dir;
    if let Some(stages) = common.stages {
        options.stages = stages;
    }
    if let Some(jobs) = common.jobs {
        options.jobs = usize::from(jobs);
    }

    Ok(Pipeline::new(&target, options).run()?)
}

fn run(cli: Cli) -> anyhow::Result<RunReport> {
    match cli.command {
        Commands::Compile {
            directory,
            files,
            output_dir,
            output,
            common,
        } => {
            let sources = match directory {
                Some(dir) => SourceSet::Directory(dir),
                None => SourceSet::Files(files),
            };
            build(sources, output_dir, output, common)
        }
        Commands::Entries {
            output_dir,
            triples,
            common,
        } => {
            // Validated before anything touches the filesystem.
            let specs = EntrySpec::parse_triples(&triples)?;
            build(
                SourceSet::Entries(specs),
                output_dir,
                DEFAULT_LIBRARY_NAME.to_string(),
                common,
            )
        }
    }
}

fn print_report(report: &RunReport) {
    for failure in report.failures() {
        eprintln!("error: {failure}");
    }
    if let Some(library) = &report.library {
        println!("packed {}", library.display());
    }
    println!(
        "compiled {} of {} entry points",
        report.succeeded(),
        report.jobs.len()
    );
}

fn exit_code(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<Error>() {
        Some(Error::Usage(_) | Error::UnknownStage(_)) => ExitCode::from(USAGE_EXIT),
        _ => ExitCode::FAILURE,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose, cli.quiet);

    match run(cli) {
        Ok(report) => {
            print_report(&report);
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code(&e)
        }
    }
}

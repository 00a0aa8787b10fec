// logtally - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading (platform config dir or --config)
// 3. Logging initialisation (debug mode support)
// 4. One analysis run, reporting the outcome and exit status

use clap::Parser;
use logtally::app::pipeline::Analyzer;
use logtally::platform::config::{self, PipelineContext, PlatformPaths};
use logtally::util::{self, constants};
use std::path::PathBuf;
use std::process::ExitCode;

/// logtally - parse a server log, filter it, and write a summary report.
#[derive(Parser, Debug)]
#[command(name = "logtally", version, about)]
struct Cli {
    /// Log file to analyse.
    input: PathBuf,

    /// Report output path (overwritten).
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Minimum severity: Debug, Info, Warning or Error.
    #[arg(short = 'l', long = "level")]
    level: Option<String>,

    /// Filter criteria, e.g. "Level=Error AND StatusCode=500".
    #[arg(short = 'f', long = "filter")]
    filter: Option<String>,

    /// Line format: plain, access, combined or auto.
    #[arg(short = 'm', long = "mode")]
    mode: Option<String>,

    /// Also export the filtered records (.json or .csv).
    #[arg(long = "export")]
    export: Option<String>,

    /// Fail on level tokens that are not a known severity.
    #[arg(long = "strict-levels")]
    strict_levels: bool,

    /// Treat OR as a real disjunction of AND-groups.
    #[arg(long = "or-of-ands")]
    or_of_ands: bool,

    /// Worker threads for the processing stage (0 = auto).
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// Path to config.toml (defaults to the platform config directory).
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

impl Cli {
    /// Context holding only the values given on the command line.
    fn to_context(&self) -> PipelineContext {
        let mut ctx = PipelineContext::new(self.input.clone());
        let pairs = [
            (constants::KEY_OUTPUT_PATH, self.output.clone()),
            (constants::KEY_LOG_LEVEL, self.level.clone()),
            (constants::KEY_FILTER, self.filter.clone()),
            (constants::KEY_PARSE_MODE, self.mode.clone()),
            (constants::KEY_EXPORT_PATH, self.export.clone()),
            (constants::KEY_WORKER_THREADS, self.jobs.map(|n| n.to_string())),
            (
                constants::KEY_LEVEL_POLICY,
                self.strict_levels.then(|| "strict".to_string()),
            ),
            (
                constants::KEY_CONNECTIVES,
                self.or_of_ands.then(|| "or-of-ands".to_string()),
            ),
        ];
        for (key, value) in pairs {
            if let Some(value) = value {
                ctx.set(key, value);
            }
        }
        ctx
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // config.toml comes first so its [logging] section can shape the
    // subscriber. An explicit --config must exist.
    let config_path = match &cli.config {
        Some(path) => {
            if let Err(e) = config::read_config(path) {
                eprintln!("Error: {e}");
                return ExitCode::FAILURE;
            }
            path.clone()
        }
        None => PlatformPaths::resolve().config_file(),
    };
    let (app_config, config_warnings) = config::load_config(&config_path);

    util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        config = %config_path.display(),
        "logtally starting"
    );
    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Configuration warning");
    }

    let mut ctx = cli.to_context();
    ctx.merge_missing(&app_config.analysis);

    let mut analyzer = Analyzer::new();
    match analyzer.analyze(&ctx) {
        Ok(_) => {
            let output = ctx.get(constants::KEY_OUTPUT_PATH).unwrap_or_default();
            println!("Report successfully saved to {output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

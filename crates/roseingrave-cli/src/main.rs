#![forbid(unsafe_code)]

mod cmd;
mod output;

use std::env;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use roseingrave_core::definitions::DefinitionsError;
use roseingrave_core::document::DocumentError;
use roseingrave_core::model::EntityError;
use roseingrave_core::settings::SettingsError;
use roseingrave_core::sheet::SheetError;
use roseingrave_core::store::StoreError;
use roseingrave_core::template::TemplateError;
use roseingrave_core::{ErrorCode, StrictError};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "roseingrave",
    author,
    version,
    about = "roseingrave: reconcile volunteer music transcriptions",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Fail on warnings instead of only displaying them.
    #[arg(long, global = true)]
    strict: bool,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Emit JSON output (alias for `--format json`).
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Definitions",
        about = "Validate settings and definitions files",
        long_about = "Validate the settings, template, piece and volunteer definitions files and the spreadsheets index without writing anything.",
        after_help = "EXAMPLES:\n    # Check the configured files\n    roseingrave check\n\n    # Treat warnings as errors\n    roseingrave check --strict"
    )]
    Check(cmd::check::CheckArgs),

    #[command(
        next_help_heading = "Definitions",
        about = "Rewrite definitions files in canonical form",
        long_about = "Rewrite the piece and volunteer definitions files with repeats combined, supplemental sources last, and unknown pieces removed.",
        after_help = "EXAMPLES:\n    # Fix both definitions files\n    roseingrave fix-input\n\n    # Preview without writing\n    roseingrave fix-input --dry-run\n\n    # Also normalize the settings file\n    roseingrave fix-input --settings"
    )]
    FixInput(cmd::fix_input::FixInputArgs),

    #[command(
        next_help_heading = "Volunteers",
        about = "Create volunteer workbooks",
        long_about = "Render one workbook per volunteer with a sheet for each assigned piece, and record it in the spreadsheets index.",
        after_help = "EXAMPLES:\n    # Create workbooks for volunteers without one\n    roseingrave create-sheets\n\n    # Re-render existing workbooks\n    roseingrave create-sheets --replace\n\n    # Only some volunteers\n    roseingrave create-sheets ann@example.com bob@example.com"
    )]
    CreateSheets(cmd::create_sheets::CreateSheetsArgs),

    #[command(
        next_help_heading = "Volunteers",
        about = "Export volunteer data files",
        long_about = "Read every volunteer workbook in the spreadsheets index back into one volunteer data file per volunteer.",
        after_help = "EXAMPLES:\n    # Export every volunteer\n    roseingrave volunteer-summary\n\n    # Skip sheets for unassigned pieces\n    roseingrave volunteer-summary --known-only"
    )]
    VolunteerSummary(cmd::volunteer_summary::VolunteerSummaryArgs),

    #[command(
        next_help_heading = "Pieces",
        about = "Export piece data files",
        long_about = "Fold the volunteer data files into one piece data file per piece, with contributor rows keyed by volunteer email.",
        after_help = "EXAMPLES:\n    # Every piece with data\n    roseingrave piece-summary\n\n    # Only some pieces\n    roseingrave piece-summary \"Sonata K. 1\""
    )]
    PieceSummary(cmd::piece_summary::PieceSummaryArgs),

    #[command(
        next_help_heading = "Pieces",
        about = "Compile piece data files into the summary",
        long_about = "Validate every piece data file and compile them into the summary file, giving every source an empty summary slot.",
        after_help = "EXAMPLES:\n    # Compile into the configured summary file\n    roseingrave compile-pieces\n\n    # Write elsewhere\n    roseingrave compile-pieces --summary out/summary.json"
    )]
    CompilePieces(cmd::compile_pieces::CompilePiecesArgs),

    #[command(
        next_help_heading = "Master",
        about = "Render the master workbook",
        long_about = "Render the master workbook from the summary file, one sheet per piece.",
        after_help = "EXAMPLES:\n    # Update the master workbook\n    roseingrave import-master\n\n    # Write to the configured path\n    roseingrave import-master --create"
    )]
    ImportMaster(cmd::import_master::ImportMasterArgs),

    #[command(
        next_help_heading = "Master",
        about = "Export the master workbook into the summary",
        long_about = "Read the master workbook back into the summary file, applying summary column rotation.",
        after_help = "EXAMPLES:\n    # Export the master workbook\n    roseingrave export-master\n\n    # Drop contributors not assigned to each piece\n    roseingrave export-master --known-only"
    )]
    ExportMaster(cmd::export_master::ExportMasterArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    roseingrave completions bash\n\n    # Generate zsh completions\n    roseingrave completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("ROSEINGRAVE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "roseingrave=debug,info"
        } else {
            "roseingrave=info,warn"
        })
    });

    let format = env::var("ROSEINGRAVE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// The library error code behind `err`, if any.
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<StrictError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<DocumentError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<DefinitionsError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<EntityError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<TemplateError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<SettingsError>() {
            Some(e.code())
        } else if let Some(e) = cause.downcast_ref::<SheetError>() {
            Some(e.code())
        } else {
            cause.downcast_ref::<StoreError>().map(StoreError::code)
        }
    })
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::print_completions(args.shell, &mut command);
    }

    let root = env::current_dir()?;
    let mut ctx = cmd::Context::load(&root, cli.strict, output, cli.quiet)?;
    let report = match &cli.command {
        Commands::Check(args) => cmd::check::run_check(args, &mut ctx)?,
        Commands::FixInput(args) => cmd::fix_input::run_fix_input(args, &mut ctx)?,
        Commands::CreateSheets(args) => cmd::create_sheets::run_create_sheets(args, &mut ctx)?,
        Commands::VolunteerSummary(args) => {
            cmd::volunteer_summary::run_volunteer_summary(args, &mut ctx)?
        }
        Commands::PieceSummary(args) => cmd::piece_summary::run_piece_summary(args, &mut ctx)?,
        Commands::CompilePieces(args) => {
            cmd::compile_pieces::run_compile_pieces(args, &mut ctx)?
        }
        Commands::ImportMaster(args) => cmd::import_master::run_import_master(args, &mut ctx)?,
        Commands::ExportMaster(args) => cmd::export_master::run_export_master(args, &mut ctx)?,
        Commands::Completions(_) => return Ok(()),
    };
    info!(command = report.command, "done");
    report.render(ctx.output, ctx.quiet)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = cli.output_mode();

    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut error = CliError::new(format!("{err:#}"));
            if let Some(code) = error_code(&err) {
                error = error.with_code(code);
            }
            if render_error(output, &error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

//! scriptpack - script bundle editor engine
//!
//! The `sp` binary drives a game directory's script workspace:
//! - extract: unpack the bundle into an editable script tree
//! - pack: rebuild the bundle from the tree
//! - status: report workspace and bundle state
//! - create-loader: reduce the bundle to its loader entry

use clap::{Args, Parser, Subcommand};
use sp_config::resolve_settings;
use sp_core::ExitCode;
use sp_workspace::{loader_params, write_loader_bundle, Editor, ExtractOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// scriptpack - edit game script bundles as plain files
#[derive(Parser)]
#[command(name = "sp")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Game directory to operate on
    #[arg(long, short = 'C', global = true, default_value = ".", env = "SCRIPTPACK_GAME_ROOT")]
    game_root: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack the bundle into the scripts folder and write the manifest
    Extract,

    /// Rebuild the bundle from the scripts folder, loader first
    Pack,

    /// Report section counts and whether the bundle needs extraction
    Status,

    /// Replace the bundle with a loader-only bundle
    CreateLoader,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.global);
    tracing::debug!(game_root = %cli.global.game_root.display(), "sp starting");

    let exit_code = match cli.command {
        Commands::Extract => run_extract(&cli.global),
        Commands::Pack => run_pack(&cli.global),
        Commands::Status => run_status(&cli.global),
        Commands::CreateLoader => run_create_loader(&cli.global),
    };

    std::process::exit(exit_code.as_i32());
}

fn init_logging(global: &GlobalOpts) {
    let default_level = if global.quiet {
        "error"
    } else {
        match global.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_extract(global: &GlobalOpts) -> ExitCode {
    let editor = match Editor::open(&global.game_root) {
        Ok(editor) => editor,
        Err(e) => return fail("open", &e),
    };
    match editor.extract() {
        Ok(ExtractOutcome::Extracted {
            sections,
            manifest_lines,
        }) => {
            println!("extracted {sections} sections, {manifest_lines} manifest lines");
            ExitCode::Clean
        }
        Ok(ExtractOutcome::NotNeeded) => {
            println!("bundle already extracted");
            ExitCode::Clean
        }
        Err(e) => fail("extract", &e),
    }
}

fn run_pack(global: &GlobalOpts) -> ExitCode {
    let editor = match Editor::open(&global.game_root) {
        Ok(editor) => editor,
        Err(e) => return fail("open", &e),
    };
    match editor.pack() {
        Ok(report) => {
            println!("packed {} entries ({} bytes)", report.entries, report.bytes);
            ExitCode::Clean
        }
        Err(e) => fail("pack", &e),
    }
}

fn run_status(global: &GlobalOpts) -> ExitCode {
    let editor = match Editor::open(&global.game_root) {
        Ok(editor) => editor,
        Err(e) => return fail("open", &e),
    };
    match editor.status() {
        Ok(report) => {
            println!(
                "scripts: {}  folders: {}  separators: {}  disabled: {}",
                report.scripts, report.folders, report.separators, report.disabled
            );
            println!(
                "bundle: {}",
                if report.extraction_needed {
                    "extraction needed"
                } else {
                    "loader only"
                }
            );
            ExitCode::Clean
        }
        Err(e) => fail("status", &e),
    }
}

fn run_create_loader(global: &GlobalOpts) -> ExitCode {
    let settings = match resolve_settings(&global.game_root) {
        Ok(settings) => settings,
        Err(e) => return fail("create-loader", &e),
    };
    let bundle = global.game_root.join(&settings.bundle_file);
    if let Some(parent) = bundle.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return fail("create-loader", &e);
        }
    }
    match write_loader_bundle(&bundle, &loader_params(&settings)) {
        Ok(()) => {
            println!("loader bundle written to {}", bundle.display());
            ExitCode::Clean
        }
        Err(e) => fail("create-loader", &e),
    }
}

fn fail(what: &str, error: &dyn std::error::Error) -> ExitCode {
    eprintln!("sp {what}: {error}");
    ExitCode::Failure
}

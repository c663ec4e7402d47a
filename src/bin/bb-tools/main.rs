use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::path::PathBuf;
use std::process::ExitCode;

use bb_tools::{
    error::Error,
    pipeline::{compile_tree, run_batch, BatchRequest},
    settings::Settings,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML file containing the program settings
    #[arg(short, long)]
    settings: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sort a batch download into groups and grade every submission
    Extract {
        /// The batch archive downloaded from the course site
        #[arg(short = 'z', long)]
        zipfile: PathBuf,

        /// Destination directory. Must not exist.
        #[arg(short = 'o', long)]
        outdir: PathBuf,

        /// Roster CSV with STUDENT_ID,GROUP_ID rows
        #[arg(short = 'g', long)]
        groups: Option<PathBuf>,

        /// Only sort and unpack, do not compile or run anything
        #[arg(short = 'u', long, default_value_t = false)]
        unpack_only: bool,

        /// Seconds a test run or program run may take before it is killed
        #[arg(short = 't', long)]
        timeout: Option<u32>,

        /// Also write the report as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Compile every student in an already extracted tree
    Compile {
        /// Root of the extracted tree
        #[arg(short = 'd', long)]
        dir: PathBuf,
    },
    ValidateSettings {},
}

fn main() -> ExitCode {
    let args: Args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Error> {
    let mut s = Settings::load_or_default(args.settings.as_deref())?;
    s.setup_logging("bb-tools")?;
    match args.command {
        Commands::Extract {
            zipfile,
            outdir,
            groups,
            unpack_only,
            timeout,
            json,
        } => {
            if let Some(secs) = timeout {
                s.toolchain.timeout_seconds = secs;
            }
            extract(&s, zipfile, outdir, groups, unpack_only, json)
        }
        Commands::Compile { dir } => compile(&s, dir),
        Commands::ValidateSettings {} => validate_settings(s),
    }
}

/// Grades the batch, printing the report to stdout as it goes.
fn extract(
    s: &Settings,
    batch: PathBuf,
    dest: PathBuf,
    roster: Option<PathBuf>,
    unpack_only: bool,
    json: Option<PathBuf>,
) -> Result<(), Error> {
    let req = BatchRequest {
        batch,
        dest,
        roster,
        unpack_only,
    };
    let mut stdout = std::io::stdout().lock();
    let report = run_batch(s, &req, &mut stdout)?;
    if let Some(path) = json {
        report.write_json(&path)?;
        log::info!("Wrote JSON report to {}", path.display());
    }
    Ok(())
}

fn compile(s: &Settings, dir: PathBuf) -> Result<(), Error> {
    let summary = compile_tree(s, &dir)?;
    println!("OK: {}", summary.ok.iter().join(" "));
    println!("FAILED: {}", summary.failed.iter().join(" "));
    Ok(())
}

fn validate_settings(s: Settings) -> Result<(), Error> {
    println!("Successfully loaded settings: {s:#?}");
    Ok(())
}

use std::path::{Path, PathBuf};

use crate::{
    error::Error,
    layout::SubmissionLayout,
    settings::ToolchainSettings,
    stage::{join_classpath, StageOutcome},
    supervisor::{DeadlineSupervisor, ExternalCommand},
    utils::sorted_dir_entries,
};

pub const SOURCE_EXTENSION: &str = ".java";

/// Source files directly inside `layout.src`, in name order. Nested
/// directories are left to the compiler's own `-sourcepath` resolution.
pub fn discover_sources(layout: &SubmissionLayout) -> Result<Vec<PathBuf>, Error> {
    Ok(sorted_dir_entries(&layout.src)?
        .into_iter()
        .filter(|(name, path)| name.ends_with(SOURCE_EXTENSION) && path.is_file())
        .map(|(_, path)| path)
        .collect())
}

/// The compiler invocation for a single source file.
pub fn compile_command(
    toolchain: &ToolchainSettings,
    layout: &SubmissionLayout,
    source: &Path,
) -> Result<ExternalCommand, Error> {
    let mut cmd = ExternalCommand::new(&toolchain.javac)
        .arg("-source")
        .arg(&toolchain.language_level)
        .arg("-target")
        .arg(&toolchain.language_level)
        .arg("-d")
        .arg(&layout.bin)
        .arg("-sourcepath")
        .arg(&layout.src);
    if !toolchain.classpath.is_empty() {
        cmd = cmd
            .arg("-classpath")
            .arg(join_classpath(&toolchain.classpath)?);
    }
    Ok(cmd.arg(source))
}

/// Compiles every source file of the submission, one compiler run per file,
/// writing compiler output to `compile.log`.
///
/// Stops at the first file that does not compile and returns its outcome;
/// the remaining files are not attempted. An empty source directory
/// compiles trivially.
pub fn compile(
    toolchain: &ToolchainSettings,
    layout: &SubmissionLayout,
) -> Result<StageOutcome, Error> {
    let supervisor = DeadlineSupervisor::new(toolchain.compile_timeout());
    let sources = discover_sources(layout)?;
    if sources.is_empty() {
        log::info!("No source files in {}", layout.src.display());
    }

    for source in sources.iter() {
        let cmd = compile_command(toolchain, layout, source)?;
        let outcome = supervisor.run(&cmd, layout.compile_log())?;
        if !outcome.is_success() {
            log::info!("Compiling {} {outcome}", source.display());
            return Ok(outcome);
        }
    }
    log::debug!("Compiled {} source files in {}", sources.len(), layout.src.display());
    Ok(StageOutcome::Success)
}

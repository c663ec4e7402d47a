use std::path::{Path, PathBuf};

use crate::{
    error::Error,
    layout::SubmissionLayout,
    settings::ToolchainSettings,
    stage::{join_classpath, StageOutcome},
    supervisor::{DeadlineSupervisor, ExternalCommand},
    utils::sorted_dir_entries,
};

pub const CLASS_EXTENSION: &str = ".class";

/// Finds compiled classes below `bin` whose simple name ends with `suffix`,
/// returned as fully qualified names (`pkg.FooTest`) in name order. Nested
/// and anonymous classes (`Foo$1`) are skipped.
pub fn discover_test_classes<P: AsRef<Path>>(bin: P, suffix: &str) -> Result<Vec<String>, Error> {
    fn recur_scandir(
        found: &mut Vec<String>,
        dir: &Path,
        package: &[String],
        suffix: &str,
    ) -> Result<(), Error> {
        for (name, path) in sorted_dir_entries(dir)? {
            if path.is_dir() {
                let mut sub = package.to_vec();
                sub.push(name);
                recur_scandir(found, &path, &sub, suffix)?;
                continue;
            }
            let Some(simple) = name.strip_suffix(CLASS_EXTENSION) else {
                continue;
            };
            if simple.ends_with(suffix) && !simple.contains('$') {
                let mut qualified = package.to_vec();
                qualified.push(simple.to_string());
                found.push(qualified.join("."));
            }
        }
        Ok(())
    }

    let mut found: Vec<String> = vec![];
    recur_scandir(&mut found, bin.as_ref(), &[], suffix)?;
    Ok(found)
}

/// The test runner invocation for the given test classes.
pub fn test_command(
    toolchain: &ToolchainSettings,
    layout: &SubmissionLayout,
    classes: &[String],
) -> Result<ExternalCommand, Error> {
    let mut classpath: Vec<PathBuf> = vec![layout.bin.clone()];
    classpath.extend(toolchain.classpath.iter().map(PathBuf::from));
    Ok(ExternalCommand::new(&toolchain.java)
        .arg("-classpath")
        .arg(join_classpath(&classpath)?)
        .arg(&toolchain.test_runner)
        .args(classes)
        .cwd(&layout.base))
}

/// Runs the test runner once over every discovered test class, with output
/// going to `tests.log`. No test classes is a valid, empty run.
pub fn run_tests(
    toolchain: &ToolchainSettings,
    layout: &SubmissionLayout,
) -> Result<StageOutcome, Error> {
    let classes = discover_test_classes(&layout.bin, &toolchain.test_suffix)?;
    log::debug!("Found {} test classes: {:?}", classes.len(), classes);
    let cmd = test_command(toolchain, layout, &classes)?;
    let outcome = DeadlineSupervisor::new(toolchain.timeout()).run(&cmd, layout.tests_log())?;
    log::info!("Unit tests in {}: {outcome}", layout.base.display());
    Ok(outcome)
}

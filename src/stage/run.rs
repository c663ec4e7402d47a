use crate::{
    error::Error,
    layout::SubmissionLayout,
    settings::ToolchainSettings,
    stage::StageOutcome,
    supervisor::{DeadlineSupervisor, ExternalCommand},
};

/// The JVM invocation that starts `main_class` from the compiled output.
pub fn run_command(
    toolchain: &ToolchainSettings,
    layout: &SubmissionLayout,
    main_class: &str,
) -> ExternalCommand {
    ExternalCommand::new(&toolchain.java)
        .arg("-classpath")
        .arg(&layout.bin)
        .arg(main_class)
        .cwd(&layout.base)
}

/// Runs the program's entry point under the deadline, with output going to
/// `exec.log`.
pub fn run_entry_point(
    toolchain: &ToolchainSettings,
    layout: &SubmissionLayout,
    main_class: &str,
) -> Result<StageOutcome, Error> {
    let cmd = run_command(toolchain, layout, main_class);
    let outcome = DeadlineSupervisor::new(toolchain.timeout()).run(&cmd, layout.exec_log())?;
    log::info!("Running {main_class} in {}: {outcome}", layout.base.display());
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::tests::{stub_toolchain, write_source};
    use asserting::prelude::*;

    #[test]
    fn test_run_command() {
        let layout = SubmissionLayout::new("/out", "A", "123456ab");
        let cmd = run_command(&ToolchainSettings::default(), &layout, "app.Main");
        assert_that!(cmd.to_string())
            .is_equal_to("java -classpath /out/A/123456ab/bin app.Main".to_string());
        assert_that!(cmd.cwd).is_equal_to(Some(layout.base.clone()));
    }

    #[test]
    fn test_run_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = stub_toolchain();
        let layout = SubmissionLayout::create(tmp.path(), "A", "123456ab").unwrap();
        write_source(&layout.bin, "Hello.class", "public class Hello {}");
        assert_that!(run_entry_point(&toolchain, &layout, "Hello")).has_value(StageOutcome::Success);
        let log = std::fs::read_to_string(layout.exec_log()).unwrap();
        assert_that!(log.as_str()).contains("Hello World!");
    }

    #[test]
    fn test_run_exit_code() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = stub_toolchain();
        let layout = SubmissionLayout::create(tmp.path(), "A", "123456ab").unwrap();
        write_source(&layout.bin, "app/Main.class", "System.exit(3);");
        assert_that!(run_entry_point(&toolchain, &layout, "app.Main"))
            .has_value(StageOutcome::ToolchainFailure { code: 3 });
    }

    #[test]
    fn test_run_infinite_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let toolchain = stub_toolchain();
        let layout = SubmissionLayout::create(tmp.path(), "A", "123456ab").unwrap();
        write_source(&layout.bin, "Spin.class", "while (true) {}");
        assert_that!(run_entry_point(&toolchain, &layout, "Spin"))
            .has_value(StageOutcome::DeadlineExceeded);
    }
}

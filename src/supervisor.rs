use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use subprocess::{ExitStatus, Popen, PopenConfig, Redirection};

use crate::error::Error;
use crate::stage::StageOutcome;

const NULL_DEVICE: &str = "/dev/null";

/// A program invocation: executable, arguments, working directory and extra
/// environment. Arguments are passed to the program as-is, never through a
/// shell.
#[derive(Debug, Clone, Default)]
pub struct ExternalCommand {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(OsString, OsString)>,
}

impl ExternalCommand {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        ExternalCommand {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    pub fn env<K: AsRef<OsStr>, V: AsRef<OsStr>>(mut self, key: K, value: V) -> Self {
        self.env
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// The full argument vector, program first.
    pub fn argv(&self) -> Vec<OsString> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// The environment of the child: ours, with the extra variables applied.
    fn environment(&self) -> Option<Vec<(OsString, OsString)>> {
        if self.env.is_empty() {
            return None;
        }
        let mut vars: Vec<(OsString, OsString)> = std::env::vars_os()
            .filter(|(k, _)| !self.env.iter().any(|(ek, _)| ek == k))
            .collect();
        vars.extend(self.env.iter().cloned());
        Some(vars)
    }
}

impl std::fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .argv()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        write!(f, "{}", parts.join(" "))
    }
}

/// Runs a child process to completion or until its deadline, whichever comes
/// first.
///
/// The child is started as the leader of a new process group with stdin bound
/// to the null device and stdout/stderr both written to a log file. If it is
/// still running when the deadline passes, the whole process group is killed
/// and the child is reaped before `run` returns.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineSupervisor {
    timeout: Duration,
}

impl DeadlineSupervisor {
    pub fn new(timeout: Duration) -> Self {
        DeadlineSupervisor { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `cmd`, truncating `log_path` and capturing all output into it.
    ///
    /// Returns `Success` on exit code 0, `ToolchainFailure` on any other exit
    /// and `DeadlineExceeded` if the child had to be killed. An `Err` means
    /// the child could not be started or waited on.
    pub fn run<P: AsRef<Path>>(
        &self,
        cmd: &ExternalCommand,
        log_path: P,
    ) -> Result<StageOutcome, Error> {
        let log_path = log_path.as_ref();
        let logfile = File::create(log_path)
            .inspect_err(|e| log::error!("Could not create log file {}: {e}", log_path.display()))?;
        let stdin = File::open(NULL_DEVICE)?;

        log::debug!("Running {cmd} (timeout {:?})", self.timeout);
        let mut handle = Popen::create(
            &cmd.argv(),
            PopenConfig {
                stdin: Redirection::File(stdin),
                stdout: Redirection::File(logfile),
                stderr: Redirection::Merge,
                cwd: cmd.cwd.as_ref().map(|d| d.as_os_str().to_owned()),
                env: cmd.environment(),
                setpgid: true,
                ..Default::default()
            },
        )
        .map_err(|e| {
            log::error!("Could not start {cmd}: {e}");
            Error::from(e)
        })?;

        let status = handle.wait_timeout(self.timeout).inspect_err(|e| {
            log::warn!("(Terminating process) Error when waiting for it to finish: {e}");
            terminate(&mut handle);
        })?;

        match status {
            Some(ExitStatus::Exited(0)) => Ok(StageOutcome::Success),
            Some(ExitStatus::Exited(code)) => Ok(StageOutcome::ToolchainFailure {
                code: code as i32,
            }),
            Some(ExitStatus::Signaled(sig)) => {
                log::debug!("{cmd} terminated by signal {sig}");
                Ok(StageOutcome::ToolchainFailure {
                    code: 128 + i32::from(sig),
                })
            }
            Some(ExitStatus::Other(v)) => Ok(StageOutcome::ToolchainFailure { code: v }),
            Some(ExitStatus::Undetermined) => {
                Error::err_string(format!("Undetermined exit status from {cmd}"))
            }
            None => {
                log::info!("{cmd} still running after {:?}, killing it", self.timeout);
                terminate(&mut handle);
                Ok(StageOutcome::DeadlineExceeded)
            }
        }
    }
}

/// Kills the child's process group and reaps the child.
fn terminate(handle: &mut Popen) {
    if let Some(pid) = handle.pid() {
        killpg(Pid::from_raw(pid as i32), Signal::SIGKILL)
            .unwrap_or_else(|e| log::warn!("Could not kill process group {pid}: {e}"));
    }
    // Covers a child that left its process group.
    handle
        .kill()
        .unwrap_or_else(|e| log::debug!("Could not kill process: {e}"));
    handle
        .wait()
        .map(|_| ())
        .unwrap_or_else(|e| log::error!("Could not reap killed process: {e}"));
}

/// The build, test and run steps applied to one unpacked submission.
pub mod build;
pub mod entrypoint;
pub mod run;
pub mod unittest;

/// Result of one stage invocation. Each stage runs at most once per
/// submission and its outcome is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Success,

    /// The compiler, test runner or program exited with a non-zero code.
    ToolchainFailure { code: i32 },

    /// The child was still running when its deadline passed and was killed.
    DeadlineExceeded,

    /// There was nothing to run, e.g. no class with an entry point.
    NotFound,
}

impl StageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success)
    }
}

impl std::fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageOutcome::Success => write!(f, "success"),
            StageOutcome::ToolchainFailure { code } => write!(f, "failed (code {code})"),
            StageOutcome::DeadlineExceeded => write!(f, "deadline exceeded"),
            StageOutcome::NotFound => write!(f, "not found"),
        }
    }
}

/// Joins classpath entries with the platform separator.
pub(crate) fn join_classpath<I, P>(entries: I) -> Result<std::ffi::OsString, crate::error::Error>
where
    I: IntoIterator<Item = P>,
    P: AsRef<std::path::Path>,
{
    std::env::join_paths(entries.into_iter().map(|p| p.as_ref().to_owned()))
        .map_err(|e| crate::error::Error::from(format!("Invalid classpath entry: {e}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::settings::ToolchainSettings;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::OnceLock;
    use std::time::{Duration, Instant};

    /// Stands in for the compiler: "compiles" a source by copying it to
    /// `<bin>/<package path>/<Name>.class`, failing on `SYNTAX_ERROR`.
    const JAVAC_STUB: &str = r#"#!/bin/sh
while [ $# -gt 1 ]; do
    case "$1" in
        -d) bin="$2"; shift 2 ;;
        -source|-target|-sourcepath|-classpath) shift 2 ;;
        *) shift ;;
    esac
done
src="$1"
if grep -q SYNTAX_ERROR "$src"; then
    echo "$src:1: error: not a statement" >&2
    exit 1
fi
name=$(basename "$src" .java)
pkg=$(sed -n 's/^package \([A-Za-z0-9_.]*\);.*/\1/p' "$src" | tr . /)
mkdir -p "$bin/$pkg"
cp "$src" "$bin/$pkg/$name.class"
"#;

    /// Stands in for the JVM. Runs the copied source by looking at markers in
    /// it: `while (true)` loops forever with a background `sleep` child
    /// (pids in `runner.pid` and `sleeper.pid` of the working directory),
    /// `System.exit(n)` exits with `n`.
    /// The test runner fails if any test class contains `FAILING_TEST`.
    const JAVA_STUB: &str = r#"#!/bin/sh
classpath="$2"
shift 2
class="$1"
shift
bin=$(echo "$classpath" | cut -d: -f1)
if [ "$class" = "org.junit.runner.JUnitCore" ]; then
    echo "JUnit version stub"
    for t in "$@"; do
        echo "$t"
        if grep -q FAILING_TEST "$bin/$(echo "$t" | tr . /).class"; then
            exit 1
        fi
    done
    echo "OK ($# tests)"
    exit 0
fi
file="$bin/$(echo "$class" | tr . /).class"
if [ ! -f "$file" ]; then
    echo "Error: Could not find or load main class $class" >&2
    exit 1
fi
if grep -q "while (true)" "$file"; then
    echo $$ > runner.pid
    sleep 1000 &
    echo $! > sleeper.pid
    wait
fi
code=$(sed -n 's/.*System.exit(\([0-9]*\)).*/\1/p' "$file")
echo "Hello World!"
exit ${code:-0}
"#;

    fn stub_dir() -> &'static Path {
        static STUBS: OnceLock<tempfile::TempDir> = OnceLock::new();
        STUBS
            .get_or_init(|| {
                let dir = tempfile::tempdir().unwrap();
                for (name, script) in [("javac", JAVAC_STUB), ("java", JAVA_STUB)] {
                    let path = dir.path().join(name);
                    std::fs::write(&path, script).unwrap();
                    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
                        .unwrap();
                }
                dir
            })
            .path()
    }

    /// Toolchain settings that point at the shell stubs, with a one second
    /// run deadline.
    pub(crate) fn stub_toolchain() -> ToolchainSettings {
        let stubs = stub_dir();
        ToolchainSettings {
            javac: stubs.join("javac").to_string_lossy().into_owned(),
            java: stubs.join("java").to_string_lossy().into_owned(),
            classpath: vec!["/nonexistent/junit4.jar".to_string()],
            compile_timeout_seconds: 10,
            timeout_seconds: 1,
            ..Default::default()
        }
    }

    /// Writes a file below `dir`, creating intermediate directories.
    pub(crate) fn write_source<P: AsRef<Path>>(dir: P, relpath: &str, contents: &str) -> PathBuf {
        let path = dir.as_ref().join(relpath);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub(crate) fn read_pid<P: AsRef<Path>>(path: P) -> i32 {
        std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
    }

    /// True once `pid` no longer runs: it is gone, or it is a zombie waiting
    /// for a parent that is not us. Gives a killed process up to five
    /// seconds to die.
    pub(crate) fn process_gone(pid: i32) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let gone = match std::fs::read_to_string(format!("/proc/{pid}/status")) {
                Ok(status) => status
                    .lines()
                    .find(|l| l.starts_with("State:"))
                    .is_some_and(|l| l.contains('Z')),
                Err(_) => true,
            };
            if gone || Instant::now() > deadline {
                return gone;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

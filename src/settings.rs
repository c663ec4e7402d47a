use serde::Deserialize;
use std::time::Duration;
use toml;

use crate::error::Error;
use crate::utils::{path_absolute_join, path_absolute_parent, path_join};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
    /// The directory in which the batch archive is unpacked before sorting.
    /// Uses the system temp directory if absent.
    pub temp_dir: Option<String>,

    pub log: LoggingSettings,
    pub submissions: SubmissionSettings,
    pub toolchain: ToolchainSettings,

    #[serde(skip)]
    pub reldir: String,
}

/// Logging settings
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct LoggingSettings {
    /// Directory where to store log messages. Only stderr is used if absent.
    pub dir: Option<String>,

    /// Whether to output debug messages.
    pub verbose: bool,
}

/// How batch entries are classified by their file extension.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SubmissionSettings {
    /// Extensions (without the dot) of payloads that are unpacked and graded.
    pub archive_extensions: Vec<String>,

    /// Extensions of payloads that only carry a comment from the student.
    /// These are stored but produce no report row.
    pub comment_extensions: Vec<String>,
}

/// The external compiler, test runner and JVM.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ToolchainSettings {
    pub javac: String,
    pub java: String,

    /// Passed as both `-source` and `-target` to the compiler.
    pub language_level: String,

    /// Jars added to the classpath when compiling and running unit tests.
    pub classpath: Vec<String>,

    /// Main class of the unit test runner.
    pub test_runner: String,

    /// Compiled classes whose simple name ends with this suffix are handed to
    /// the test runner.
    pub test_suffix: String,

    pub compile_timeout_seconds: u32,

    /// Wall-clock budget for the unit tests and for the program itself.
    pub timeout_seconds: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            temp_dir: None,
            log: LoggingSettings::default(),
            submissions: SubmissionSettings::default(),
            toolchain: ToolchainSettings::default(),
            reldir: String::from("."),
        }
    }
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        SubmissionSettings {
            archive_extensions: vec!["zip".to_string()],
            comment_extensions: vec!["txt".to_string()],
        }
    }
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        ToolchainSettings {
            javac: "javac".to_string(),
            java: "java".to_string(),
            language_level: "8".to_string(),
            classpath: vec!["/usr/share/java/junit4.jar".to_string()],
            test_runner: "org.junit.runner.JUnitCore".to_string(),
            test_suffix: "Test".to_string(),
            compile_timeout_seconds: 120,
            timeout_seconds: 30,
        }
    }
}

impl ToolchainSettings {
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_seconds.into())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.into())
    }
}

impl SubmissionSettings {
    fn has_extension(list: &[String], ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        !ext.is_empty() && list.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn is_archive(&self, ext: &str) -> bool {
        Self::has_extension(&self.archive_extensions, ext)
    }

    pub fn is_comment(&self, ext: &str) -> bool {
        Self::has_extension(&self.comment_extensions, ext)
    }
}

fn parse_truth_value(s: &str) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => true,
        _ => false,
    }
}

impl Settings {
    /// Parses settings from a TOML string. Relative paths are kept as-is.
    pub fn from_toml_str(contents: &str) -> Result<Self, Error> {
        let s: Settings = toml::from_str(contents)?;
        Ok(s)
    }

    /// Loads settings from the specified path
    pub fn load(path: &str) -> Result<Self, Error> {
        let contents: String = std::fs::read_to_string(path)
            .inspect_err(|e| eprintln!("Could not load settings from \"{path}\": {e}"))?;
        let mut s = Self::from_toml_str(&contents)
            .inspect_err(|e| eprintln!("Error parsing settings from \"{path}\": {e}"))?;

        s.reldir = path_absolute_parent(&path)?;

        // Relative paths are relative to the settings file
        if let Some(dir) = s.log.dir.as_ref() {
            s.log.dir = Some(path_absolute_join(&s.reldir, dir)?);
        }
        if let Some(dir) = s.temp_dir.as_ref() {
            s.temp_dir = Some(path_absolute_join(&s.reldir, dir)?);
        }
        s.toolchain.classpath = s
            .toolchain
            .classpath
            .iter()
            .map(|jar| path_absolute_join(&s.reldir, jar))
            .collect::<Result<Vec<String>, Error>>()?;

        s.apply_env_overrides()?;
        Ok(s)
    }

    /// Loads settings from the path if given, otherwise starts from the
    /// defaults. Environment overrides apply in both cases.
    pub fn load_or_default(path: Option<&str>) -> Result<Self, Error> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let mut s = Settings::default();
                s.apply_env_overrides()?;
                Ok(s)
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), Error> {
        if let Ok(log_dir) = std::env::var("BBTOOLS_LOG_DIR") {
            self.log.dir = Some(log_dir);
        }
        if let Ok(truth_value) = std::env::var("BBTOOLS_LOG_VERBOSE") {
            self.log.verbose = parse_truth_value(&truth_value);
        }

        // Toolchain
        if let Ok(javac) = std::env::var("BBTOOLS_JAVAC") {
            self.toolchain.javac = javac;
        }
        if let Ok(java) = std::env::var("BBTOOLS_JAVA") {
            self.toolchain.java = java;
        }
        if let Some(classpath) = std::env::var_os("BBTOOLS_CLASSPATH") {
            self.toolchain.classpath = std::env::split_paths(&classpath)
                .map(|p| {
                    p.to_str()
                        .map(String::from)
                        .ok_or(Error::from("Invalid utf-8 in BBTOOLS_CLASSPATH"))
                })
                .collect::<Result<Vec<String>, Error>>()?;
        }
        if let Ok(timeout) = std::env::var("BBTOOLS_TIMEOUT_SECONDS") {
            self.toolchain.timeout_seconds = timeout
                .parse()
                .map_err(|e| Error::from(format!("Invalid timeout value \"{timeout}\": {e}")))?;
        }
        Ok(())
    }

    /// Sets up logging for the current process.
    pub fn setup_logging(self: &Self, prockind: &str) -> Result<(), Error> {
        use log::LevelFilter::{Debug, Info};

        let prockind = prockind.to_string();
        let mut dispatch = fern::Dispatch::new()
            .format(move |out, message, record| {
                out.finish(format_args!(
                    "[{0} {1} ({4}-{5}) {2}:{3}] {6}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.target(),
                    record.line().unwrap_or(0),
                    prockind,
                    std::process::id(),
                    message
                ))
            })
            .level(if self.log.verbose { Debug } else { Info })
            .chain(std::io::stderr());

        if let Some(dir) = self.log.dir.as_ref() {
            std::fs::create_dir_all(dir).map_err(|e| {
                eprintln!("Error creating directory {} for the log file: {}", dir, e);
                e.to_string()
            })?;
            let path_logfile = path_join(dir, "log.out")?;
            dispatch = dispatch.chain(fern::log_file(&path_logfile).inspect_err(|e| {
                eprintln!("Error setting up log file {}: {}", &path_logfile, e)
            })?);
        }

        dispatch.apply()?;
        Ok(())
    }
}

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{
    archive::extract_zip,
    error::Error,
    identity::{display_name, IdentityResolver, UnknownCounter},
    layout::{make_group_folders, SubmissionLayout},
    report::{PayloadKind, ReportRow, Status, StatusReport, SubmissionOutcome},
    roster::RosterIndex,
    settings::Settings,
    stage::{build, entrypoint, run, unittest, StageOutcome},
    utils::{create_dir_if_not_exists, dotted_extension, move_file, sorted_dir_entries},
};

/// What to grade and where to put it.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// The bulk download with one entry per submitted file.
    pub batch: PathBuf,

    /// Destination root. Must not exist yet.
    pub dest: PathBuf,

    /// `STUDENT_ID,GROUP_ID` roster. Everyone lands in the unknown group
    /// without one.
    pub roster: Option<PathBuf>,

    /// Only sort and unpack; skip building, testing and running.
    pub unpack_only: bool,
}

/// Processes submissions one at a time, carrying the roster and the
/// unknown-student counter across them.
pub struct Grader<'a> {
    settings: &'a Settings,
    dest: PathBuf,
    roster: RosterIndex,
    resolver: IdentityResolver,
    unknown: UnknownCounter,
    unpack_only: bool,
}

impl<'a> Grader<'a> {
    pub fn new<P: AsRef<Path>>(
        settings: &'a Settings,
        dest: P,
        roster: RosterIndex,
        unpack_only: bool,
    ) -> Result<Self, Error> {
        Ok(Grader {
            settings,
            dest: std::path::absolute(dest.as_ref())?,
            roster,
            resolver: IdentityResolver::new()?,
            unknown: UnknownCounter::new(),
            unpack_only,
        })
    }

    pub fn roster(&self) -> &RosterIndex {
        &self.roster
    }

    /// Resolves the student and group of a batch entry.
    pub fn identify(&mut self, file_name: &str) -> (String, String) {
        let student = self.resolver.resolve(file_name, &mut self.unknown);
        let group = self.roster.resolve(&student);
        (student, group)
    }

    pub fn classify(&self, file_name: &str) -> PayloadKind {
        let extension = dotted_extension(file_name);
        let submissions = &self.settings.submissions;
        if submissions.is_archive(&extension) {
            PayloadKind::Archive
        } else if submissions.is_comment(&extension) {
            PayloadKind::CommentOnly
        } else {
            PayloadKind::Unsupported { extension }
        }
    }

    /// Moves one batch entry into its student's directory, grades it if it is
    /// an archive, and returns its report row. Comment-only files have no
    /// row.
    ///
    /// Problems with the submission itself end up in the row. An `Err` means
    /// the run cannot continue.
    pub fn process_submission(
        &mut self,
        entry: &Path,
        file_name: &str,
    ) -> Result<Option<ReportRow>, Error> {
        let (student, group) = self.identify(file_name);
        log::info!("Processing {file_name} ({student}, group {group})");

        let layout = SubmissionLayout::create(&self.dest, &group, &student)?;
        let stored = layout.base.join(file_name);
        move_file(entry, &stored)?;

        let mut outcome = SubmissionOutcome::new(self.classify(file_name));
        if outcome.kind == PayloadKind::Archive {
            self.grade_archive(&stored, &layout, &mut outcome)?;
        }

        let shown = display_name(file_name);
        if shown != file_name {
            if layout.is_reserved(shown) {
                log::warn!(
                    "Keeping {file_name} as is, {shown} is taken in {}",
                    layout.base.display()
                );
            } else {
                move_file(&stored, layout.base.join(shown))
                    .unwrap_or_else(|e| log::warn!("Could not rename {file_name} to {shown}: {e}"));
            }
        }

        Ok(Status::fold(&outcome).map(|status| ReportRow {
            student,
            group,
            status,
        }))
    }

    fn grade_archive(
        &self,
        payload: &Path,
        layout: &SubmissionLayout,
        outcome: &mut SubmissionOutcome,
    ) -> Result<(), Error> {
        match extract_zip(payload, &layout.src) {
            Ok(_) => outcome.unpacked = true,
            Err(e) if e.is_corrupt_archive() => {
                log::warn!("Could not unpack submission: {e}");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        if self.unpack_only {
            return Ok(());
        }

        let toolchain = &self.settings.toolchain;
        let compiled = build::compile(toolchain, layout)?;
        outcome.compile = Some(compiled);
        if !compiled.is_success() {
            return Ok(());
        }

        outcome.tests = Some(unittest::run_tests(toolchain, layout)?);

        outcome.run = Some(match entrypoint::find_entry_point(&layout.src)? {
            Some(main_class) => run::run_entry_point(toolchain, layout, &main_class)?,
            None => StageOutcome::NotFound,
        });
        Ok(())
    }
}

/// Creates the scratch directory the batch archive is unpacked into. It is
/// removed when dropped.
fn scratch_dir(settings: &Settings) -> Result<tempfile::TempDir, Error> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("bb-tools-");
    let dir = match settings.temp_dir.as_ref() {
        Some(parent) => {
            create_dir_if_not_exists(parent)?;
            builder.tempdir_in(parent)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

/// Unpacks the batch archive, sorts every entry into
/// `<dest>/<group>/<student>`, grades it, and writes the report rows to
/// `out` as they are produced.
pub fn run_batch<W: Write>(
    settings: &Settings,
    req: &BatchRequest,
    out: &mut W,
) -> Result<StatusReport, Error> {
    // Children run with the submission directory as cwd, so every path
    // handed to them must be absolute.
    let dest = std::path::absolute(&req.dest)?;
    if std::fs::exists(&dest)? {
        return Error::err_string(format!(
            "Target directory {} exists (remove and re-try)",
            dest.display()
        ));
    }

    let roster = match req.roster.as_ref() {
        Some(path) => RosterIndex::load(path)?,
        None => {
            log::info!("No roster given, all students go to the unknown group");
            RosterIndex::default()
        }
    };

    let scratch = scratch_dir(settings)?;
    log::debug!("Unpacking {} to {}", req.batch.display(), scratch.path().display());
    extract_zip(&req.batch, scratch.path())
        .inspect_err(|e| log::error!("Could not unpack the batch archive: {e}"))?;

    std::fs::create_dir_all(&dest)?;
    make_group_folders(&dest, roster.groups())?;

    let mut grader = Grader::new(settings, &dest, roster, req.unpack_only)?;
    let mut report = StatusReport::new();
    report.write_header(out)?;
    for (name, path) in sorted_dir_entries(scratch.path())? {
        if !path.is_file() {
            log::warn!("Skipping directory {name} in the batch archive");
            continue;
        }
        if let Some(row) = grader.process_submission(&path, &name)? {
            report.push(row, out)?;
        }
    }
    let unidentified = grader.unknown.peek() - 1;
    if unidentified > 0 {
        log::warn!("{unidentified} files had no student identifier");
    }
    report.log_tally();
    Ok(report)
}

/// Students whose sources compiled and those whose did not.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompileSummary {
    pub ok: Vec<String>,
    pub failed: Vec<String>,
}

/// Compiles every `<root>/<group>/<student>` in an already sorted tree.
pub fn compile_tree<P: AsRef<Path>>(settings: &Settings, root: P) -> Result<CompileSummary, Error> {
    let root = std::path::absolute(root.as_ref())?;
    let root = root.as_path();
    let mut summary = CompileSummary::default();
    for (group, group_path) in sorted_dir_entries(root)? {
        if !group_path.is_dir() {
            continue;
        }
        for (student, student_path) in sorted_dir_entries(&group_path)? {
            if !student_path.is_dir() {
                continue;
            }
            let layout = SubmissionLayout::create(root, &group, &student)?;
            match build::compile(&settings.toolchain, &layout)? {
                StageOutcome::Success => summary.ok.push(student),
                _ => summary.failed.push(student),
            }
        }
    }
    Ok(summary)
}

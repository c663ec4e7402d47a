use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::{error::Error, stage::StageOutcome};

/// Code reported when the compiler itself ran past its deadline.
pub const COMPILER_TIMEOUT_CODE: i32 = -1;

/// What a batch entry turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadKind {
    /// A zip archive with the student's sources.
    Archive,
    /// A plain note from the student; stored but not reported.
    CommentOnly,
    /// Anything else. Carries the extension including the dot.
    Unsupported { extension: String },
}

/// Everything that happened to one submission. Stages that did not run are
/// `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub kind: PayloadKind,
    pub unpacked: bool,
    pub compile: Option<StageOutcome>,
    /// Logged to `tests.log` only; never changes the status.
    pub tests: Option<StageOutcome>,
    /// `NotFound` if no entry point was found.
    pub run: Option<StageOutcome>,
}

impl SubmissionOutcome {
    pub fn new(kind: PayloadKind) -> Self {
        SubmissionOutcome {
            kind,
            unpacked: false,
            compile: None,
            tests: None,
            run: None,
        }
    }
}

/// The one-line verdict for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    CompilationError { code: i32 },
    UnpackFailed,
    NotZip { extension: String },
    NoMain,
    ExecutionFailed { code: i32 },
    InfiniteLoop,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::CompilationError { code } => write!(f, "Compilation error (code {code})"),
            Status::UnpackFailed => write!(f, "Unable to unpack submission zip"),
            Status::NotZip { extension } => write!(f, "Not zip: {extension}"),
            Status::NoMain => write!(f, "No main()"),
            Status::ExecutionFailed { code } => write!(f, "Execution error: failed (code {code})"),
            Status::InfiniteLoop => write!(f, "Execution error: infinite loop"),
        }
    }
}

impl Status {
    /// Folds the stage outcomes into a status. Comment-only payloads have no
    /// status.
    pub fn fold(outcome: &SubmissionOutcome) -> Option<Status> {
        match &outcome.kind {
            PayloadKind::CommentOnly => return None,
            PayloadKind::Unsupported { extension } => {
                return Some(Status::NotZip {
                    extension: extension.to_owned(),
                })
            }
            PayloadKind::Archive => {}
        }
        if !outcome.unpacked {
            return Some(Status::UnpackFailed);
        }
        match outcome.compile {
            // Unpack-only run
            None => return Some(Status::Ok),
            Some(StageOutcome::Success) => {}
            Some(StageOutcome::ToolchainFailure { code }) => {
                return Some(Status::CompilationError { code })
            }
            Some(StageOutcome::DeadlineExceeded | StageOutcome::NotFound) => {
                return Some(Status::CompilationError {
                    code: COMPILER_TIMEOUT_CODE,
                })
            }
        }
        Some(match outcome.run {
            None | Some(StageOutcome::Success) => Status::Ok,
            Some(StageOutcome::NotFound) => Status::NoMain,
            Some(StageOutcome::ToolchainFailure { code }) => Status::ExecutionFailed { code },
            Some(StageOutcome::DeadlineExceeded) => Status::InfiniteLoop,
        })
    }

    /// Short label used when tallying statuses, without codes or extensions.
    pub fn label(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::CompilationError { .. } => "Compilation error",
            Status::UnpackFailed => "Unable to unpack submission zip",
            Status::NotZip { .. } => "Not zip",
            Status::NoMain => "No main()",
            Status::ExecutionFailed { .. } => "Execution error: failed",
            Status::InfiniteLoop => "Execution error: infinite loop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub student: String,
    pub group: String,
    pub status: Status,
}

impl std::fmt::Display for ReportRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\t{}\t{}", self.student, self.group, self.status)
    }
}

#[derive(Serialize)]
struct JsonRow<'a> {
    id: &'a str,
    group: &'a str,
    status: String,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    rows: Vec<JsonRow<'a>>,
    tally: BTreeMap<&'static str, usize>,
}

/// Collects report rows and writes them to the console as they arrive.
#[derive(Debug, Default)]
pub struct StatusReport {
    rows: Vec<ReportRow>,
}

impl StatusReport {
    pub const HEADER: &'static str = "ID\tGroup\tStatus";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_header<W: Write>(&self, out: &mut W) -> Result<(), Error> {
        writeln!(out, "{}", Self::HEADER)?;
        Ok(())
    }

    /// Records a row and writes it to `out`.
    pub fn push<W: Write>(&mut self, row: ReportRow, out: &mut W) -> Result<(), Error> {
        writeln!(out, "{row}")?;
        out.flush()?;
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Number of rows per status label.
    pub fn tally(&self) -> BTreeMap<&'static str, usize> {
        let mut tally: BTreeMap<&'static str, usize> = BTreeMap::new();
        for row in self.rows.iter() {
            *tally.entry(row.status.label()).or_default() += 1;
        }
        tally
    }

    /// Logs the tally, one line per status.
    pub fn log_tally(&self) {
        log::info!("Processed {} submissions", self.rows.len());
        for (label, n) in self.tally() {
            log::info!("  {label}: {n}");
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        let report = JsonReport {
            rows: self
                .rows
                .iter()
                .map(|r| JsonRow {
                    id: &r.student,
                    group: &r.group,
                    status: r.status.to_string(),
                })
                .collect(),
            tally: self.tally(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        std::fs::write(path.as_ref(), self.to_json()?).inspect_err(|e| {
            log::error!("Could not write JSON report {}: {e}", path.as_ref().display())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asserting::prelude::*;

    fn archive(compile: Option<StageOutcome>, run: Option<StageOutcome>) -> SubmissionOutcome {
        SubmissionOutcome {
            kind: PayloadKind::Archive,
            unpacked: true,
            compile,
            tests: Some(StageOutcome::ToolchainFailure { code: 1 }),
            run,
        }
    }

    #[test]
    fn test_fold_statuses() {
        use StageOutcome::*;
        let cases: Vec<(SubmissionOutcome, &str)> = vec![
            (archive(Some(Success), Some(Success)), "OK"),
            (archive(None, None), "OK"),
            (
                archive(Some(ToolchainFailure { code: 2 }), None),
                "Compilation error (code 2)",
            ),
            (archive(Some(DeadlineExceeded), None), "Compilation error (code -1)"),
            (archive(Some(Success), Some(NotFound)), "No main()"),
            (
                archive(Some(Success), Some(ToolchainFailure { code: 1 })),
                "Execution error: failed (code 1)",
            ),
            (
                archive(Some(Success), Some(DeadlineExceeded)),
                "Execution error: infinite loop",
            ),
            (
                SubmissionOutcome::new(PayloadKind::Archive),
                "Unable to unpack submission zip",
            ),
            (
                SubmissionOutcome::new(PayloadKind::Unsupported {
                    extension: ".pdf".to_string(),
                }),
                "Not zip: .pdf",
            ),
        ];
        for (outcome, expected) in cases {
            assert_that!(Status::fold(&outcome).map(|s| s.to_string()))
                .is_equal_to(Some(expected.to_string()));
        }
    }

    #[test]
    fn test_comment_only_has_no_row() {
        let outcome = SubmissionOutcome::new(PayloadKind::CommentOnly);
        assert_that!(Status::fold(&outcome)).is_none();
    }

    #[test]
    fn test_rows_and_tally() {
        let mut report = StatusReport::new();
        let mut out: Vec<u8> = vec![];
        report.write_header(&mut out).unwrap();
        for (student, status) in [
            ("123456ab", Status::Ok),
            ("222222bb", Status::CompilationError { code: 1 }),
            ("333333cc", Status::Ok),
        ] {
            report
                .push(
                    ReportRow {
                        student: student.to_string(),
                        group: "UNKNOWN".to_string(),
                        status,
                    },
                    &mut out,
                )
                .unwrap();
        }
        assert_that!(String::from_utf8(out).unwrap()).is_equal_to(
            "ID\tGroup\tStatus\n\
             123456ab\tUNKNOWN\tOK\n\
             222222bb\tUNKNOWN\tCompilation error (code 1)\n\
             333333cc\tUNKNOWN\tOK\n"
                .to_string(),
        );
        let tally = report.tally();
        assert_that!(tally.get("OK").copied()).is_equal_to(Some(2));
        assert_that!(tally.get("Compilation error").copied()).is_equal_to(Some(1));
    }

    #[test]
    fn test_json_report() {
        let mut report = StatusReport::new();
        report
            .push(
                ReportRow {
                    student: "123456ab".to_string(),
                    group: "A".to_string(),
                    status: Status::InfiniteLoop,
                },
                &mut std::io::sink(),
            )
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_that!(v["rows"][0]["id"].as_str()).is_equal_to(Some("123456ab"));
        assert_that!(v["rows"][0]["status"].as_str())
            .is_equal_to(Some("Execution error: infinite loop"));
        assert_that!(v["tally"]["Execution error: infinite loop"].as_u64()).is_equal_to(Some(1));
    }
}

use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::utils::create_dir_if_not_exists;

pub const SRC_DIR: &str = "src";
pub const BIN_DIR: &str = "bin";
pub const COMPILE_LOG: &str = "compile.log";
pub const TESTS_LOG: &str = "tests.log";
pub const EXEC_LOG: &str = "exec.log";

/// On-disk home of one student's submission:
/// `<root>/<group>/<student>/{src,bin}` plus the stage logs in the base
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionLayout {
    pub base: PathBuf,
    pub src: PathBuf,
    pub bin: PathBuf,
}

impl SubmissionLayout {
    /// Computes the paths without touching the file system.
    pub fn new<P: AsRef<Path>>(root: P, group: &str, student: &str) -> Self {
        let base = root.as_ref().join(group).join(student);
        SubmissionLayout {
            src: base.join(SRC_DIR),
            bin: base.join(BIN_DIR),
            base,
        }
    }

    /// Computes the paths and creates the directories. A student with several
    /// files passes through here more than once, so existing directories are
    /// left alone.
    pub fn create<P: AsRef<Path>>(root: P, group: &str, student: &str) -> Result<Self, Error> {
        let layout = Self::new(root, group, student);
        for dir in [&layout.base, &layout.src, &layout.bin] {
            create_dir_if_not_exists(dir).inspect_err(|e| {
                log::error!("Could not create directory {}: {e}", dir.display())
            })?;
        }
        Ok(layout)
    }

    /// True if `name` cannot be used for a stored submission file in the base
    /// directory: it names a layout directory, a stage log or an existing
    /// directory.
    pub fn is_reserved(&self, name: &str) -> bool {
        [SRC_DIR, BIN_DIR, COMPILE_LOG, TESTS_LOG, EXEC_LOG].contains(&name)
            || self.base.join(name).is_dir()
    }

    pub fn compile_log(&self) -> PathBuf {
        self.base.join(COMPILE_LOG)
    }

    pub fn tests_log(&self) -> PathBuf {
        self.base.join(TESTS_LOG)
    }

    pub fn exec_log(&self) -> PathBuf {
        self.base.join(EXEC_LOG)
    }
}

/// Creates one directory per group under the destination root.
pub fn make_group_folders<'a, P, I>(root: P, groups: I) -> Result<(), Error>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a str>,
{
    for g in groups {
        create_dir_if_not_exists(root.as_ref().join(g))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use asserting::prelude::*;

    #[test]
    fn test_layout_paths() {
        let l = SubmissionLayout::new("/out", "G1", "123456ab");
        assert_that!(l.src.clone()).is_equal_to(PathBuf::from("/out/G1/123456ab/src"));
        assert_that!(l.bin.clone()).is_equal_to(PathBuf::from("/out/G1/123456ab/bin"));
        assert_that!(l.exec_log()).is_equal_to(PathBuf::from("/out/G1/123456ab/exec.log"));
        assert_that!(l.base.clone()).is_equal_to(PathBuf::from("/out/G1/123456ab"));
    }

    #[test]
    fn test_create_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let first = SubmissionLayout::create(tmp.path(), "UNKNOWN", "123456ab").unwrap();
        std::fs::write(first.src.join("Hello.java"), "class Hello {}").unwrap();
        let second = SubmissionLayout::create(tmp.path(), "UNKNOWN", "123456ab").unwrap();
        assert_that!(second.clone()).is_equal_to(first);
        assert_that!(second.src.join("Hello.java").exists()).is_true();
        assert_that!(second.bin.is_dir()).is_true();
    }

    #[test]
    fn test_create_fails_on_unwritable_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let file_as_root = tmp.path().join("not-a-dir");
        std::fs::write(&file_as_root, "").unwrap();
        assert_that!(SubmissionLayout::create(&file_as_root, "A", "123456ab")).is_err();
    }

    #[test]
    fn test_reserved_names() {
        let tmp = tempfile::tempdir().unwrap();
        let l = SubmissionLayout::create(tmp.path(), "A", "123456ab").unwrap();
        std::fs::create_dir(l.base.join("extra")).unwrap();
        assert_that!(l.is_reserved("src")).is_true();
        assert_that!(l.is_reserved("exec.log")).is_true();
        assert_that!(l.is_reserved("extra")).is_true();
        assert_that!(l.is_reserved("Hello.zip")).is_false();
    }

    #[test]
    fn test_make_group_folders() {
        let tmp = tempfile::tempdir().unwrap();
        make_group_folders(tmp.path(), ["A", "B", "UNKNOWN"]).unwrap();
        make_group_folders(tmp.path(), ["A"]).unwrap();
        assert_that!(tmp.path().join("B").is_dir()).is_true();
        assert_that!(tmp.path().join("UNKNOWN").is_dir()).is_true();
    }
}

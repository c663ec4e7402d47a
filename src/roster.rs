use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Error;

/// Group that collects every student missing from the roster.
pub const UNKNOWN_GROUP: &str = "UNKNOWN";

/// Length of the numeric part of a student identifier.
const STUDENT_NUMBER_LEN: usize = 6;

/// Bidirectional lookup between students and groups.
///
/// Built once from the roster. During a run it only grows through
/// `assign_unknown`, which files a student under [`UNKNOWN_GROUP`].
#[derive(Debug, Clone)]
pub struct RosterIndex {
    by_student: BTreeMap<String, String>,
    by_group: BTreeMap<String, Vec<String>>,
}

impl Default for RosterIndex {
    fn default() -> Self {
        Self::from_rows(std::iter::empty::<(String, String)>())
    }
}

fn normalize_student(s: &str) -> String {
    s.trim().to_ascii_lowercase()
}

impl RosterIndex {
    /// Builds the index from `(student, group)` rows. A student listed twice
    /// keeps the last group given for them.
    pub fn from_rows<I, S, G>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, G)>,
        S: AsRef<str>,
        G: AsRef<str>,
    {
        let mut index = RosterIndex {
            by_student: BTreeMap::new(),
            by_group: BTreeMap::new(),
        };
        index.by_group.insert(UNKNOWN_GROUP.to_string(), vec![]);
        for (student, group) in rows {
            index.insert(normalize_student(student.as_ref()), group.as_ref().trim().to_string());
        }
        index
    }

    fn insert(&mut self, student: String, group: String) {
        if let Some(previous) = self.by_student.insert(student.clone(), group.clone()) {
            log::warn!("Student {student} listed in both group {previous} and {group}");
            if let Some(members) = self.by_group.get_mut(&previous) {
                members.retain(|m| *m != student);
            }
        }
        self.by_group.entry(group).or_default().push(student);
    }

    /// Parses roster rows of the form `STUDENT_ID,GROUP_ID`. There is no
    /// header; blank lines are skipped.
    pub fn from_csv_str(contents: &str) -> Result<Self, Error> {
        let mut rows: Vec<(String, String)> = vec![];
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let mut cols = line.split(',');
            match (cols.next(), cols.next()) {
                (Some(student), Some(group))
                    if !student.trim().is_empty() && !group.trim().is_empty() =>
                {
                    rows.push((student.to_string(), group.to_string()));
                }
                _ => {
                    return Error::err_string(format!(
                        "Malformed roster line {}: \"{line}\"",
                        lineno + 1
                    ));
                }
            }
        }
        Ok(Self::from_rows(rows))
    }

    /// Reads the roster from a CSV file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path.as_ref()).inspect_err(|e| {
            log::error!("Could not read roster {}: {e}", path.as_ref().display())
        })?;
        let index = Self::from_csv_str(&contents)?;
        log::info!(
            "Loaded roster with {} students in {} groups",
            index.by_student.len(),
            index.by_group.len() - 1
        );
        Ok(index)
    }

    fn lookup(&self, student: &str) -> Option<&String> {
        self.by_student.get(student).or_else(|| {
            student
                .get(..STUDENT_NUMBER_LEN)
                .and_then(|number| self.by_student.get(number))
        })
    }

    /// Returns the group of a student (as returned by `IdentityResolver`), or
    /// [`UNKNOWN_GROUP`] if they are not in the roster.
    pub fn group_of(&self, student: &str) -> &str {
        self.lookup(student).map_or(UNKNOWN_GROUP, String::as_str)
    }

    /// Returns true if the student has a group, including students that were
    /// filed under the unknown group earlier in the run.
    pub fn contains(&self, student: &str) -> bool {
        self.lookup(student).is_some()
    }

    /// Files a student that is not in the roster under [`UNKNOWN_GROUP`].
    /// Does nothing if the student already has a group.
    pub fn assign_unknown(&mut self, student: &str) {
        if self.contains(student) {
            return;
        }
        log::debug!("Assigning {student} to the {UNKNOWN_GROUP} group");
        self.insert(student.to_string(), UNKNOWN_GROUP.to_string());
    }

    /// Resolves the group of a student, filing them under the unknown group
    /// on first encounter.
    pub fn resolve(&mut self, student: &str) -> String {
        self.assign_unknown(student);
        self.group_of(student).to_string()
    }

    /// All group names, including [`UNKNOWN_GROUP`].
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.by_group.keys().map(String::as_str)
    }

    /// Members of a group, in the order they were added.
    pub fn members(&self, group: &str) -> &[String] {
        self.by_group.get(group).map(Vec::as_slice).unwrap_or(&[])
    }
}

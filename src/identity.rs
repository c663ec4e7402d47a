use regex::Regex;

use crate::error::Error;

/// Marker that precedes the student-chosen part of a batch file name.
const ATTEMPT_MARKER: &str = "attempt";

/// Prefix of identifiers handed out to files without a recognizable student
/// number.
pub const UNKNOWN_PREFIX: &str = "UNKNOWN_";

/// Hands out the numbers used in `UNKNOWN_<n>` identifiers. Owned by whoever
/// drives the batch and passed to the resolver explicitly.
#[derive(Debug, Clone)]
pub struct UnknownCounter {
    next: u64,
}

impl Default for UnknownCounter {
    fn default() -> Self {
        UnknownCounter { next: 1 }
    }
}

impl UnknownCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current number and advances the counter.
    pub fn take(&mut self) -> u64 {
        let n = self.next;
        self.next += 1;
        n
    }

    /// The number the next call to `take` will return.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

/// Extracts student identifiers (six digits followed by two letters) from
/// file names.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    pattern: Regex,
}

impl IdentityResolver {
    pub fn new() -> Result<Self, Error> {
        Ok(IdentityResolver {
            pattern: Regex::new(r"(?i)[0-9]{6}[a-z]{2}")?,
        })
    }

    /// Returns the student identifier in the file name, if any, lowercased.
    pub fn find(&self, file_name: &str) -> Option<String> {
        self.pattern
            .find(file_name)
            .map(|m| m.as_str().to_ascii_lowercase())
    }

    /// Resolves the student of a file name. Names without an identifier get
    /// a fresh `UNKNOWN_<n>`, consuming one number from `counter`.
    pub fn resolve(&self, file_name: &str, counter: &mut UnknownCounter) -> String {
        match self.find(file_name) {
            Some(id) => id,
            None => {
                let id = format!("{UNKNOWN_PREFIX}{}", counter.take());
                log::debug!("No student identifier in \"{file_name}\", using {id}");
                id
            }
        }
    }
}

/// Returns the name a batch file is stored under after sorting: everything
/// after the last underscore that follows `attempt`. Names without the
/// marker are returned unchanged.
///
/// `Assignment 1_123456ab_attempt_2011-09-12-10-00-00_Hello.zip` becomes
/// `Hello.zip`.
pub fn display_name(file_name: &str) -> &str {
    let Some(i) = file_name.find(ATTEMPT_MARKER) else {
        return file_name;
    };
    let tail = &file_name[i..];
    match tail.rfind('_') {
        Some(j) if j + 1 < tail.len() => &tail[j + 1..],
        _ => file_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asserting::prelude::*;

    #[test]
    fn test_resolve_known_id() {
        let r = IdentityResolver::new().unwrap();
        let mut c = UnknownCounter::new();
        assert_that!(r.resolve("attempt_19999999_123456ab_Hello.zip", &mut c))
            .is_equal_to("123456ab".to_string());
        assert_that!(r.resolve("Lab 2_654321CD_attempt_x.txt", &mut c))
            .is_equal_to("654321cd".to_string());
        // Never touches the counter
        assert_that!(c.peek()).is_equal_to(1);
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let r = IdentityResolver::new().unwrap();
        let mut c = UnknownCounter::new();
        assert_that!(r.resolve("111111aa_222222bb.zip", &mut c))
            .is_equal_to("111111aa".to_string());
    }

    #[test]
    fn test_resolve_unknown_is_strictly_increasing() {
        let r = IdentityResolver::new().unwrap();
        let mut c = UnknownCounter::new();
        let ids: Vec<String> = ["notes.txt", "12345ab.zip", "notes.txt"]
            .iter()
            .map(|name| r.resolve(name, &mut c))
            .collect();
        assert_that!(ids).is_equal_to(vec![
            "UNKNOWN_1".to_string(),
            "UNKNOWN_2".to_string(),
            "UNKNOWN_3".to_string(),
        ]);
        assert_that!(c.peek()).is_equal_to(4);
    }

    #[test]
    fn test_resolve_ignores_non_ascii_digits() {
        let r = IdentityResolver::new().unwrap();
        assert_that!(r.find("١٢٣٤٥٦ab.zip")).is_none();
    }

    #[test]
    fn test_display_name() {
        assert_that!(display_name("Lab_123456ab_attempt_2011-09-12_Hello.zip"))
            .is_equal_to("Hello.zip");
        assert_that!(display_name("attempt_19999999_123456ab_Hello.zip"))
            .is_equal_to("Hello.zip");
        assert_that!(display_name("123456ab_Hello.zip")).is_equal_to("123456ab_Hello.zip");
        assert_that!(display_name("Lab_attempt_")).is_equal_to("Lab_attempt_");
    }
}

use std::path::Path;

use crate::{error::Error, stage::build::SOURCE_EXTENSION, utils::sorted_dir_entries};

/// Text that marks a source file as containing the program entry point.
pub const ENTRY_POINT_SIGNATURE: &str = "public static void main";

/// Returns true if any line of the file contains [`ENTRY_POINT_SIGNATURE`].
/// Files that are not valid UTF-8 are read lossily.
pub fn has_entry_point<P: AsRef<Path>>(path: P) -> Result<bool, Error> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .any(|line| line.contains(ENTRY_POINT_SIGNATURE)))
}

/// Searches the source tree for a class with an entry point and returns its
/// qualified name, with directories as package components (`app/Main.java`
/// gives `app.Main`).
///
/// Depth-first: subdirectories are searched before the files next to them,
/// both in name order, and the first match is returned.
pub fn find_entry_point<P: AsRef<Path>>(src: P) -> Result<Option<String>, Error> {
    fn scan(dir: &Path, package: &[String]) -> Result<Option<String>, Error> {
        let entries = sorted_dir_entries(dir)?;

        for (name, path) in entries.iter().filter(|(_, p)| p.is_dir()) {
            let mut sub = package.to_vec();
            sub.push(name.to_owned());
            if let Some(found) = scan(path, &sub)? {
                return Ok(Some(found));
            }
        }

        for (name, path) in entries.iter().filter(|(_, p)| p.is_file()) {
            let Some(class) = name.strip_suffix(SOURCE_EXTENSION) else {
                continue;
            };
            if has_entry_point(path)? {
                let mut qualified = package.to_vec();
                qualified.push(class.to_owned());
                return Ok(Some(qualified.join(".")));
            }
        }
        Ok(None)
    }

    let found = scan(src.as_ref(), &[])?;
    match &found {
        Some(class) => log::debug!("Entry point in {}: {class}", src.as_ref().display()),
        None => log::info!("No entry point in {}", src.as_ref().display()),
    }
    Ok(found)
}

use crate::error::Error;
use std::path::{Path, PathBuf};

/// Joins two file system paths together.
pub fn path_join<A: AsRef<Path>, B: AsRef<Path>>(a: A, b: B) -> Result<String, Error> {
    a.as_ref()
        .join(b.as_ref())
        .to_str()
        .map(String::from)
        .ok_or(Error::from("Could not convert path to a string."))
}

/// Joins two file system paths together and returns the absolute path of the
/// result.
pub fn path_absolute_join<A: AsRef<Path>, B: AsRef<Path>>(a: A, b: B) -> Result<String, Error> {
    std::path::absolute(a.as_ref().join(b.as_ref()))?
        .to_str()
        .map(String::from)
        .ok_or(Error::from("Could not convert path to a string."))
}

/// Returns the absolute parent path of the provided string, which can succeed
/// even if the path doesn't exist.
pub fn path_absolute_parent<P: AsRef<Path>>(path: P) -> Result<String, Error> {
    std::path::absolute(path.as_ref())?
        .parent()
        .map(|e| e.to_owned())
        .and_then(|p| p.to_str().map(String::from))
        .ok_or(Error::from("Internal error: Could not get parent of path."))
}

/// Creates a directory if it does not already exist.
pub fn create_dir_if_not_exists<P: AsRef<Path>>(path: P) -> Result<(), Error> {
    if !std::fs::exists(path.as_ref())? {
        std::fs::create_dir_all(path.as_ref())?;
    }
    Ok(())
}

/// Moves a file, falling back to copy and delete when a rename is not
/// possible (e.g. across file systems).
pub fn move_file<A: AsRef<Path>, B: AsRef<Path>>(from: A, to: B) -> Result<(), Error> {
    if let Err(e) = std::fs::rename(from.as_ref(), to.as_ref()) {
        log::debug!(
            "Could not rename {} to {} ({e}), copying instead",
            from.as_ref().display(),
            to.as_ref().display()
        );
        std::fs::copy(from.as_ref(), to.as_ref())?;
        std::fs::remove_file(from.as_ref())?;
    }
    Ok(())
}

/// Returns the extension of a file name including the leading dot, or an
/// empty string if there is none. A leading dot alone (`.bashrc`) does not
/// count as an extension.
pub fn dotted_extension<S: AsRef<str>>(name: S) -> String {
    let name = name.as_ref();
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(i) => name[i..].to_string(),
    }
}

/// Lists the entries of a directory, sorted by file name.
pub fn sorted_dir_entries<P: AsRef<Path>>(dir: P) -> Result<Vec<(String, PathBuf)>, Error> {
    let mut entries: Vec<(String, PathBuf)> = vec![];
    for entry in std::fs::read_dir(dir.as_ref())? {
        let entry = entry?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|oss| Error::from(format!("Invalid utf-8 filename: {oss:?}")))?;
        entries.push((name, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

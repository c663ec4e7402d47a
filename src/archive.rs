use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::Path;

use zip::read::ZipArchive;

use crate::error::Error;

/// Read errors that come from the archive contents rather than the disk.
fn is_content_error(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::InvalidData | ErrorKind::UnexpectedEof)
}

fn corrupt(payload: &Path, what: String) -> Error {
    Error::CorruptArchive(format!("{}: {what}", payload.display()))
}

/// Unpacks every entry of the zip file at `payload` into `target`, keeping
/// relative paths. The target is created if missing, unless it names a drive
/// (`C:`) rather than a directory.
///
/// Returns `Error::CorruptArchive` if the payload cannot be read as a zip
/// archive, and `Error::IOError` if writing the entries fails.
pub fn extract_zip<P: AsRef<Path>, Q: AsRef<Path>>(
    payload: P,
    target: Q,
) -> Result<usize, Error> {
    let payload = payload.as_ref();
    let target = target.as_ref();

    let is_drive = target.to_str().is_some_and(|s| s.ends_with(':'));
    if !is_drive && !target.exists() {
        fs::create_dir_all(target)?;
    }

    let mut archive = ZipArchive::new(File::open(payload)?).map_err(|e| match Error::from(e) {
        Error::IOError(e) if is_content_error(e.kind()) => corrupt(payload, e.to_string()),
        Error::CorruptArchive(s) => corrupt(payload, s),
        other => other,
    })?;

    let mut n_files = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| corrupt(payload, e.to_string()))?;
        let relpath = entry.enclosed_name().ok_or_else(|| {
            corrupt(payload, format!("entry \"{}\" escapes the target directory", entry.name()))
        })?;
        let outpath = target.join(relpath);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = File::create(&outpath)?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| {
            if is_content_error(e.kind()) {
                corrupt(payload, format!("entry \"{}\": {e}", entry.name()))
            } else {
                Error::from(e)
            }
        })?;
        n_files += 1;
    }
    log::debug!(
        "Extracted {n_files} files from {} to {}",
        payload.display(),
        target.display()
    );
    Ok(n_files)
}

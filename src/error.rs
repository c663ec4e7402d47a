use std::convert::From;
use toml;

#[derive(Debug)]
pub enum Error {
    IOError(std::io::Error),
    SetLoggerError(log::SetLoggerError),
    TOMLDeError(toml::de::Error),
    JSONError(serde_json::Error),
    RegexError(regex::Error),
    PopenError(subprocess::PopenError),
    /// The payload could not be read as a zip archive.
    CorruptArchive(String),
    RawError(String),
}

impl std::error::Error for Error {}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IOError(e) => {
                write!(f, "[IOError] {e}")
            }
            Error::SetLoggerError(e) => {
                write!(f, "[SetLoggerError] {e}")
            }
            Error::TOMLDeError(e) => {
                write!(f, "[TOMLDeError] {e}")
            }
            Error::JSONError(e) => {
                write!(f, "[JSONError] {e}")
            }
            Error::RegexError(e) => {
                write!(f, "[RegexError] {e}")
            }
            Error::PopenError(e) => {
                write!(f, "[PopenError] {e}")
            }
            Error::CorruptArchive(s) => {
                write!(f, "[CorruptArchive] {s}")
            }
            Error::RawError(s) => {
                write!(f, "{s}")
            }
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IOError(e)
    }
}

impl From<log::SetLoggerError> for Error {
    fn from(e: log::SetLoggerError) -> Self {
        Error::SetLoggerError(e)
    }
}

impl From<fern::InitError> for Error {
    fn from(e: fern::InitError) -> Self {
        match e {
            fern::InitError::Io(e) => Self::from(e),
            fern::InitError::SetLoggerError(e) => Self::from(e),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::TOMLDeError(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::JSONError(e)
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::RegexError(e)
    }
}

impl From<subprocess::PopenError> for Error {
    fn from(e: subprocess::PopenError) -> Self {
        Error::PopenError(e)
    }
}

/// I/O failures inside the zip reader are still I/O failures. Everything
/// else the zip crate reports means the bytes are not a usable archive.
impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(e) => Error::IOError(e),
            other => Error::CorruptArchive(other.to_string()),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::RawError(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::RawError(String::from(s))
    }
}

impl Error {
    pub fn err_string<T>(s: String) -> Result<T, Self> {
        Err(Self::from(s))
    }

    /// Returns true if this error describes a broken archive rather than a
    /// failing environment.
    pub fn is_corrupt_archive(&self) -> bool {
        matches!(self, Error::CorruptArchive(_))
    }
}

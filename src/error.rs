use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    FetchFailed { endpoint: &'static str, status: u16 },
    WriteDenied,
    WriteRejected(String),
    WriteFailed,
    Timeout,
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::FetchFailed { endpoint, status } => {
                write!(f, "{endpoint} returned HTTP {status}")
            }
            Error::WriteDenied => write!(f, "no write key configured"),
            Error::WriteRejected(reason) => write!(f, "device rejected command: {reason}"),
            Error::WriteFailed => write!(f, "command not acknowledged by any endpoint"),
            Error::Timeout => write!(f, "operation timed out"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

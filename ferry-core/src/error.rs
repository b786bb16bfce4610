use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FerryError {
    Config(String),
    Credentials(String),
    Source(String),
    EmptySource(String),
    Transfer(String),
    Local(String),
    Ledger(String),
    Interrupted,
    Io(#[from] std::io::Error),
}

impl FerryError {
    /// Transient network failures (pull/push) are the only errors worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FerryError::Transfer(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, FerryError::Interrupted)
    }
}

impl Display for FerryError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            FerryError::Config(s) => write!(f, "Configuration error: {}", s),
            FerryError::Credentials(s) => {
                write!(f, "Missing target registry credentials: {}\n\n", s)?;
                write!(f, "Fix:\n")?;
                write!(f, "  • export TARGET_USER=<registry user>\n")?;
                write!(f, "  • export TARGET_PASSWORD=<registry password>\n")?;
                write!(f, "  • Or run with --dry-run to only plan")
            }
            FerryError::Source(s) => write!(f, "Tag source error: {}", s),
            FerryError::EmptySource(s) => {
                write!(f, "Tag source returned no tags for {}; check the source path", s)
            }
            FerryError::Transfer(s) => write!(f, "Transfer failed: {}", s),
            FerryError::Local(s) => write!(f, "Local image operation failed: {}", s),
            FerryError::Ledger(s) => write!(f, "History ledger error: {}", s),
            FerryError::Interrupted => write!(f, "Interrupted by signal"),
            FerryError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl From<reqwest::Error> for FerryError {
    fn from(err: reqwest::Error) -> Self {
        FerryError::Source(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FerryError>;

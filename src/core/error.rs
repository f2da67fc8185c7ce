use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid index options, unknown field type or analyzer
    Config,
    /// Malformed search JSON or a leaf that does not fit its field
    BadQuery,
    /// Disk failure while committing, merging or truncating
    IndexIo,
    /// Row fetch failure during a scan
    TransientRead,
    /// Corrupted index data, the indexer must be rebuilt
    Fatal,
    Parse,
    NotFound,
    InvalidState,
    Timeout,
}

#[derive(Debug, ThisError)]
#[error("{kind:?}: {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn config(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Config, context)
    }

    pub fn bad_query(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::BadQuery, context)
    }

    pub fn index_io(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::IndexIo, context)
    }

    pub fn transient_read(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::TransientRead, context)
    }

    pub fn fatal(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Fatal, context)
    }

    pub fn invalid_state(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidState, context)
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Fatal
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            kind: ErrorKind::IndexIo,
            context: err.to_string(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Parse,
            context: format!("JSON error: {}", err),
        }
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error {
            kind: ErrorKind::Fatal,
            context: format!("FST error: {}", err),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::BadQuery,
            context: format!("Invalid pattern: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("{op} {path}: not found")]
    NotFound { op: &'static str, path: String },

    #[error("box does not support iteration")]
    IterationUnsupported,

    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("box is closed: {0}")]
    Closed(String),

    #[error("{}", join_messages(.0))]
    Aggregate(Vec<Error>),

    #[error("io error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Separator placed between member messages of an [`Error::Aggregate`].
pub const AGGREGATE_SEPARATOR: &str = "\nAND ";

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(AGGREGATE_SEPARATOR)
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::IterationUnsupported => "iteration_unsupported",
            Error::InvalidPattern(_) => "invalid_pattern",
            Error::InvalidConfig(_) => "invalid_config",
            Error::InvalidPath(_) => "invalid_path",
            Error::Closed(_) => "closed",
            Error::Aggregate(_) => "aggregate",
            Error::Io(_) => "io",
        }
    }

    pub fn not_found(op: &'static str, path: impl Into<String>) -> Self {
        Error::NotFound {
            op,
            path: path.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Collapse collected errors: none is `Ok`, one is passed through verbatim,
    /// more become a single [`Error::Aggregate`] in collection order.
    pub fn collapse(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Aggregate(errors)),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

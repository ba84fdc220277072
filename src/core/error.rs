use std::collections::TryReserveError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Positional access outside `[0, len)`; a caller bug.
    IndexOutOfRange,
    /// Record bytes whose length differs from the schema's record width.
    MalformedRecord,
    /// Serialized ordering signature disagrees with the schema's ordering.
    OrderMismatch,
    /// Growth denied by the memory oracle or by the allocator.
    CapacityExhausted,
    /// A time-boxed operation stopped early; the structure is still valid.
    PartialCompletion,
    Parse,
    InvalidArgument,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Error::new(
            ErrorKind::IndexOutOfRange,
            format!("index {} out of range for length {}", index, len),
        )
    }

    pub fn malformed_record(got: usize, width: usize) -> Self {
        Error::new(
            ErrorKind::MalformedRecord,
            format!("record has {} bytes, schema requires {}", got, width),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<TryReserveError> for Error {
    fn from(err: TryReserveError) -> Self {
        Error {
            kind: ErrorKind::CapacityExhausted,
            context: err.to_string(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Error {
            kind: ErrorKind::Internal,
            context: format!("sort worker pool: {}", err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
